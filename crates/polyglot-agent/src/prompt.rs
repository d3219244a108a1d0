//! Prompt templates for the pruning call and the task call.

use polyglot_core::types::Message;

/// Ask the service which candidates share a topic with `target`.
///
/// Candidates are listed most recent first with 1-based indices; the reply is
/// expected to be a JSON array of those indices.
pub fn build_prune_prompt(target: &str, candidates: &[Message]) -> String {
    let context_text = candidates
        .iter()
        .enumerate()
        .map(|(i, m)| format!("[{}] {}: {}", i + 1, m.display_author(), m.body))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a context filtering assistant for a translation system.

Your task is to analyze a list of conversation messages and identify which ones are semantically relevant to the target message.

Target message:
"{target}"

Conversation context (most recent first):
{context_text}

Instructions:
1. Analyze the semantic relationship between the target message and each context message
2. Identify messages that share the same topic, refer to the same subject, or provide necessary context for understanding the target message
3. Return ONLY a JSON array of indices (1-based) of the relevant messages
4. If no messages are relevant, return an empty array []
5. Be selective - only include messages that truly add context value

Response format (JSON only):
[1, 3, 5]

Your response:"#
    )
}

/// Translation prompt. `context` must already be oldest first.
///
/// With no explicit target the service detects the source language and
/// translates into `default_target`.
pub fn build_translation_prompt(
    text: &str,
    context: &[&Message],
    target: Option<&str>,
    default_target: &str,
) -> String {
    let instruction = match target {
        Some(lang) => format!("Translate the following message into {lang}."),
        None => format!(
            "Detect the source language and translate into {default_target} \
             (or keep it in {default_target} if it is already written in {default_target})."
        ),
    };
    let context_section = render_context(context);

    format!(
        r#"You are an expert translator with deep cultural and linguistic knowledge.

{instruction}

Message to translate:
"{text}"
{context_section}
Provide an enhanced translation with the following sections:

[Translation]
Provide the direct translation here. Maintain the original formatting (line breaks, emojis, etc.).

[Context/Term Explanation]
If the message contains cultural references, idioms or slang, technical terms, names or proper nouns, or references to previous conversation topics, explain them briefly here. If nothing needs explanation, write "None".

[Tone Notes]
Describe the overall tone, any emotional subtext, the register, and any nuances that might be lost in translation.

Format your response exactly with these section headers in brackets."#
    )
}

/// General task prompt. `context` must already be oldest first.
pub fn build_task_prompt(text: &str, context: &[&Message], instruction: &str) -> String {
    let context_section = render_context(context);

    format!(
        r#"You are a helpful assistant working inside a group chat.

Carry out this instruction on the message below: {instruction}

Message:
"{text}"
{context_section}
Respond with the following sections:

[Result]
The outcome of the instruction.

[Notes]
Anything the reader should know about how the result was produced. If there is nothing to add, write "None".

Format your response exactly with these section headers in brackets."#
    )
}

fn render_context(context: &[&Message]) -> String {
    if context.is_empty() {
        return String::new();
    }
    let lines = context
        .iter()
        .map(|m| format!("- {}: {}", m.display_author(), m.body))
        .collect::<Vec<_>>()
        .join("\n");
    format!("\nRelevant conversation context:\n{lines}\n")
}
