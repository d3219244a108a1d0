//! Best-effort extraction of an instruction written at the start of a message.
//!
//! Recognised forms:
//!
//! ```text
//! Translate to Japanese: hello
//! translate into simplified chinese
//! 翻译为日语：你好
//! 译成英文 ...
//! Do summarize the thread: ...
//! ```
//!
//! A body that matches none of them is left untouched and the trigger's own
//! behaviour applies. Matching never fails.

use std::sync::LazyLock;

use regex::Regex;

use crate::language;

/// Instruction found at the head of a message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Translate the rest of the message into `target` (display name).
    Translate { target: String },
    /// Apply a free-form instruction to the rest of the message.
    Task { instruction: String },
}

/// Result of [`extract`]: the directive (if any) and the text it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub directive: Option<Directive>,
    pub text: String,
}

static ENGLISH_TRANSLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:please\s+)?translate\s+(?:this\s+|it\s+)?(?:to|into)\s+([^:：\n]+?)\s*(?:[:：]|\n|$)")
        .unwrap()
});

static CHINESE_TRANSLATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:请)?(?:翻译|译)(?:为|成)?\s*").unwrap());

/// Words that make a leading "Do" part of an ordinary sentence
/// ("Do not forget: ...", "Do you know: ...") rather than an instruction.
const NOT_AN_INSTRUCTION: &[&str] = &[
    "not", "you", "we", "i", "they", "he", "she", "it", "this", "that", "these", "those",
    "your", "our", "my", "the", "any", "so",
];

static TASK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^do\s+([^:：\n]+?)\s*[:：]").unwrap());

/// Split a message body into an optional leading directive and its payload.
///
/// A directive with nothing after it is ignored; the whole body is then
/// treated as ordinary text.
pub fn extract(body: &str) -> Extracted {
    let trimmed = body.trim();

    let found = english_translate(trimmed)
        .or_else(|| chinese_translate(trimmed))
        .or_else(|| task(trimmed));

    match found {
        Some((directive, rest)) => {
            let text = strip_separator(rest);
            if text.is_empty() {
                Extracted {
                    directive: None,
                    text: trimmed.to_string(),
                }
            } else {
                Extracted {
                    directive: Some(directive),
                    text: text.to_string(),
                }
            }
        }
        None => Extracted {
            directive: None,
            text: trimmed.to_string(),
        },
    }
}

fn english_translate(text: &str) -> Option<(Directive, &str)> {
    let caps = ENGLISH_TRANSLATE.captures(text)?;
    let whole = caps.get(0)?;
    let target = language::canonical_name(caps.get(1)?.as_str());
    Some((Directive::Translate { target }, &text[whole.end()..]))
}

fn chinese_translate(text: &str) -> Option<(Directive, &str)> {
    let head = CHINESE_TRANSLATE.find(text)?;
    let rest = &text[head.end()..];

    // Known language names need no separator ("翻译成日文你好").
    if let Some((display, len)) = language::match_prefix(rest) {
        return Some((
            Directive::Translate {
                target: display.to_string(),
            },
            &rest[len..],
        ));
    }

    // Otherwise take everything up to an explicit separator.
    let end = rest.find([':', '：', '\n'])?;
    let name = rest[..end].trim();
    if name.is_empty() {
        return None;
    }
    Some((
        Directive::Translate {
            target: language::canonical_name(name),
        },
        &rest[end..],
    ))
}

fn task(text: &str) -> Option<(Directive, &str)> {
    let caps = TASK.captures(text)?;
    let whole = caps.get(0)?;
    let instruction = caps.get(1)?.as_str().trim();
    let first = instruction.split_whitespace().next()?.to_lowercase();
    if NOT_AN_INSTRUCTION.contains(&first.as_str()) {
        return None;
    }
    Some((
        Directive::Task {
            instruction: instruction.to_string(),
        },
        &text[whole.end()..],
    ))
}

fn strip_separator(rest: &str) -> &str {
    rest.trim_start()
        .trim_start_matches([':', '：', ',', '，'])
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translate(target: &str) -> Option<Directive> {
        Some(Directive::Translate {
            target: target.to_string(),
        })
    }

    #[test]
    fn english_directive_with_colon() {
        let got = extract("Translate to Japanese: hello");
        assert_eq!(got.directive, translate("Japanese"));
        assert_eq!(got.text, "hello");
    }

    #[test]
    fn english_directive_is_case_insensitive_and_multiword() {
        let got = extract("translate into simplified chinese: good morning");
        assert_eq!(got.directive, translate("Chinese (Simplified)"));
        assert_eq!(got.text, "good morning");
    }

    #[test]
    fn english_directive_on_its_own_line() {
        let got = extract("Translate to French\nSee you tomorrow");
        assert_eq!(got.directive, translate("French"));
        assert_eq!(got.text, "See you tomorrow");
    }

    #[test]
    fn unknown_language_passes_through() {
        let got = extract("Translate to Klingon: hello");
        assert_eq!(got.directive, translate("Klingon"));
    }

    #[test]
    fn chinese_directive_with_separator() {
        let got = extract("翻译为日语：你好，今天天气不错。");
        assert_eq!(got.directive, translate("Japanese"));
        assert_eq!(got.text, "你好，今天天气不错。");
    }

    #[test]
    fn chinese_directive_followed_by_blank_line() {
        let got = extract("翻译成日文\n\n你好，今天天气不错。");
        assert_eq!(got.directive, translate("Japanese"));
        assert_eq!(got.text, "你好，今天天气不错。");
    }

    #[test]
    fn chinese_directive_without_separator() {
        let got = extract("译成英文这个项目进展得很快");
        assert_eq!(got.directive, translate("English"));
        assert_eq!(got.text, "这个项目进展得很快");
    }

    #[test]
    fn task_directive() {
        let got = extract("Do summarize in one line: the meeting moved to Friday and ...");
        assert_eq!(
            got.directive,
            Some(Directive::Task {
                instruction: "summarize in one line".to_string()
            })
        );
        assert_eq!(got.text, "the meeting moved to Friday and ...");
    }

    #[test]
    fn do_in_an_ordinary_sentence_is_not_a_task() {
        for body in [
            "Do not forget: the demo is at 5pm",
            "Do you know: the office is closed tomorrow",
            "do we agree: Friday works",
        ] {
            let got = extract(body);
            assert_eq!(got.directive, None, "{body}");
            assert_eq!(got.text, body);
        }
    }

    #[test]
    fn plain_message_has_no_directive() {
        let got = extract("  これ、いくらですか？ ");
        assert_eq!(got.directive, None);
        assert_eq!(got.text, "これ、いくらですか？");
    }

    #[test]
    fn directive_without_payload_is_ignored() {
        let got = extract("Translate to Japanese:");
        assert_eq!(got.directive, None);
        assert_eq!(got.text, "Translate to Japanese:");
    }

    #[test]
    fn directive_must_lead_the_message() {
        let got = extract("I said translate to Japanese: hello");
        assert_eq!(got.directive, None);
    }
}
