//! Rendering of relay outcomes as Discord embeds.
//!
//! Embeds are first built as a plain [`EmbedView`] so layout rules
//! (truncation, hidden placeholder annotations, footer text) can be tested
//! without serenity, then converted with [`EmbedView::to_create_embed`].

use std::time::Duration;

use serenity::builder::{CreateEmbed, CreateEmbedFooter};
use serenity::model::Timestamp;

use polyglot_agent::reply::{NOTES, TERMS, TONE};
use polyglot_agent::{DispatchError, TaskAction, TaskKind, TaskOutcome};

/// Discord's limit on an embed field value.
pub const FIELD_MAX: usize = 1024;

const COLOR_OK: u32 = 0x3498db;
const COLOR_TASK: u32 = 0x2ecc71;
const COLOR_ERR: u32 = 0xe74c3c;
const COLOR_STATS: u32 = 0x2ecc71;

/// Annotation values the model writes when it has nothing to say.
const PLACEHOLDERS: &[&str] = &["none", "n/a", "-", "无"];

const NO_TEXT: &str = "*No text content*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedView {
    pub title: String,
    pub description: Option<String>,
    pub color: u32,
    pub fields: Vec<(String, String)>,
    pub footer: Option<String>,
}

impl EmbedView {
    pub fn to_create_embed(&self) -> CreateEmbed {
        let mut e = CreateEmbed::new()
            .title(&self.title)
            .colour(self.color)
            .timestamp(Timestamp::now());
        if let Some(ref d) = self.description {
            e = e.description(d);
        }
        for (name, value) in &self.fields {
            e = e.field(name, value, false);
        }
        if let Some(ref f) = self.footer {
            e = e.footer(CreateEmbedFooter::new(f));
        }
        e
    }
}

/// Cut `text` to at most `max` characters, marking the cut with `...`.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

pub fn is_placeholder(text: &str) -> bool {
    let t = text.trim();
    t.is_empty() || PLACEHOLDERS.contains(&t.to_lowercase().as_str())
}

fn field_value(text: &str) -> String {
    if text.trim().is_empty() {
        NO_TEXT.to_string()
    } else {
        truncate(text, FIELD_MAX)
    }
}

/// Successful translation or task.
pub fn result_view(outcome: &TaskOutcome, requester: Option<&str>) -> EmbedView {
    let original_label = match &outcome.message {
        Some(m) => format!("💬 Original ({})", m.display_author()),
        None => "💬 Original".to_string(),
    };
    let mut fields = vec![(original_label, field_value(&outcome.request.original))];

    let result = &outcome.result;
    let (title, description, color) = match result.kind {
        TaskKind::Translation => {
            fields.push(("📝 Translation".to_string(), field_value(&result.primary)));
            for (label, name) in [("📚 Context / Term Explanation", TERMS), ("🎭 Tone Notes", TONE)] {
                let text = result.annotation(name);
                if !is_placeholder(text) {
                    fields.push((label.to_string(), truncate(text.trim(), FIELD_MAX)));
                }
            }
            ("🌐 Translation".to_string(), None, COLOR_OK)
        }
        TaskKind::Task => {
            fields.push(("✅ Result".to_string(), field_value(&result.primary)));
            let notes = result.annotation(NOTES);
            if !is_placeholder(notes) {
                fields.push(("🗒️ Notes".to_string(), truncate(notes.trim(), FIELD_MAX)));
            }
            let instruction = match &outcome.request.action {
                TaskAction::Task { instruction } => Some(instruction.clone()),
                TaskAction::Translate { .. } => None,
            };
            ("📝 Task".to_string(), instruction, COLOR_TASK)
        }
    };

    EmbedView {
        title,
        description,
        color,
        fields,
        footer: Some(footer_text(outcome, requester)),
    }
}

fn footer_text(outcome: &TaskOutcome, requester: Option<&str>) -> String {
    let who = requester.unwrap_or("Unknown");
    let relevant = &outcome.window.relevant;
    if relevant.is_empty() {
        return format!("Requested by {who}");
    }
    let names: Vec<&str> = relevant.iter().take(3).map(|m| m.display_author()).collect();
    format!(
        "Requested by {who} • Used {} context messages ({})",
        relevant.len(),
        names.join(", ")
    )
}

/// Gateway heartbeat latency in whole milliseconds, or `n/a` before the first ack.
pub fn format_latency(latency: Option<Duration>) -> String {
    match latency {
        Some(d) => format!("{}ms", d.as_millis()),
        None => "n/a".to_string(),
    }
}

/// Reply to the `stats` command.
pub fn stats_view(guilds: usize, latency: Option<Duration>, triggers: &[&str]) -> EmbedView {
    let triggers = if triggers.is_empty() {
        "none".to_string()
    } else {
        triggers.join(" ")
    };
    EmbedView {
        title: "📊 Bot Statistics".to_string(),
        description: None,
        color: COLOR_STATS,
        fields: vec![
            ("Guilds".to_string(), guilds.to_string()),
            ("Latency".to_string(), format_latency(latency)),
            ("Trigger Emoji".to_string(), triggers),
        ],
        footer: None,
    }
}

/// Visible failure for a dispatch that produced no result.
pub fn error_view(original: &str, err: &DispatchError) -> EmbedView {
    EmbedView {
        title: "❌ Translation Error".to_string(),
        description: Some(format!("Failed to process message: {err}")),
        color: COLOR_ERR,
        fields: vec![("Original Message".to_string(), field_value(original))],
        footer: None,
    }
}
