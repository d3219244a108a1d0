//! Parsing of the sectioned replies produced by the translation and task prompts.
//!
//! A reply is a sequence of sections, each introduced by a header line. The
//! header may be written as `[Name]`, `【Name】` or `**Name**` with any of the
//! section's aliases, optionally behind markdown `#` marks. The `Name:` and
//! `Name：` forms only match a section's full name, so body lines such as
//! `Note: ...` stay body text. Text after a header on the same line belongs to
//! that section.

/// One section the parser looks for, with the header spellings it accepts.
#[derive(Debug, Clone, Copy)]
pub struct Section {
    /// Canonical name reported in [`Annotation::name`].
    pub name: &'static str,
    /// Lower-case header spellings.
    pub aliases: &'static [&'static str],
}

/// Expected shape of a reply: one required primary section plus optional
/// annotation sections.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub primary: Section,
    pub annotations: &'static [Section],
}

pub const TERMS: &str = "Context/Term Explanation";
pub const TONE: &str = "Tone Notes";
pub const NOTES: &str = "Notes";

pub const TRANSLATION_LAYOUT: Layout = Layout {
    primary: Section {
        name: "Translation",
        aliases: &["translation", "翻译", "译文"],
    },
    annotations: &[
        Section {
            name: TERMS,
            aliases: &[
                "context/term explanation",
                "context / term explanation",
                "term explanation",
                "context explanation",
                "context",
                "背景/术语解释",
                "术语解释",
            ],
        },
        Section {
            name: TONE,
            aliases: &["tone notes", "tone", "语气说明", "语气"],
        },
    ],
};

pub const TASK_LAYOUT: Layout = Layout {
    primary: Section {
        name: "Result",
        aliases: &["result", "结果"],
    },
    annotations: &[Section {
        name: NOTES,
        aliases: &["notes", "note", "备注"],
    }],
};

/// A named annotation section. `text` is empty when the reply omitted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub name: String,
    pub text: String,
}

/// Outcome of parsing a reply against a [`Layout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedReply {
    Parsed {
        primary: String,
        /// One entry per annotation section of the layout, in layout order.
        annotations: Vec<Annotation>,
    },
    /// The primary section was missing or empty.
    Unparsed { raw_text: String },
}

impl Section {
    fn matches(&self, lowered: &str, full_name_only: bool) -> bool {
        if full_name_only {
            self.name.to_lowercase() == lowered
        } else {
            self.aliases.contains(&lowered)
        }
    }
}

/// Which section of the layout a header names. `0` is the primary section,
/// `i + 1` is annotation `i`.
fn section_index(layout: &Layout, name: &str, full_name_only: bool) -> Option<usize> {
    let lowered = name.trim().trim_end_matches([':', '：']).trim().to_lowercase();
    if layout.primary.matches(&lowered, full_name_only) {
        return Some(0);
    }
    layout
        .annotations
        .iter()
        .position(|s| s.matches(&lowered, full_name_only))
        .map(|i| i + 1)
}

/// Recognise a header line. Returns the section index and any text that
/// follows the header on the same line.
fn header<'a>(layout: &Layout, line: &'a str) -> Option<(usize, &'a str)> {
    let line = line.trim().trim_start_matches('#').trim_start();

    for (open, close) in [("[", "]"), ("【", "】"), ("**", "**")] {
        if let Some(inner) = line.strip_prefix(open) {
            let end = inner.find(close)?;
            let idx = section_index(layout, &inner[..end], false)?;
            let rest = inner[end + close.len()..].trim_start();
            let rest = rest.trim_start_matches([':', '：']).trim_start();
            return Some((idx, rest));
        }
    }

    let colon = line.find([':', '：'])?;
    let idx = section_index(layout, &line[..colon], true)?;
    let sep_len = line[colon..].chars().next().map_or(1, char::len_utf8);
    Some((idx, line[colon + sep_len..].trim_start()))
}

/// Split `raw` into the sections of `layout`.
///
/// Text before the first recognised header is dropped. A section that occurs
/// twice has its bodies joined. Missing annotation sections come back empty.
pub fn parse(raw: &str, layout: &Layout) -> ParsedReply {
    let mut bodies: Vec<Option<Vec<&str>>> = vec![None; layout.annotations.len() + 1];
    let mut current: Option<usize> = None;

    for line in raw.lines() {
        if let Some((idx, rest)) = header(layout, line) {
            let body = bodies[idx].get_or_insert_with(Vec::new);
            if !rest.is_empty() {
                body.push(rest);
            }
            current = Some(idx);
        } else if let Some(idx) = current {
            if let Some(body) = bodies[idx].as_mut() {
                body.push(line);
            }
        }
    }

    let join = |lines: &Option<Vec<&str>>| {
        lines
            .as_ref()
            .map(|l| l.join("\n").trim().to_string())
            .unwrap_or_default()
    };

    let primary = join(&bodies[0]);
    if primary.is_empty() {
        return ParsedReply::Unparsed {
            raw_text: raw.to_string(),
        };
    }

    let annotations = layout
        .annotations
        .iter()
        .enumerate()
        .map(|(i, section)| Annotation {
            name: section.name.to_string(),
            text: join(&bodies[i + 1]),
        })
        .collect();

    ParsedReply::Parsed {
        primary,
        annotations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(reply: ParsedReply) -> (String, Vec<Annotation>) {
        match reply {
            ParsedReply::Parsed {
                primary,
                annotations,
            } => (primary, annotations),
            ParsedReply::Unparsed { raw_text } => panic!("unexpected unparsed reply: {raw_text}"),
        }
    }

    #[test]
    fn full_translation_reply() {
        let raw = "[Translation]\nこんにちは\n世界\n\n[Context/Term Explanation]\nNone\n\n[Tone Notes]\nFriendly, casual.";
        let (primary, annotations) = parsed(parse(raw, &TRANSLATION_LAYOUT));
        assert_eq!(primary, "こんにちは\n世界");
        assert_eq!(annotations[0].name, TERMS);
        assert_eq!(annotations[0].text, "None");
        assert_eq!(annotations[1].name, TONE);
        assert_eq!(annotations[1].text, "Friendly, casual.");
    }

    #[test]
    fn missing_annotations_are_empty() {
        let (primary, annotations) = parsed(parse("[Translation]\nhola", &TRANSLATION_LAYOUT));
        assert_eq!(primary, "hola");
        assert_eq!(annotations.len(), 2);
        assert!(annotations.iter().all(|a| a.text.is_empty()));
    }

    #[test]
    fn alternative_header_styles() {
        let raw = "Here you go.\n**Translation**\nbonjour\n【语气说明】\n礼貌\nTone Notes: second block";
        let (primary, annotations) = parsed(parse(raw, &TRANSLATION_LAYOUT));
        assert_eq!(primary, "bonjour");
        assert_eq!(annotations[1].text, "礼貌\nsecond block");
    }

    #[test]
    fn inline_header_text() {
        let raw = "## Translation: good morning\nTone Notes：warm";
        let (primary, annotations) = parsed(parse(raw, &TRANSLATION_LAYOUT));
        assert_eq!(primary, "good morning");
        assert_eq!(annotations[1].text, "warm");
    }

    #[test]
    fn unstructured_reply_is_unparsed() {
        let raw = "Sorry, I cannot help with that.";
        assert_eq!(
            parse(raw, &TRANSLATION_LAYOUT),
            ParsedReply::Unparsed {
                raw_text: raw.to_string()
            }
        );
    }

    #[test]
    fn empty_primary_is_unparsed() {
        let raw = "[Translation]\n\n[Tone Notes]\ncalm";
        assert!(matches!(parse(raw, &TRANSLATION_LAYOUT), ParsedReply::Unparsed { .. }));
    }

    #[test]
    fn task_layout() {
        let raw = "[Result]\nMeeting moved to Friday.\n[Notes]\nNone";
        let (primary, annotations) = parsed(parse(raw, &TASK_LAYOUT));
        assert_eq!(primary, "Meeting moved to Friday.");
        assert_eq!(annotations[0].name, NOTES);
        assert_eq!(annotations[0].text, "None");
    }

    #[test]
    fn other_layout_headers_are_body_text() {
        let raw = "[Result]\n[Translation]\nstill result text";
        let (primary, _) = parsed(parse(raw, &TASK_LAYOUT));
        assert_eq!(primary, "[Translation]\nstill result text");
    }

    #[test]
    fn body_lines_starting_with_short_aliases_stay_in_place() {
        let raw = "[Translation]\nContext: we need more data before Friday\n[Tone Notes]\nneutral";
        let (primary, annotations) = parsed(parse(raw, &TRANSLATION_LAYOUT));
        assert_eq!(primary, "Context: we need more data before Friday");
        assert_eq!(annotations[0].text, "");
        assert_eq!(annotations[1].text, "neutral");

        let raw = "[Result]\nNote: the meeting moved to Friday.\n[Notes]\nNone";
        let (primary, annotations) = parsed(parse(raw, &TASK_LAYOUT));
        assert_eq!(primary, "Note: the meeting moved to Friday.");
        assert_eq!(annotations[0].text, "None");
    }

    #[test]
    fn short_aliases_still_work_in_brackets() {
        let raw = "[Translation]\nhi\n[Context]\ngreeting\n【语气】\ncasual";
        let (_, annotations) = parsed(parse(raw, &TRANSLATION_LAYOUT));
        assert_eq!(annotations[0].text, "greeting");
        assert_eq!(annotations[1].text, "casual");
    }
}
