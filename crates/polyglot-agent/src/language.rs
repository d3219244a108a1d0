//! Language names recognised in directives and trigger config.

/// (alias, display name). Aliases are matched case-insensitively.
const LANGUAGES: &[(&str, &str)] = &[
    ("chinese", "Chinese (Simplified)"),
    ("simplified chinese", "Chinese (Simplified)"),
    ("traditional chinese", "Chinese (Traditional)"),
    ("english", "English"),
    ("japanese", "Japanese"),
    ("korean", "Korean"),
    ("french", "French"),
    ("german", "German"),
    ("spanish", "Spanish"),
    ("russian", "Russian"),
    ("italian", "Italian"),
    ("portuguese", "Portuguese"),
    ("arabic", "Arabic"),
    ("中文", "Chinese (Simplified)"),
    ("简体中文", "Chinese (Simplified)"),
    ("繁体中文", "Chinese (Traditional)"),
    ("英文", "English"),
    ("英语", "English"),
    ("日文", "Japanese"),
    ("日语", "Japanese"),
    ("韩文", "Korean"),
    ("韩语", "Korean"),
    ("法文", "French"),
    ("法语", "French"),
    ("德文", "German"),
    ("德语", "German"),
    ("西班牙文", "Spanish"),
    ("西班牙语", "Spanish"),
    ("俄文", "Russian"),
    ("俄语", "Russian"),
    ("意大利文", "Italian"),
    ("意大利语", "Italian"),
    ("葡萄牙文", "Portuguese"),
    ("葡萄牙语", "Portuguese"),
    ("阿拉伯文", "Arabic"),
    ("阿拉伯语", "Arabic"),
];

/// Canonical display name for a language alias.
///
/// Unknown names are returned trimmed but otherwise verbatim, so a directive
/// naming an unlisted language still reaches the prompt.
pub fn canonical_name(name: &str) -> String {
    let trimmed = name.trim();
    let lowered = trimmed.to_lowercase();
    LANGUAGES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, display)| display.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// If `text` starts with a known alias, return the display name and the
/// byte length of the alias. Longest alias wins (`简体中文` over `中文`).
pub fn match_prefix(text: &str) -> Option<(&'static str, usize)> {
    LANGUAGES
        .iter()
        .filter(|(alias, _)| {
            text.get(..alias.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(alias))
        })
        .max_by_key(|(alias, _)| alias.len())
        .map(|(alias, display)| (*display, alias.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names() {
        assert_eq!(canonical_name("Japanese"), "Japanese");
        assert_eq!(canonical_name(" japanese "), "Japanese");
        assert_eq!(canonical_name("日语"), "Japanese");
        assert_eq!(canonical_name("Traditional Chinese"), "Chinese (Traditional)");
        assert_eq!(canonical_name("Klingon"), "Klingon");
    }

    #[test]
    fn prefix_prefers_longest_alias() {
        assert_eq!(match_prefix("简体中文：你好"), Some(("Chinese (Simplified)", "简体中文".len())));
        assert_eq!(match_prefix("日文你好"), Some(("Japanese", "日文".len())));
        assert_eq!(match_prefix("English please"), Some(("English", 7)));
        assert_eq!(match_prefix("Klingon"), None);
    }
}
