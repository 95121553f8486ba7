//! Device identifier (user agent) normalization.

/// Upper bound on stored identifier length, in Unicode code points.
pub const MAX_IDENTIFIER_CHARS: usize = 256;

/// Reduces a user agent to its product token: everything before the first
/// `/` or whitespace, printable ASCII only, capped at
/// [`MAX_IDENTIFIER_CHARS`].
pub fn normalize_user_agent(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };

    let token_end = raw
        .find(|c: char| c == '/' || c.is_whitespace())
        .unwrap_or(raw.len());

    raw[..token_end]
        .chars()
        .filter(|c| matches!(c, ' '..='~'))
        .take(MAX_IDENTIFIER_CHARS)
        .collect()
}

/// Keeps the full user agent for display, minus control characters, capped
/// at [`MAX_IDENTIFIER_CHARS`] code points so a multi-byte glyph is never
/// split.
pub fn sanitize_user_agent(raw: Option<&str>) -> String {
    raw.map(|raw| {
        raw.trim()
            .chars()
            .filter(|c| !c.is_control())
            .take(MAX_IDENTIFIER_CHARS)
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_stops_at_slash_or_whitespace() {
        assert_eq!(normalize_user_agent(Some("cgminer/4.10.0")), "cgminer");
        assert_eq!(normalize_user_agent(Some("bitaxe v2.1/x")), "bitaxe");
        assert_eq!(normalize_user_agent(Some("NerdMiner\tV2")), "NerdMiner");
        assert_eq!(normalize_user_agent(Some("/leading")), "");
    }

    #[test]
    fn token_drops_non_printable_ascii() {
        assert_eq!(normalize_user_agent(Some("mi\u{7}ner\u{e9}")), "miner");
        assert_eq!(normalize_user_agent(Some("⛏️rig")), "rig");
    }

    #[test]
    fn empty_and_missing_identifiers() {
        assert_eq!(normalize_user_agent(None), "");
        assert_eq!(normalize_user_agent(Some("")), "");
        assert_eq!(sanitize_user_agent(None), "");
    }

    #[test]
    fn identifiers_are_capped() {
        let long = "a".repeat(1_000);
        assert_eq!(normalize_user_agent(Some(&long)).len(), MAX_IDENTIFIER_CHARS);

        let glyphs = "é".repeat(300);
        let sanitized = sanitize_user_agent(Some(&glyphs));
        assert_eq!(sanitized.chars().count(), MAX_IDENTIFIER_CHARS);
        assert!(sanitized.chars().all(|c| c == 'é'));
    }

    #[test]
    fn sanitize_keeps_version_and_strips_controls() {
        assert_eq!(
            sanitize_user_agent(Some(" cgminer/4.10.0\r\n")),
            "cgminer/4.10.0"
        );
    }
}
