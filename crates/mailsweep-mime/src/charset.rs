//! Charset lookup and the decoding fallback chain.

/// Labels servers use when they do not know the real charset.
const PLACEHOLDER_LABELS: &[&str] = &["unknown", "unknown-8bit", "x-unknown"];

/// Windows-1252 code points for bytes 0x80..=0x9F. `None` marks undefined slots.
const WINDOWS_1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'),
    None,
    Some('\u{201A}'),
    Some('\u{0192}'),
    Some('\u{201E}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02C6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017D}'),
    None,
    None,
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02DC}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203A}'),
    Some('\u{0153}'),
    None,
    Some('\u{017E}'),
    Some('\u{0178}'),
];

/// Character sets decoded natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    /// UTF-8.
    Utf8,
    /// 7-bit US-ASCII.
    Ascii,
    /// ISO-8859-1.
    Latin1,
    /// Windows-1252, the usual real identity of mail labelled ISO-8859-1.
    Windows1252,
}

impl Charset {
    /// Order tried when the declared charset is missing or fails.
    pub const FALLBACKS: [Self; 2] = [Self::Utf8, Self::Latin1];

    /// Resolves a MIME charset label, ignoring case and any RFC 2231 language suffix.
    #[must_use]
    pub fn lookup(label: &str) -> Option<Self> {
        let label = label.split('*').next().unwrap_or_default().trim();
        match label.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Some(Self::Utf8),
            "us-ascii" | "ascii" | "ansi_x3.4-1968" => Some(Self::Ascii),
            "iso-8859-1" | "iso8859-1" | "iso_8859-1" | "latin1" | "latin-1" | "l1" => {
                Some(Self::Latin1)
            }
            "windows-1252" | "cp1252" => Some(Self::Windows1252),
            _ => None,
        }
    }

    /// Decodes `bytes` strictly, returning `None` if any byte is invalid here.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            Self::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_owned),
            Self::Ascii => bytes
                .is_ascii()
                .then(|| bytes.iter().map(|&b| char::from(b)).collect()),
            Self::Latin1 => Some(bytes.iter().map(|&b| char::from(b)).collect()),
            Self::Windows1252 => bytes
                .iter()
                .map(|&b| match b {
                    0x80..=0x9F => WINDOWS_1252_HIGH[usize::from(b - 0x80)],
                    _ => Some(char::from(b)),
                })
                .collect(),
        }
    }
}

/// Returns true for labels that carry no charset information.
#[must_use]
pub fn is_placeholder(label: &str) -> bool {
    let label = label.trim();
    PLACEHOLDER_LABELS
        .iter()
        .any(|p| p.eq_ignore_ascii_case(label))
}

/// Decodes bytes with the declared charset, then UTF-8, then Latin-1, then lossily.
///
/// Placeholder labels such as `unknown-8bit` are skipped. Never fails.
#[must_use]
pub fn decode_with_fallback(bytes: &[u8], declared: Option<&str>) -> String {
    let declared = declared
        .filter(|label| !is_placeholder(label))
        .and_then(Charset::lookup);

    declared
        .into_iter()
        .chain(Charset::FALLBACKS)
        .find_map(|charset| charset.decode(bytes))
        .unwrap_or_else(|| String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_aliases() {
        assert_eq!(Charset::lookup("UTF-8"), Some(Charset::Utf8));
        assert_eq!(Charset::lookup("utf-8*en"), Some(Charset::Utf8));
        assert_eq!(Charset::lookup("ISO-8859-1"), Some(Charset::Latin1));
        assert_eq!(Charset::lookup("cp1252"), Some(Charset::Windows1252));
        assert_eq!(Charset::lookup("koi8-r"), None);
    }

    #[test]
    fn test_placeholders() {
        assert!(is_placeholder("unknown-8bit"));
        assert!(is_placeholder("UNKNOWN"));
        assert!(!is_placeholder("utf-8"));
    }

    #[test]
    fn test_declared_charset_wins() {
        assert_eq!(decode_with_fallback(&[0x80], Some("windows-1252")), "€");
    }

    #[test]
    fn test_placeholder_skips_to_utf8() {
        let bytes = "Ñandú".as_bytes();
        assert_eq!(decode_with_fallback(bytes, Some("unknown-8bit")), "Ñandú");
    }

    #[test]
    fn test_invalid_utf8_falls_back_to_latin1() {
        // 0xE9 alone is not UTF-8 but is 'é' in Latin-1.
        assert_eq!(decode_with_fallback(b"caf\xE9", Some("utf-8")), "café");
    }

    #[test]
    fn test_unknown_label_uses_chain() {
        assert_eq!(decode_with_fallback(b"plain", Some("x-made-up")), "plain");
    }

    #[test]
    fn test_ascii_rejects_high_bytes() {
        assert_eq!(Charset::Ascii.decode(b"\xFF"), None);
        assert_eq!(Charset::Ascii.decode(b"ok").as_deref(), Some("ok"));
    }

    #[test]
    fn test_windows_1252_undefined_slot() {
        assert_eq!(Charset::Windows1252.decode(&[0x81]), None);
        assert_eq!(decode_with_fallback(&[0x81], Some("cp1252")), "\u{81}");
    }
}
