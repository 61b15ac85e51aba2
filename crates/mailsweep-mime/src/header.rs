//! Header block parsing for `BODY.PEEK[HEADER.FIELDS (...)]` responses.

use std::collections::HashMap;

use crate::encoding::decode_header;

/// Subject shown when a message carries none.
pub const NO_SUBJECT: &str = "(No Subject)";

/// Collection of raw header fields, keyed case-insensitively.
///
/// Values are kept as bytes because servers hand back whatever the sender
/// wrote, which is not always valid UTF-8.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    headers: HashMap<String, Vec<Vec<u8>>>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a raw header value.
    pub fn add(&mut self, name: &str, value: impl Into<Vec<u8>>) {
        self.headers
            .entry(name.trim().to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// Parses a raw header block, unfolding continuation lines.
    ///
    /// Parsing stops at the first empty line. Lines without a colon are ignored.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        let mut headers = Self::new();
        let mut current: Option<(String, Vec<u8>)> = None;

        for line in raw.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);

            if line.is_empty() {
                break;
            }

            if line[0] == b' ' || line[0] == b'\t' {
                if let Some((_, value)) = current.as_mut() {
                    value.push(b' ');
                    value.extend_from_slice(line.trim_ascii());
                }
                continue;
            }

            if let Some((name, value)) = current.take() {
                headers.add(&name, value);
            }

            if let Some(colon) = line.iter().position(|&b| b == b':') {
                let name = String::from_utf8_lossy(&line[..colon]).into_owned();
                current = Some((name, line[colon + 1..].trim_ascii().to_vec()));
            }
        }

        if let Some((name, value)) = current {
            headers.add(&name, value);
        }

        headers
    }

    /// Gets the first raw value for a header.
    #[must_use]
    pub fn get_raw(&self, name: &str) -> Option<&[u8]> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|v| v.first().map(Vec::as_slice))
    }

    /// Gets the first value for a header, decoded to text.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        self.get_raw(name).map(decode_header)
    }

    /// Decoded subject, or [`NO_SUBJECT`] when absent or blank.
    #[must_use]
    pub fn subject(&self) -> String {
        self.get("Subject")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| NO_SUBJECT.to_string())
    }

    /// Display name of the `From` header, or an empty string when absent.
    #[must_use]
    pub fn sender_name(&self) -> String {
        self.get("From")
            .map(|from| display_name(&from))
            .unwrap_or_default()
    }

    /// Number of distinct header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Returns true if no headers were parsed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

/// Reduces an address like `"Name" <user@host>` to `Name`.
///
/// Addresses without a display name are returned unchanged.
#[must_use]
pub fn display_name(from: &str) -> String {
    match from.split_once('<') {
        Some((name, _)) if !name.trim().is_empty() => {
            name.trim().trim_matches('"').trim().to_string()
        }
        _ => from.trim().to_string(),
    }
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
    fn test_headers_parse() {
        let raw = concat!(
            "Subject: Your monthly\r\n",
            "\tstatement\r\n",
            "From: Bank <no-reply@bank.example>\r\n",
            "\r\n"
        );

        let headers = Headers::parse(raw.as_bytes());
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.subject(), "Your monthly statement");
        assert_eq!(headers.sender_name(), "Bank");
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let headers = Headers::parse(b"SUBJECT: hi\r\n");
        assert_eq!(headers.get("subject").as_deref(), Some("hi"));
    }

    #[test]
    fn test_missing_subject_defaults() {
        let headers = Headers::parse(b"\r\n");
        assert!(headers.is_empty());
        assert_eq!(headers.subject(), NO_SUBJECT);
    }

    #[test]
    fn test_blank_subject_defaults() {
        let headers = Headers::parse(b"Subject: \r\n\r\n");
        assert_eq!(headers.subject(), NO_SUBJECT);
    }

    #[test]
    fn test_encoded_subject() {
        let headers = Headers::parse(b"Subject: =?UTF-8?B?8J+OiSBPZmVydGE=?=\r\n\r\n");
        assert_eq!(headers.subject(), "🎉 Oferta");
    }

    #[test]
    fn test_non_utf8_value() {
        let headers = Headers::parse(b"Subject: Ma\xF1ana\r\n\r\n");
        assert_eq!(headers.subject(), "Mañana");
    }

    #[test]
    fn test_stops_at_blank_line() {
        let headers = Headers::parse(b"Subject: a\r\n\r\nX-Body: b\r\n");
        assert!(headers.get_raw("X-Body").is_none());
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("\"Netflix\" <info@netflix.com>"), "Netflix");
        assert_eq!(display_name("Netflix <info@netflix.com>"), "Netflix");
        assert_eq!(display_name("<info@netflix.com>"), "<info@netflix.com>");
        assert_eq!(display_name("info@netflix.com"), "info@netflix.com");
    }
}
