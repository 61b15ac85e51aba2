//! RFC 2047 encoded-word decoding.
//!
//! Header values may mix literal text with encoded words of the form
//! `=?charset?B|Q?payload?=`. Whitespace separating two adjacent encoded
//! words is not part of the text and is dropped.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::charset::decode_with_fallback;
use crate::error::{Error, Result};

/// Base64 engine that tolerates missing padding, which some mailers emit.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decodes a raw header value into text.
///
/// Encoded words are decoded with their declared charset, falling back to
/// UTF-8 and Latin-1; literal bytes go through the same fallback chain.
/// Malformed encoded words are kept verbatim. This function never fails.
#[must_use]
pub fn decode_header(raw: &[u8]) -> String {
    let mut out = String::new();
    let mut literal_start = 0;
    let mut after_word = false;
    let mut i = 0;

    while i < raw.len() {
        if raw[i..].starts_with(b"=?") {
            if let Some((text, consumed)) = decode_encoded_word(&raw[i..]) {
                let between = &raw[literal_start..i];
                if !(after_word && between.iter().all(u8::is_ascii_whitespace)) {
                    out.push_str(&decode_literal(between));
                }
                out.push_str(&text);
                i += consumed;
                literal_start = i;
                after_word = true;
                continue;
            }
        }
        i += 1;
    }

    out.push_str(&decode_literal(&raw[literal_start..]));
    out.trim().to_string()
}

/// Decodes literal header bytes, unfolding any embedded line breaks.
fn decode_literal(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }
    let unfolded: Vec<u8> = bytes
        .iter()
        .copied()
        .filter(|&b| b != b'\r' && b != b'\n')
        .collect();
    decode_with_fallback(&unfolded, None)
}

/// Attempts to decode one encoded word at the start of `input`.
///
/// Returns the decoded text and the number of bytes consumed, or `None`
/// when the input does not start with a well-formed encoded word.
fn decode_encoded_word(input: &[u8]) -> Option<(String, usize)> {
    let (charset, bytes, consumed) = split_encoded_word(input).ok()?;
    Some((decode_with_fallback(&bytes, Some(charset)), consumed))
}

/// Splits `=?charset?enc?payload?=` into charset, decoded payload bytes and length.
fn split_encoded_word(input: &[u8]) -> Result<(&str, Vec<u8>, usize)> {
    let body = input
        .strip_prefix(b"=?")
        .ok_or_else(|| Error::InvalidEncodedWord("missing =? prefix".to_string()))?;

    let charset_end = body
        .iter()
        .position(|&b| b == b'?')
        .ok_or_else(|| Error::InvalidEncodedWord("missing charset terminator".to_string()))?;
    let charset = std::str::from_utf8(&body[..charset_end])
        .map_err(|_| Error::InvalidEncodedWord("non-ASCII charset".to_string()))?;
    if charset.is_empty() || charset.bytes().any(|b| b.is_ascii_whitespace()) {
        return Err(Error::InvalidEncodedWord(format!("bad charset {charset:?}")));
    }

    let rest = &body[charset_end + 1..];
    let (&encoding, rest) = rest
        .split_first()
        .ok_or_else(|| Error::InvalidEncodedWord("missing encoding".to_string()))?;
    let payload_area = rest
        .strip_prefix(b"?")
        .ok_or_else(|| Error::InvalidEncodedWord("missing payload separator".to_string()))?;

    let payload_end = payload_area
        .windows(2)
        .position(|w| w == b"?=")
        .ok_or_else(|| Error::InvalidEncodedWord("unterminated".to_string()))?;
    let payload = &payload_area[..payload_end];
    if payload.iter().any(u8::is_ascii_whitespace) {
        return Err(Error::InvalidEncodedWord("whitespace in payload".to_string()));
    }

    let bytes = match encoding.to_ascii_uppercase() {
        b'B' => LENIENT_BASE64.decode(payload)?,
        b'Q' => decode_q(payload),
        other => return Err(Error::UnknownEncoding(char::from(other))),
    };

    // "=?" + charset + "?" + encoding + "?" + payload + "?="
    let consumed = 2 + charset_end + 1 + 1 + 1 + payload_end + 2;
    Ok((charset, bytes, consumed))
}

/// Decodes the RFC 2047 `Q` encoding. Invalid escapes are kept literally.
fn decode_q(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len());
    let mut i = 0;
    while i < payload.len() {
        match payload[i] {
            b'_' => out.push(b' '),
            b'=' => {
                let hex = payload
                    .get(i + 1..i + 3)
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                if let Some(byte) = hex {
                    out.push(byte);
                    i += 3;
                    continue;
                }
                out.push(b'=');
            }
            b => out.push(b),
        }
        i += 1;
    }
    out
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
    use proptest::prelude::*;

    #[test]
    fn test_plain_text_passthrough() {
        assert_eq!(decode_header(b"Your receipt"), "Your receipt");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(decode_header(b""), "");
    }

    #[test]
    fn test_base64_word() {
        assert_eq!(decode_header(b"=?utf-8?B?SMOpbGxv?="), "Héllo");
    }

    #[test]
    fn test_base64_without_padding() {
        // "Hi!!" is "SGkhIQ==" padded.
        assert_eq!(decode_header(b"=?utf-8?B?SGkhIQ?="), "Hi!!");
    }

    #[test]
    fn test_q_word_with_underscores() {
        assert_eq!(decode_header(b"=?utf-8?Q?Caf=C3=A9_con_leche?="), "Café con leche");
    }

    #[test]
    fn test_adjacent_words_join_without_space() {
        let raw = b"=?utf-8?Q?Hola_?= =?utf-8?Q?mundo?=";
        assert_eq!(decode_header(raw), "Hola mundo");
    }

    #[test]
    fn test_mixed_literal_and_word() {
        let raw = b"Re: =?iso-8859-1?Q?Se=F1or?= Smith";
        assert_eq!(decode_header(raw), "Re: Señor Smith");
    }

    #[test]
    fn test_unknown_8bit_falls_back() {
        let raw = b"=?unknown-8bit?Q?Pel=C3=ADcula?=";
        assert_eq!(decode_header(raw), "Película");
    }

    #[test]
    fn test_invalid_bytes_in_declared_charset() {
        // Declared UTF-8 but carries a Latin-1 byte.
        let raw = b"=?utf-8?Q?Ni=F1o?=";
        assert_eq!(decode_header(raw), "Niño");
    }

    #[test]
    fn test_malformed_word_kept_verbatim() {
        assert_eq!(decode_header(b"=?utf-8?X?abc?="), "=?utf-8?X?abc?=");
        assert_eq!(decode_header(b"=?utf-8?B?abc"), "=?utf-8?B?abc");
    }

    #[test]
    fn test_raw_latin1_bytes() {
        assert_eq!(decode_header(b"Ofertas de oto\xF1o"), "Ofertas de otoño");
    }

    #[test]
    fn test_folded_literal() {
        assert_eq!(decode_header(b"Long\r\n subject"), "Long subject");
    }

    #[test]
    fn test_q_invalid_escape() {
        assert_eq!(decode_q(b"100=%"), b"100=%".to_vec());
    }

    proptest! {
        #[test]
        fn decode_header_never_panics(raw in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = decode_header(&raw);
        }

        #[test]
        fn encoded_words_with_garbage_never_panic(
            charset in "[a-zA-Z0-9-]{1,12}",
            payload in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let mut raw = format!("=?{charset}?Q?").into_bytes();
            raw.extend(payload.iter().filter(|b| !b.is_ascii_whitespace() && **b != b'?'));
            raw.extend_from_slice(b"?=");
            let _ = decode_header(&raw);
        }
    }
}
