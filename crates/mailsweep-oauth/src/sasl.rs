//! XOAUTH2 SASL payloads.
//!
//! XOAUTH2 is a single-round-trip mechanism: the client sends
//! `user=<identity>\x01auth=Bearer <token>\x01\x01`, base64 encoded, and the
//! server answers with a tagged status. On failure the server first sends a
//! continuation carrying a base64 JSON error document.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// SASL mechanism name.
pub const XOAUTH2: &str = "XOAUTH2";

/// Builds the unencoded XOAUTH2 payload.
#[must_use]
pub fn xoauth2_payload(user: &str, token: &str) -> String {
    format!("user={user}\x01auth=Bearer {token}\x01\x01")
}

/// Generates the base64 XOAUTH2 response.
///
/// # Example
///
/// ```
/// use mailsweep_oauth::sasl::xoauth2_response;
///
/// let response = xoauth2_response("user@example.com", "token");
/// assert_eq!(response, "dXNlcj11c2VyQGV4YW1wbGUuY29tAWF1dGg9QmVhcmVyIHRva2VuAQE=");
/// ```
#[must_use]
pub fn xoauth2_response(user: &str, token: &str) -> String {
    STANDARD.encode(xoauth2_payload(user, token).as_bytes())
}

/// Splits a base64 XOAUTH2 response back into identity and token.
///
/// Returns `None` if the input is not a well-formed XOAUTH2 payload.
#[must_use]
pub fn decode_xoauth2(encoded: &str) -> Option<(String, String)> {
    let raw = STANDARD.decode(encoded).ok()?;
    let text = String::from_utf8(raw).ok()?;
    let rest = text.strip_suffix("\x01\x01")?;
    let (user, auth) = rest.split_once('\x01')?;
    let user = user.strip_prefix("user=")?;
    let token = auth.strip_prefix("auth=Bearer ")?;
    Some((user.to_string(), token.to_string()))
}

/// Error document a server sends in the continuation after a rejected token.
///
/// Example: `{"status":"401","schemes":"bearer","scope":"https://outlook.office.com/..."}`
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ChallengeError {
    /// HTTP-like status code.
    pub status: String,
    /// Authentication schemes supported.
    #[serde(default)]
    pub schemes: String,
    /// Scope the server expected.
    #[serde(default)]
    pub scope: Option<String>,
}

/// Decodes a server challenge into its JSON error document, if it is one.
#[must_use]
pub fn parse_challenge(challenge: &[u8]) -> Option<ChallengeError> {
    serde_json::from_slice(challenge).ok()
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
    fn test_xoauth2_format() {
        let response = xoauth2_response("test@test.com", "abc");
        let decoded = STANDARD.decode(&response).unwrap();
        let decoded_str = String::from_utf8(decoded).unwrap();

        assert_eq!(decoded_str, "user=test@test.com\x01auth=Bearer abc\x01\x01");
    }

    #[test]
    fn test_response_is_base64() {
        let response = xoauth2_response("user@example.com", "token");
        assert!(!response.contains("user@example.com"));
        assert!(STANDARD.decode(&response).is_ok());
    }

    #[test]
    fn test_decode_rejects_other_payloads() {
        assert!(decode_xoauth2("not base64!").is_none());
        assert!(decode_xoauth2(&STANDARD.encode("\0user\0pass")).is_none());
    }

    #[test]
    fn test_parse_challenge() {
        let json = br#"{"status":"401","schemes":"bearer","scope":"https://outlook.office.com/IMAP.AccessAsUser.All"}"#;
        let error = parse_challenge(json).unwrap();
        assert_eq!(error.status, "401");
        assert_eq!(error.schemes, "bearer");
        assert!(error.scope.unwrap().contains("IMAP"));
    }

    #[test]
    fn test_parse_challenge_ignores_noise() {
        assert!(parse_challenge(b"").is_none());
        assert!(parse_challenge(b"ready").is_none());
    }

    proptest! {
        #[test]
        fn xoauth2_round_trips(
            user in "[a-zA-Z0-9._%+-]{1,20}@[a-z0-9.-]{1,20}",
            token in "[A-Za-z0-9._~+/=-]{1,200}",
        ) {
            let encoded = xoauth2_response(&user, &token);
            prop_assert_eq!(decode_xoauth2(&encoded), Some((user, token)));
        }
    }
}
