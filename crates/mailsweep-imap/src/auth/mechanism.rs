//! SASL mechanism responders.

use mailsweep_oauth::sasl::{XOAUTH2, parse_challenge};
use tracing::debug;

use super::BearerCredential;

/// Client side of a SASL mechanism, driven by the generic AUTHENTICATE path.
pub trait SaslMechanism {
    /// Mechanism name as sent after `AUTHENTICATE`.
    fn name(&self) -> &str;

    /// Base64 initial response, sent inline when the server supports SASL-IR.
    fn initial_response(&self) -> Option<String> {
        None
    }

    /// Answers a decoded server challenge with a base64 response line.
    fn respond(&mut self, challenge: &[u8]) -> String;
}

/// XOAUTH2 responder.
///
/// Always answers with the encoded bearer string. When the server rejects the
/// token it sends a JSON error document as a challenge; that document is
/// logged, and the tagged NO that follows ends the exchange.
#[derive(Clone)]
pub struct XOAuth2 {
    encoded: String,
}

impl XOAuth2 {
    /// Creates a responder for a credential.
    #[must_use]
    pub fn new(credential: &BearerCredential) -> Self {
        Self::from_encoded(credential.sasl_response())
    }

    /// Creates a responder from an already-encoded payload.
    #[must_use]
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self {
            encoded: encoded.into(),
        }
    }
}

impl std::fmt::Debug for XOAuth2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XOAuth2").finish_non_exhaustive()
    }
}

impl SaslMechanism for XOAuth2 {
    fn name(&self) -> &str {
        XOAUTH2
    }

    fn initial_response(&self) -> Option<String> {
        Some(self.encoded.clone())
    }

    fn respond(&mut self, challenge: &[u8]) -> String {
        if let Some(error) = parse_challenge(challenge) {
            debug!(status = %error.status, scope = ?error.scope, "XOAUTH2 challenge error");
        }
        self.encoded.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_xoauth2_always_returns_payload() {
        let credential = BearerCredential::new("user@example.com", "token");
        let mut mechanism = XOAuth2::new(&credential);

        let expected = "dXNlcj11c2VyQGV4YW1wbGUuY29tAWF1dGg9QmVhcmVyIHRva2VuAQE=";
        assert_eq!(mechanism.name(), "XOAUTH2");
        assert_eq!(mechanism.initial_response().as_deref(), Some(expected));
        assert_eq!(mechanism.respond(b""), expected);
        assert_eq!(
            mechanism.respond(br#"{"status":"401","schemes":"Bearer","scope":"x"}"#),
            expected
        );
    }

    #[test]
    fn test_debug_hides_payload() {
        let mechanism = XOAuth2::from_encoded("c2VjcmV0");
        assert!(!format!("{mechanism:?}").contains("c2VjcmV0"));
    }
}
