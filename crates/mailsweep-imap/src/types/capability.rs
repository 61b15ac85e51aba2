//! Server capabilities and completion status.

/// Status of a tagged or untagged condition response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed (operational error).
    No,
    /// Command failed (protocol/syntax error).
    Bad,
    /// Greeting of a pre-authenticated connection.
    PreAuth,
    /// Server is closing the connection.
    Bye,
}

impl Status {
    /// Returns true if this is a successful status.
    #[must_use]
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::PreAuth)
    }
}

/// Server capability.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `IMAP4rev1` (RFC 3501)
    Imap4Rev1,
    /// `IMAP4rev2` (RFC 9051)
    Imap4Rev2,
    /// SASL initial response in AUTHENTICATE (RFC 4959)
    SaslIr,
    /// UIDPLUS extension (RFC 4315)
    UidPlus,
    /// LITERAL+ extension (RFC 7888)
    LiteralPlus,
    /// IDLE command (RFC 2177)
    Idle,
    /// LOGIN disabled
    LoginDisabled,
    /// UTF8=ACCEPT (RFC 6855)
    Utf8Accept,
    /// SASL mechanism, e.g. `AUTH=XOAUTH2`
    Auth(String),
    /// Anything else
    Unknown(String),
}

impl Capability {
    /// Parses a capability atom.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let upper = s.to_ascii_uppercase();
        match upper.as_str() {
            "IMAP4REV1" => Self::Imap4Rev1,
            "IMAP4REV2" => Self::Imap4Rev2,
            "SASL-IR" => Self::SaslIr,
            "UIDPLUS" => Self::UidPlus,
            "LITERAL+" => Self::LiteralPlus,
            "IDLE" => Self::Idle,
            "LOGINDISABLED" => Self::LoginDisabled,
            "UTF8=ACCEPT" => Self::Utf8Accept,
            _ if upper.starts_with("AUTH=") => Self::Auth(s[5..].to_string()),
            _ => Self::Unknown(s.to_string()),
        }
    }

    /// Returns true if this advertises the given SASL mechanism.
    #[must_use]
    pub fn is_auth(&self, mechanism: &str) -> bool {
        matches!(self, Self::Auth(m) if m.eq_ignore_ascii_case(mechanism))
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Imap4Rev1 => write!(f, "IMAP4rev1"),
            Self::Imap4Rev2 => write!(f, "IMAP4rev2"),
            Self::SaslIr => write!(f, "SASL-IR"),
            Self::UidPlus => write!(f, "UIDPLUS"),
            Self::LiteralPlus => write!(f, "LITERAL+"),
            Self::Idle => write!(f, "IDLE"),
            Self::LoginDisabled => write!(f, "LOGINDISABLED"),
            Self::Utf8Accept => write!(f, "UTF8=ACCEPT"),
            Self::Auth(mech) => write!(f, "AUTH={mech}"),
            Self::Unknown(s) => write!(f, "{s}"),
        }
    }
}
