//! `config.json` loading and validation.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mailsweep_core::{
    DEFAULT_TENANT, MatchPredicate, SenderNameFilter, SubjectFilter, TokenSettings,
};
use mailsweep_imap::{AuthMode, DEFAULT_MAILBOX, DEFAULT_TLS_PORT};
use serde::Deserialize;
use thiserror::Error;

/// Client ids shipped in sample configurations.
const PLACEHOLDER_CLIENT_IDS: [&str; 2] = ["your-client-id-here", "tu-client-id-aqui"];

/// Sample configuration looked for next to a missing one.
const EXAMPLE_FILE: &str = "config.json.example";

const DEFAULT_SERVER: &str = "outlook.office365.com";
const DEFAULT_BATCH_SIZE: usize = 100;

/// Problems with the configuration file. Exit code 2.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file does not exist.
    #[error("configuration file '{}' not found.\n        {}", path.display(), hint)]
    NotFound {
        /// Path that was tried.
        path: PathBuf,
        /// What to do about it.
        hint: String,
    },

    /// The file exists but could not be read.
    #[error("could not read '{}': {source}", path.display())]
    Read {
        /// Path that was tried.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid JSON or lacks a required key.
    #[error("error parsing configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is missing or out of range.
    #[error("'{key}' {reason}")]
    Invalid {
        /// Dotted key path.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Mailbox owner; also the SASL identity.
    pub email: String,
    /// Sign-in settings.
    pub oauth2: OAuth2Config,
    /// What to delete.
    pub cleaning: CleaningConfig,
    /// Server settings.
    #[serde(default)]
    pub imap: ImapConfig,
}

/// `oauth2` section.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuth2Config {
    /// Application (client) id.
    #[serde(default)]
    pub client_id: Option<String>,
    /// Directory tenant.
    #[serde(default = "default_tenant")]
    pub tenant_id: String,
    /// Ignore cached tokens.
    #[serde(default)]
    pub force_interactive_login: bool,
    /// Literal token that skips sign-in.
    #[serde(default)]
    pub access_token: Option<String>,
}

/// `cleaning` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CleaningConfig {
    /// Sender display-name substrings, searched server-side.
    #[serde(default)]
    pub sender_names_to_search: Vec<String>,
    /// Subject substrings, matched client-side.
    #[serde(default)]
    pub subject_keywords: Vec<String>,
    /// Delete matches; `false` only lists them.
    #[serde(default = "default_true")]
    pub move_to_deleted: bool,
    /// UIDs per deletion batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// `imap` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImapConfig {
    /// Server host name.
    pub server: String,
    /// TLS port.
    pub port: u16,
    /// Mailbox to clean.
    pub mailbox: String,
    /// `auto`, `generic` or `manual`.
    pub auth_mode: String,
    /// Seconds allowed for connect and sign-in.
    pub connect_timeout_secs: u64,
    /// Seconds allowed per command.
    pub command_timeout_secs: u64,
}

impl Default for ImapConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            port: DEFAULT_TLS_PORT,
            mailbox: "Inbox".to_string(),
            auth_mode: "auto".to_string(),
            connect_timeout_secs: 30,
            command_timeout_secs: 60,
        }
    }
}

fn default_tenant() -> String {
    DEFAULT_TENANT.to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Config {
    /// Reads, parses and validates `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first problem found.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                    hint: missing_file_hint(path),
                });
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::parse(&text)
    }

    /// Parses and validates JSON text.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first problem found.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.email.trim().is_empty() {
            return Err(ConfigError::invalid("email", "is required"));
        }
        if non_blank(&self.cleaning.sender_names_to_search).next().is_none()
            && non_blank(&self.cleaning.subject_keywords).next().is_none()
        {
            return Err(ConfigError::invalid(
                "cleaning.sender_names_to_search",
                "or 'cleaning.subject_keywords' must list at least one entry",
            ));
        }
        let tenant = self.oauth2.tenant_id.trim();
        if tenant.is_empty() || tenant.contains('/') {
            return Err(ConfigError::invalid(
                "oauth2.tenant_id",
                format!("is not a valid tenant: {tenant:?}"),
            ));
        }
        if self.imap.server.trim().is_empty() {
            return Err(ConfigError::invalid("imap.server", "is required"));
        }
        if self.imap.port == 0 {
            return Err(ConfigError::invalid("imap.port", "must be non-zero"));
        }
        if self.imap.connect_timeout_secs == 0 || self.imap.command_timeout_secs == 0 {
            return Err(ConfigError::invalid("imap", "timeouts must be non-zero"));
        }
        self.auth_mode()?;
        Ok(())
    }

    /// Applies command-line overrides.
    pub fn apply_overrides(&mut self, dry_run: bool, force_login: bool) {
        if dry_run {
            self.cleaning.move_to_deleted = false;
        }
        if force_login {
            self.oauth2.force_interactive_login = true;
        }
    }

    /// The configured client id, unless blank or a sample placeholder.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.oauth2
            .client_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty() && !PLACEHOLDER_CLIENT_IDS.contains(id))
    }

    /// Settings for resolving the token provider.
    #[must_use]
    pub fn token_settings(&self) -> TokenSettings {
        TokenSettings {
            client_id: self.client_id().map(str::to_string),
            tenant: Some(self.oauth2.tenant_id.trim().to_string()),
            access_token: self
                .oauth2
                .access_token
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            force_interactive: self.oauth2.force_interactive_login,
        }
    }

    /// Parsed `imap.auth_mode`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unknown mode.
    pub fn auth_mode(&self) -> Result<AuthMode, ConfigError> {
        self.imap
            .auth_mode
            .parse()
            .map_err(|e: mailsweep_imap::auth::ParseAuthModeError| {
                ConfigError::invalid("imap.auth_mode", e.to_string())
            })
    }

    /// Mailbox to clean, falling back to `INBOX` when blank.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        let mailbox = self.imap.mailbox.trim();
        if mailbox.is_empty() {
            DEFAULT_MAILBOX
        } else {
            mailbox
        }
    }

    /// Per-command timeout.
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.imap.command_timeout_secs)
    }

    /// Connect and sign-in timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.imap.connect_timeout_secs)
    }

    /// One predicate per configured filter, senders first.
    #[must_use]
    pub fn predicates(&self) -> Vec<Box<dyn MatchPredicate>> {
        let mut predicates: Vec<Box<dyn MatchPredicate>> = Vec::new();
        if non_blank(&self.cleaning.sender_names_to_search).next().is_some() {
            predicates.push(Box::new(SenderNameFilter::new(
                self.cleaning.sender_names_to_search.iter().cloned(),
            )));
        }
        if non_blank(&self.cleaning.subject_keywords).next().is_some() {
            predicates.push(Box::new(SubjectFilter::new(
                self.cleaning.subject_keywords.iter().cloned(),
            )));
        }
        predicates
    }
}

fn non_blank(items: &[String]) -> impl Iterator<Item = &String> {
    items.iter().filter(|s| !s.trim().is_empty())
}

fn missing_file_hint(path: &Path) -> String {
    let example = path
        .parent()
        .map_or_else(|| PathBuf::from(EXAMPLE_FILE), |dir| dir.join(EXAMPLE_FILE));
    if example.exists() {
        format!(
            "Copy '{}' to '{}' and fill in your data.",
            example.display(),
            path.display()
        )
    } else {
        format!("Create '{}' with your configuration.", path.display())
    }
}
