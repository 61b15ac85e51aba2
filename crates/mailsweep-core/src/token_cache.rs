//! On-disk cache of `OAuth2` tokens, keyed by account.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use mailsweep_oauth::Token;
use tracing::debug;

use crate::error::{Error, Result};

const CACHE_DIR: &str = "mailsweep";
const CACHE_FILE: &str = "tokens.json";

/// JSON map of lower-cased identity to token.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    /// Uses an explicit file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<platform cache dir>/mailsweep/tokens.json`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the platform has no cache directory.
    pub fn default_location() -> Result<Self> {
        let base = dirs::cache_dir()
            .ok_or_else(|| Error::Config("no cache directory on this platform".to_string()))?;
        Ok(Self::new(base.join(CACHE_DIR).join(CACHE_FILE)))
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached token for `identity`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self, identity: &str) -> Result<Option<Token>> {
        Ok(self.read_all()?.remove(&key(identity)))
    }

    /// Stores or replaces the token for `identity`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn store(&self, identity: &str, token: &Token) -> Result<()> {
        let mut tokens = self.read_all()?;
        tokens.insert(key(identity), token.clone());
        self.write_all(&tokens)
    }

    /// Drops the token for `identity`. Returns whether one was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or rewritten.
    pub fn remove(&self, identity: &str) -> Result<bool> {
        let mut tokens = self.read_all()?;
        if tokens.remove(&key(identity)).is_none() {
            return Ok(false);
        }
        self.write_all(&tokens)?;
        Ok(true)
    }

    fn read_all(&self) -> Result<BTreeMap<String, Token>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, tokens: &BTreeMap<String, Token>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(tokens)?)?;
        restrict_permissions(&self.path)?;
        debug!(path = %self.path.display(), entries = tokens.len(), "token cache written");
        Ok(())
    }
}

fn key(identity: &str) -> String {
    identity.trim().to_lowercase()
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
