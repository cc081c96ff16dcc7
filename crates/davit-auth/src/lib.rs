use anyhow::Context;
use axum::http::{header, HeaderMap, Method};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod error;

pub use error::{AuthError, AuthResult};

#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
    /// Optional `user:pass`-per-line credentials file; supersedes
    /// `username`/`password` when set.
    pub accounts_file: Option<PathBuf>,
    /// Let GET/HEAD requests without an `Authorization` header through.
    pub anonymous_read: bool,
}

/// Verifies `Authorization: Basic` headers against a fixed account set
/// loaded once at startup.
pub struct BasicAuth {
    accounts: HashMap<String, String>,
    anonymous_read: bool,
}

impl BasicAuth {
    /// An unreadable or empty accounts file is a setup error and fails
    /// construction; the caller is expected to abort startup.
    pub fn new(config: AuthConfig) -> anyhow::Result<Self> {
        let accounts = match &config.accounts_file {
            Some(path) => load_accounts(path)
                .with_context(|| format!("Failed to load accounts file {}", path.display()))?,
            None => HashMap::from([(config.username, config.password)]),
        };
        Ok(Self {
            accounts,
            anonymous_read: config.anonymous_read,
        })
    }

    pub fn check(&self, username: &str, password: &str) -> bool {
        self.accounts
            .get(username)
            .is_some_and(|expected| expected == password)
    }

    /// Admit or reject one request based on its method and headers.
    pub fn authorize(&self, method: &Method, headers: &HeaderMap) -> AuthResult<()> {
        let supplied = headers.get(header::AUTHORIZATION);

        if supplied.is_none()
            && self.anonymous_read
            && (method == Method::GET || method == Method::HEAD)
        {
            return Ok(());
        }

        let supplied = supplied.ok_or(AuthError::Unauthorized)?;
        let supplied = supplied
            .to_str()
            .map_err(|_| AuthError::InvalidCredentials)?;
        let encoded = supplied
            .strip_prefix("Basic ")
            .ok_or(AuthError::InvalidCredentials)?;
        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|_| AuthError::InvalidCredentials)?;
        let decoded = String::from_utf8(decoded).map_err(|_| AuthError::InvalidCredentials)?;
        let (username, password) = decoded
            .split_once(':')
            .ok_or(AuthError::InvalidCredentials)?;

        if self.check(username, password) {
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

/// Reads `user:pass` lines; blank lines and `#` comments are skipped,
/// malformed lines are warned about and skipped.
pub fn load_accounts(path: &Path) -> anyhow::Result<HashMap<String, String>> {
    let contents = std::fs::read_to_string(path)?;

    let mut accounts = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((user, pass)) = line.split_once(':') else {
            tracing::warn!(line, "Skipping invalid accounts line");
            continue;
        };
        accounts.insert(user.to_string(), pass.to_string());
    }

    if accounts.is_empty() {
        anyhow::bail!("accounts file defines no usable credentials");
    }
    Ok(accounts)
}
