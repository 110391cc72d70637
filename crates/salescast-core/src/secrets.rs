//! Credentials for the completion service
//!
//! Keys come from the operator (environment or a secrets file), never from
//! end-user input. `Debug` output is redacted.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Environment variables checked for an API key, in order
pub const API_KEY_ENV_VARS: &[&str] = &["SALESCAST_API_KEY", "OPENAI_API_KEY"];

/// A well-formed API key
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
}

impl Credentials {
    /// Wrap an API key, rejecting empty keys or keys with whitespace inside
    pub fn new(api_key: &str) -> Result<Self> {
        let key = api_key.trim();
        if key.is_empty() {
            return Err(Error::MissingCredentials("API key is empty".into()));
        }
        if key.chars().any(char::is_whitespace) {
            return Err(Error::MissingCredentials(
                "API key contains whitespace".into(),
            ));
        }
        Ok(Self {
            api_key: key.to_string(),
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Read the key from the first set variable in [`API_KEY_ENV_VARS`]
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Credentials::from_env`] with an injectable variable lookup
    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        API_KEY_ENV_VARS
            .iter()
            .filter_map(|var| lookup(var))
            .find_map(|value| Self::new(&value).ok())
    }

    /// Read `[openai] api_key` from a TOML secrets file
    ///
    /// Returns `Ok(None)` when the file has no such key.
    pub fn from_secrets_file(path: &Path) -> Result<Option<Self>> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read secrets {}: {}", path.display(), e))
        })?;
        let secrets: SecretsFile = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid secrets TOML: {}", e)))?;

        match secrets.openai.and_then(|o| o.api_key) {
            Some(key) => Self::new(&key).map(Some),
            None => Ok(None),
        }
    }

    /// Key suffix safe to show in logs and status output
    pub fn redacted(&self) -> String {
        let tail: String = self
            .api_key
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("…{}", tail)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.redacted())
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct SecretsFile {
    openai: Option<OpenAiSecrets>,
}

#[derive(Debug, Deserialize)]
struct OpenAiSecrets {
    api_key: Option<String>,
}
