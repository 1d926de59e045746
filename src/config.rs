use std::fmt;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::WildtraxError;

pub const DEFAULT_BASE_URL: &str = "https://www-api.wildtrax.ca";
pub const DEFAULT_ORIGIN: &str = "https://discover.wildtrax.ca";
pub const USERNAME_VAR: &str = "WT_USERNAME";
pub const PASSWORD_VAR: &str = "WT_PASSWORD";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub auth_url: Option<String>,
    #[serde(default = "default_origin")]
    pub origin: String,
    /// Client-side request timeout. Unset means requests may block indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth_url: None,
            origin: default_origin(),
            timeout_secs: None,
            scratch_dir: None,
        }
    }
}

impl ClientConfig {
    pub fn auth_url(&self) -> String {
        self.auth_url
            .clone()
            .unwrap_or_else(|| format!("{}/credential-exchange", self.base_url))
    }

    pub fn referer(&self) -> String {
        format!("{}/", self.origin.trim_end_matches('/'))
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_origin() -> String {
    DEFAULT_ORIGIN.to_string()
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `wildtrax.json` from the working directory when present.
    pub fn resolve(path: Option<&str>) -> Result<ClientConfig, WildtraxError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("wildtrax.json"),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(ClientConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| WildtraxError::ConfigRead(config_path.clone()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<ClientConfig, WildtraxError> {
        let config: ClientConfig = serde_json::from_str(content)
            .map_err(|err| WildtraxError::ConfigParse(err.to_string()))?;
        if config.base_url.trim().is_empty() {
            return Err(WildtraxError::ConfigParse(
                "base_url must not be empty".to_string(),
            ));
        }
        Ok(config)
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn from_env() -> Result<Self, WildtraxError> {
        Ok(Self::new(read_var(USERNAME_VAR)?, read_var(PASSWORD_VAR)?))
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn read_var(name: &str) -> Result<String, WildtraxError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(WildtraxError::MissingCredential(name.to_string())),
    }
}
