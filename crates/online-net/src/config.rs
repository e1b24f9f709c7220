//! Layered settings: config file, then environment, then explicit overrides.
//!
//! Each layer only replaces the values it actually provides, so the last
//! layer that sets a value wins.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Default Online.net API base URI.
pub const DEFAULT_API_URI: &str = "https://api.online.net/api/v1/";

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "ONLINE_NET_CONFIG_PATH";

/// Environment variable overriding the API base URI.
pub const API_URI_ENV: &str = "ONLINE_NET_API_URI";

/// Environment variable overriding the API token.
pub const API_TOKEN_ENV: &str = "ONLINE_NET_API_TOKEN";

/// Config file name looked up next to the executable.
pub const DEFAULT_CONFIG_FILE: &str = "online_net.toml";

/// Name of the cache file inside `cache_path`.
pub const CACHE_FILE_NAME: &str = "ansible-online_net.cache";

/// Resolved settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// API base URI, always ending with `/`.
    pub api_uri: String,
    /// Bearer token.
    pub api_token: Option<String>,
    /// Directory holding the cache file.
    pub cache_path: PathBuf,
    /// Maximum cache age in seconds.
    pub cache_max_age: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_uri: DEFAULT_API_URI.to_string(),
            api_token: None,
            cache_path: PathBuf::from("."),
            cache_max_age: 0,
        }
    }
}

/// The `[online_net]` table of the config file.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct FileSettings {
    pub api_uri: Option<String>,
    pub api_token: Option<String>,
    pub cache_path: Option<PathBuf>,
    pub cache_max_age: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    online_net: FileSettings,
}

/// Values given explicitly on the command line or as plugin parameters.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub api_uri: Option<String>,
    pub api_token: Option<String>,
    pub cache_path: Option<PathBuf>,
    pub cache_max_age: Option<u64>,
}

impl FileSettings {
    /// Parse the TOML text of a config file.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the text is not valid TOML.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(file.online_net)
    }

    /// Read a config file; a missing file yields empty settings.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn read(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                debug!(path = %path.display(), "Loaded config file");
                Self::parse(&text, path)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file");
                Ok(Self::default())
            }
            Err(source) => Err(Error::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

impl Settings {
    /// Resolve settings from every layer using the process environment.
    ///
    /// # Errors
    /// Returns an error if the config file is unreadable or malformed.
    pub fn load(overrides: Overrides) -> Result<Self> {
        let path = config_file_path();
        let file = FileSettings::read(&path)?;
        Ok(Self::default()
            .with_file(file)
            .with_env(|key| std::env::var(key).ok())
            .with_overrides(overrides))
    }

    /// Apply the config file layer.
    #[must_use]
    pub fn with_file(mut self, file: FileSettings) -> Self {
        if let Some(uri) = file.api_uri {
            self.api_uri = uri;
        }
        if file.api_token.is_some() {
            self.api_token = file.api_token;
        }
        if let Some(path) = file.cache_path {
            self.cache_path = path;
        }
        if let Some(age) = file.cache_max_age {
            self.cache_max_age = age;
        }
        self.normalized()
    }

    /// Apply the environment layer. Empty values are ignored.
    #[must_use]
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(uri) = non_empty(API_URI_ENV) {
            self.api_uri = uri;
        }
        if let Some(token) = non_empty(API_TOKEN_ENV) {
            self.api_token = Some(token);
        }
        self.normalized()
    }

    /// Apply explicit overrides.
    #[must_use]
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(uri) = overrides.api_uri.filter(|v| !v.is_empty()) {
            self.api_uri = uri;
        }
        if let Some(token) = overrides.api_token.filter(|v| !v.is_empty()) {
            self.api_token = Some(token);
        }
        if let Some(path) = overrides.cache_path {
            self.cache_path = path;
        }
        if let Some(age) = overrides.cache_max_age {
            self.cache_max_age = age;
        }
        self.normalized()
    }

    /// The resolved token.
    ///
    /// # Errors
    /// Returns [`Error::MissingCredential`] when no layer provided one.
    pub fn require_token(&self) -> Result<&str> {
        self.api_token.as_deref().ok_or(Error::MissingCredential)
    }

    /// Full path of the cache file.
    #[must_use]
    pub fn cache_file(&self) -> PathBuf {
        self.cache_path.join(CACHE_FILE_NAME)
    }

    /// Shell assignments for `--env`.
    #[must_use]
    pub fn env_line(&self) -> String {
        format!(
            "{API_URI_ENV}={} {API_TOKEN_ENV}={}",
            self.api_uri,
            self.api_token.as_deref().unwrap_or_default()
        )
    }

    fn normalized(mut self) -> Self {
        if !self.api_uri.ends_with('/') {
            self.api_uri.push('/');
        }
        self
    }
}

/// Location of the config file: `ONLINE_NET_CONFIG_PATH`, or next to the executable.
#[must_use]
pub fn config_file_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_CONFIG_FILE)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}
