//! Error types shared by the inventory generator and the management plugin.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur outside the HTTP transport.
///
/// Transport failures (network errors, non-2xx replies) are deliberately not
/// represented here: the [`ApiClient`](crate::ApiClient) logs them and returns
/// `None`, and callers decide what a missing reply means.
#[derive(Error, Debug)]
pub enum Error {
    /// No API token could be resolved from any configuration layer.
    #[error(
        "Could not find values for Online.net api_token. That must be specified via either \
         the config file (default, or custom using the environment variable \
         ONLINE_NET_CONFIG_PATH), command line argument (--api-token), or environment \
         variable (ONLINE_NET_API_TOKEN)"
    )]
    MissingCredential,

    /// Lookup of a server by ID yielded nothing.
    #[error("Unable to find the server {0}")]
    ServerNotFound(u64),

    /// Cache-only mode was requested but the cache holds no servers.
    #[error("Cache {} is empty and --force-cache was specified", .0.display())]
    CacheEmpty(PathBuf),

    /// The cache file could not be parsed.
    #[error("Cache file {} is corrupt: {source}", path.display())]
    CacheCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Filesystem error on a cache or config file.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML.
    #[error("Invalid configuration file {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The BMC session never reported itself authenticated.
    #[error("BMC session {session} not authenticated after {attempts} attempts")]
    BmcTimeout { session: String, attempts: u32 },

    /// BMC polling was cancelled before the session became ready.
    #[error("BMC session polling cancelled")]
    BmcCancelled,
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
