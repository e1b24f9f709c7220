//! Ansible dynamic inventory of Online.net servers.
//!
//! Groups generated for `--list`:
//! - `id_<id>` (one server per group)
//! - the server hostname
//! - `os_<name>`
//! - `dc_<datacenter>`
//!
//! Each group lists the first public IP of its servers.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::cache::{CacheSnapshot, CacheStore};
use crate::client::ApiClient;
use crate::error::{Error, Result};
use crate::models::{server_id_from_uri, ServerRecord};

/// Group name → destination addresses.
pub type Inventory = BTreeMap<String, Vec<String>>;

/// Prefix put on every host variable.
pub const HOST_VAR_PREFIX: &str = "online_net_";

/// Build the inventory groups from one record collection.
///
/// Records without a first IP have no destination and join no group.
#[must_use]
pub fn build(records: &[ServerRecord]) -> Inventory {
    let mut inventory = Inventory::new();

    for server in records {
        let Some(dest) = server.first_ip() else {
            continue;
        };
        let dest = dest.to_string();

        inventory.insert(format!("id_{}", server.id), vec![dest.clone()]);
        if let Some(hostname) = &server.hostname {
            inventory
                .entry(hostname.clone())
                .or_default()
                .push(dest.clone());
        }
        if let Some(os) = server.os_name() {
            inventory
                .entry(format!("os_{os}"))
                .or_default()
                .push(dest.clone());
        }
        if let Some(dc) = server.datacenter() {
            inventory.entry(format!("dc_{dc}")).or_default().push(dest);
        }
    }

    inventory
}

/// Replace every character Ansible does not accept in group names with `_`.
#[must_use]
pub fn to_safe(word: &str) -> String {
    word.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Variables of one server addressed by IP or ID, prefixed `online_net_`.
///
/// Unknown hosts yield an empty map.
#[must_use]
pub fn host_vars(snapshot: &CacheSnapshot, host: &str) -> Map<String, Value> {
    let host = to_safe(host);
    let Some(server) = snapshot
        .index
        .lookup_host(&host)
        .and_then(|position| snapshot.data.get(position))
    else {
        return Map::new();
    };

    server
        .to_map()
        .into_iter()
        .map(|(key, value)| (format!("{HOST_VAR_PREFIX}{key}"), value))
        .collect()
}

/// Fetch every server from the API.
///
/// A failed listing yields no servers; a server whose details cannot be
/// fetched is left out.
pub async fn fetch_servers(client: &ApiClient) -> Vec<ServerRecord> {
    let uris = match client.get("server").await {
        Some(Value::Array(uris)) => uris,
        Some(other) => {
            warn!(reply = %other, "Unexpected server listing");
            return Vec::new();
        }
        None => {
            warn!("Failed to list servers");
            return Vec::new();
        }
    };

    let mut servers = Vec::with_capacity(uris.len());
    for uri in &uris {
        let Some(id) = uri.as_str().and_then(server_id_from_uri) else {
            warn!(uri = %uri, "Skipping malformed server URI");
            continue;
        };
        let Some(reply) = client.get(&format!("server/{id}")).await else {
            warn!(server_id = %id, "Skipping server, details unavailable");
            continue;
        };
        match serde_json::from_value::<ServerRecord>(reply) {
            Ok(server) => servers.push(server),
            Err(e) => warn!(server_id = %id, error = %e, "Skipping unparseable server"),
        }
    }

    info!(servers = servers.len(), "Fetched servers");
    servers
}

/// What the inventory script prints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryCommand {
    /// Inventory groups (the default).
    List,
    /// Variables of one server, by IP or ID.
    Host(String),
    /// Raw server records.
    All,
}

impl InventoryCommand {
    /// Pick the command from the CLI flags; `--all` wins over `--host`.
    #[must_use]
    pub fn from_flags(all: bool, host: Option<String>) -> Self {
        match (all, host) {
            (true, _) => Self::All,
            (false, Some(host)) => Self::Host(host),
            (false, None) => Self::List,
        }
    }

    /// Render the command's output from a snapshot.
    #[must_use]
    pub fn render(&self, snapshot: &CacheSnapshot) -> Value {
        match self {
            Self::List => serde_json::to_value(&snapshot.inventory).unwrap_or_default(),
            Self::Host(host) => Value::Object(host_vars(snapshot, host)),
            Self::All => serde_json::to_value(&snapshot.data).unwrap_or_default(),
        }
    }
}

/// Cache flags of the inventory script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheMode {
    /// Refresh the cache from the API.
    pub refresh: bool,
    /// Only use data from the cache.
    pub force_cache: bool,
}

/// Loads snapshots from the cache or the API.
#[derive(Debug, Clone)]
pub struct InventoryLoader {
    client: ApiClient,
    store: CacheStore,
}

impl InventoryLoader {
    /// Create a loader.
    #[must_use]
    pub fn new(client: ApiClient, store: CacheStore) -> Self {
        Self { client, store }
    }

    /// Fetch every server, rebuild indices and inventory, and rewrite the cache.
    ///
    /// # Errors
    /// Returns an error if the cache cannot be written.
    pub async fn refresh(&self) -> Result<CacheSnapshot> {
        let snapshot = CacheSnapshot::from_records(fetch_servers(&self.client).await);
        self.store.save(&snapshot)?;
        Ok(snapshot)
    }

    /// Load the snapshot a command runs against.
    ///
    /// Listing commands always get live data unless `force_cache` is set,
    /// so the cache only answers in cache-only mode. An empty cache is fatal
    /// in cache-only mode and triggers a live fetch otherwise.
    ///
    /// # Errors
    /// Returns [`Error::CacheEmpty`] in cache-only mode with an empty cache,
    /// and propagates cache read/parse/write failures.
    pub async fn load(&self, mode: CacheMode) -> Result<CacheSnapshot> {
        if (mode.refresh && !mode.force_cache) || !self.store.is_valid() {
            return self.refresh().await;
        }

        let snapshot = self.store.load()?;
        if snapshot.is_empty() {
            if mode.force_cache {
                return Err(Error::CacheEmpty(self.store.path().to_path_buf()));
            }
            return self.refresh().await;
        }

        if mode.force_cache {
            Ok(snapshot)
        } else {
            self.refresh().await
        }
    }
}
