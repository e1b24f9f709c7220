//! Local snapshot cache for the inventory generator.
//!
//! The cache file holds `{data, index, inventory}` as pretty-printed JSON with
//! sorted keys. Expiry is driven by the file's modification time. There is no
//! locking between processes.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::index::Indices;
use crate::inventory::{self, Inventory};
use crate::models::ServerRecord;

/// Records plus everything derived from them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    /// Raw server records.
    #[serde(default)]
    pub data: Vec<ServerRecord>,
    /// Lookup indices over `data`.
    #[serde(default)]
    pub index: Indices,
    /// Inventory groups over `data`.
    #[serde(default)]
    pub inventory: Inventory,
}

impl CacheSnapshot {
    /// Derive indices and inventory from one record collection.
    #[must_use]
    pub fn from_records(data: Vec<ServerRecord>) -> Self {
        let index = Indices::build(&data);
        let inventory = inventory::build(&data);
        Self {
            data,
            index,
            inventory,
        }
    }

    /// Whether the snapshot holds no servers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A cache file with a maximum age.
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
    max_age: Duration,
}

impl CacheStore {
    /// Create a store for the given file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, max_age_secs: u64) -> Self {
        Self {
            path: path.into(),
            max_age: Duration::from_secs(max_age_secs),
        }
    }

    /// Cache file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file exists and `mtime + max_age > now`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(SystemTime::now())
    }

    /// [`is_valid`](Self::is_valid) against an explicit clock.
    #[must_use]
    pub fn is_valid_at(&self, now: SystemTime) -> bool {
        let Ok(metadata) = std::fs::metadata(&self.path) else {
            return false;
        };
        if !metadata.is_file() {
            return false;
        }
        let Ok(modified) = metadata.modified() else {
            return false;
        };
        let valid = modified
            .checked_add(self.max_age)
            .is_some_and(|expires| expires > now);
        debug!(path = %self.path.display(), valid, "Checked cache age");
        valid
    }

    /// Read and parse the cache file.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if the file cannot be read and
    /// [`Error::CacheCorrupt`] if it cannot be parsed.
    pub fn load(&self) -> Result<CacheSnapshot> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| Error::Io {
            path: self.path.clone(),
            source,
        })?;
        let snapshot: CacheSnapshot =
            serde_json::from_str(&content).map_err(|source| Error::CacheCorrupt {
                path: self.path.clone(),
                source,
            })?;
        info!(
            path = %self.path.display(),
            servers = snapshot.data.len(),
            "Loaded cache"
        );
        Ok(snapshot)
    }

    /// Write the snapshot through a temporary sibling file renamed into place.
    ///
    /// # Errors
    /// Returns an error if the snapshot cannot be serialized or written.
    pub fn save(&self, snapshot: &CacheSnapshot) -> Result<()> {
        let value = serde_json::to_value(snapshot)?;
        let content = serde_json::to_string_pretty(&value)?;

        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| Error::Io { path, source }
        };

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(io_err(dir))?;
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);
        std::fs::write(&tmp, content).map_err(io_err(&tmp))?;
        if let Err(source) = std::fs::rename(&tmp, &self.path) {
            if let Err(e) = std::fs::remove_file(&tmp) {
                warn!(path = %tmp.display(), error = %e, "Failed to remove temporary cache file");
            }
            return Err(io_err(&self.path)(source));
        }

        info!(
            path = %self.path.display(),
            servers = snapshot.data.len(),
            "Wrote cache"
        );
        Ok(())
    }
}
