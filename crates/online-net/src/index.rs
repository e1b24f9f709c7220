//! Lookup tables from server attributes to positions in a record collection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::ServerRecord;

/// Key → positions of the records carrying that key, in order of appearance.
pub type Index = BTreeMap<String, Vec<usize>>;

/// Attribute an [`Index`] is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexField {
    /// First public IP.
    Ip,
    /// Numeric server ID.
    Id,
    /// Operating system name.
    OsName,
    /// Datacenter name.
    Datacenter,
}

impl IndexField {
    /// Stringified key of a record, or `None` if the record lacks the attribute.
    #[must_use]
    pub fn key(self, record: &ServerRecord) -> Option<String> {
        match self {
            Self::Ip => record.first_ip().map(str::to_string),
            Self::Id => Some(record.id.to_string()),
            Self::OsName => record.os_name().map(str::to_string),
            Self::Datacenter => record.datacenter().map(str::to_string),
        }
    }
}

/// Build an index over `records`. Records without the attribute are not indexed.
#[must_use]
pub fn build(records: &[ServerRecord], field: IndexField) -> Index {
    let mut index = Index::new();
    for (position, record) in records.iter().enumerate() {
        if let Some(key) = field.key(record) {
            index.entry(key).or_default().push(position);
        }
    }
    index
}

/// The four indices stored alongside a record collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indices {
    #[serde(default)]
    pub host_to_server: Index,
    #[serde(default)]
    pub id_to_server: Index,
    #[serde(default)]
    pub os_to_servers: Index,
    #[serde(default)]
    pub dc_to_servers: Index,
}

impl Indices {
    /// Build every index from one record collection.
    #[must_use]
    pub fn build(records: &[ServerRecord]) -> Self {
        Self {
            host_to_server: build(records, IndexField::Ip),
            id_to_server: build(records, IndexField::Id),
            os_to_servers: build(records, IndexField::OsName),
            dc_to_servers: build(records, IndexField::Datacenter),
        }
    }

    /// Position of the server addressed by IP, falling back to ID.
    #[must_use]
    pub fn lookup_host(&self, host: &str) -> Option<usize> {
        self.host_to_server
            .get(host)
            .or_else(|| self.id_to_server.get(host))
            .and_then(|positions| positions.first().copied())
    }
}
