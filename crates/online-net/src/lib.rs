//! Online.net dedicated server integrations for Ansible.
//!
//! This crate provides two tools on top of the Online.net REST API:
//!
//! - a dynamic inventory generator grouping servers by ID, hostname, OS and
//!   datacenter, backed by a local snapshot cache;
//! - a server management plugin (power, reboot, rescue boot, rename, RPN
//!   group membership, BMC sessions).
//!
//! # Example
//!
//! ```rust,ignore
//! use online_net::{ApiClient, CacheStore, InventoryCommand, InventoryLoader, CacheMode};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ApiClient::new("https://api.online.net/api/v1/", "token")?;
//!     let loader = InventoryLoader::new(client, CacheStore::new("./ansible-online_net.cache", 300));
//!
//!     let snapshot = loader.load(CacheMode::default()).await?;
//!     println!("{}", InventoryCommand::List.render(&snapshot));
//!     Ok(())
//! }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bmc;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod index;
pub mod inventory;
pub mod manage;
pub mod models;
pub mod rpn;
pub mod server;

pub use cache::{CacheSnapshot, CacheStore};
pub use client::ApiClient;
pub use config::{Overrides, Settings};
pub use error::{Error, Result};
pub use index::{Index, IndexField, Indices};
pub use inventory::{CacheMode, Inventory, InventoryCommand, InventoryLoader};
pub use manage::{ManageOutcome, ManageParams, PowerTarget};
pub use models::{PowerState, RpnGroup, ServerRecord};
pub use rpn::{SyncReport, SyncStrategy};
pub use server::Server;
