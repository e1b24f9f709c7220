//! A single server under management.
//!
//! Every operation issues its API call(s) and, on success, updates the local
//! record and marks the server as changed. Failed calls leave the record as
//! it was and return a falsy result.

use reqwest::Method;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bmc::{self, BmcPolicy};
use crate::client::ApiClient;
use crate::error::{Error, Result};
use crate::models::{PowerState, ServerRecord};
use crate::rpn::{self, SyncStrategy};

/// Boot mode prefix selecting a rescue image.
pub const RESCUE_PREFIX: &str = "rescue-";

/// Handle on one server.
#[derive(Debug, Clone)]
pub struct Server {
    client: ApiClient,
    record: ServerRecord,
    changed: bool,
}

impl Server {
    /// Wrap a record already fetched.
    #[must_use]
    pub fn new(client: ApiClient, record: ServerRecord) -> Self {
        Self {
            client,
            record,
            changed: false,
        }
    }

    /// Fetch a server by ID.
    ///
    /// # Errors
    /// Returns [`Error::ServerNotFound`] if the API has no such server.
    pub async fn find(client: ApiClient, id: u64) -> Result<Self> {
        let reply = client
            .get(&format!("server/{id}"))
            .await
            .ok_or(Error::ServerNotFound(id))?;
        let record: ServerRecord = match serde_json::from_value(reply) {
            Ok(record) => record,
            Err(e) => {
                warn!(server_id = id, error = %e, "Unparseable server record");
                return Err(Error::ServerNotFound(id));
            }
        };
        Ok(Self::new(client, record))
    }

    /// Server ID.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.record.id
    }

    /// Current record.
    #[must_use]
    pub fn record(&self) -> &ServerRecord {
        &self.record
    }

    /// Consume the handle, keeping the record.
    #[must_use]
    pub fn into_record(self) -> ServerRecord {
        self.record
    }

    /// Whether any operation mutated remote state.
    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.changed
    }

    async fn action(&mut self, path: String, params: &[(&str, String)]) -> bool {
        let ok = self.client.ok(&path, Some(params), Method::POST).await;
        if ok {
            self.changed = true;
        }
        ok
    }

    /// Start an OFF server. No-op returning `false` otherwise.
    pub async fn power_on(&mut self) -> bool {
        if self.record.power != Some(PowerState::Off) {
            return false;
        }
        let path = format!("server/reboot/{}", self.id());
        if self
            .action(path, &[("reason", "Started by Ansible plugin".to_string())])
            .await
        {
            info!(server_id = self.id(), "Server powered on");
            self.record.set_power(PowerState::On);
            true
        } else {
            false
        }
    }

    /// Shut down an ON server. No-op returning `false` otherwise.
    pub async fn power_off(&mut self) -> bool {
        if self.record.power != Some(PowerState::On) {
            return false;
        }
        let path = format!("server/shutdown/{}", self.id());
        if self
            .action(path, &[("reason", "Shutted down by Ansible plugin".to_string())])
            .await
        {
            info!(server_id = self.id(), "Server powered off");
            self.record.set_power(PowerState::Off);
            true
        } else {
            false
        }
    }

    /// Unconditional reboot.
    pub async fn restart(&mut self) -> bool {
        let path = format!("server/reboot/{}", self.id());
        let ok = self
            .action(path, &[("reason", "Restarted by Ansible plugin".to_string())])
            .await;
        if ok {
            info!(server_id = self.id(), "Server restarted");
        }
        ok
    }

    /// Boot into the named rescue image.
    pub async fn boot_rescue(&mut self, image: &str) -> bool {
        let path = format!("server/boot/rescue/{}", self.id());
        let ok = self.action(path, &[("image", image.to_string())]).await;
        if ok {
            info!(server_id = self.id(), image, "Server booting rescue image");
        }
        ok
    }

    /// Reboot following `boot_mode`: `rescue-<image>` boots that rescue image,
    /// anything else (including a bare `rescue-`) is a normal reboot.
    pub async fn reboot(&mut self) -> bool {
        let image = self
            .record
            .boot_mode
            .as_deref()
            .and_then(|mode| mode.strip_prefix(RESCUE_PREFIX))
            .filter(|image| !image.is_empty())
            .map(str::to_string);
        match image {
            Some(image) => self.boot_rescue(&image).await,
            None => self.restart().await,
        }
    }

    /// Set the boot mode used by the next [`reboot`](Self::reboot). Local only.
    pub fn set_boot_mode(&mut self, mode: impl Into<String>) {
        self.record.set_boot_mode(mode);
    }

    /// Change the hostname.
    pub async fn rename(&mut self, hostname: &str) -> bool {
        let path = format!("server/{}", self.id());
        let params = [("hostname", hostname.to_string())];
        let ok = self.client.ok(&path, Some(&params[..]), Method::PUT).await;
        if ok {
            info!(server_id = self.id(), hostname, "Server renamed");
            self.record.set_hostname(hostname);
            self.changed = true;
        }
        ok
    }

    /// Converge RPN group membership and record the joined groups.
    pub async fn sync_rpn_groups(&mut self, groups: &[String], strategy: SyncStrategy) -> bool {
        let Some(report) = rpn::sync(&self.client, self.id(), groups, strategy).await else {
            warn!(server_id = self.id(), "Could not list RPN groups");
            return false;
        };
        if report.changed {
            self.changed = true;
        }
        let joined = serde_json::to_value(&report.joined).unwrap_or_default();
        self.record.extra.insert("groups".to_string(), joined);
        report.success
    }

    /// Rescue images available to this server. `false` if the listing fails.
    pub async fn rescue_images(&self) -> Value {
        self.client
            .get(&format!("server/rescue_images/{}", self.id()))
            .await
            .unwrap_or(Value::Bool(false))
    }

    /// Open a BMC session reachable from `allowed_ip`.
    ///
    /// The session (ID and credentials) on success, `false` otherwise.
    pub async fn open_bmc(
        &mut self,
        allowed_ip: &str,
        policy: BmcPolicy,
        cancel: &CancellationToken,
    ) -> Value {
        match bmc::open_session(&self.client, self.id(), allowed_ip, policy, cancel).await {
            Ok(Some(session)) => {
                self.changed = true;
                serde_json::to_value(session).unwrap_or(Value::Bool(true))
            }
            Ok(None) => Value::Bool(false),
            Err(e) => {
                // The session was created remotely.
                self.changed = true;
                warn!(server_id = self.id(), error = %e, "BMC session unavailable");
                Value::Bool(false)
            }
        }
    }

    /// Close a BMC session.
    pub async fn close_bmc(&mut self, session_id: &str) -> bool {
        let ok = bmc::close_session(&self.client, session_id).await;
        if ok {
            self.changed = true;
        }
        ok
    }
}
