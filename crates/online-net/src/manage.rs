//! Management plugin: parameters, dispatch and result.
//!
//! Requested operations run in a fixed order (rename, RPN groups, rescue
//! image listing, BMC open, BMC close, boot mode, power state, restart).
//! Each one appends its own entry to the output list; a failed operation does
//! not stop the ones after it.

use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::bmc::{BmcPolicy, DEFAULT_TIMEOUT_SECS};
use crate::client::ApiClient;
use crate::error::Result;
use crate::models::ServerRecord;
use crate::rpn::SyncStrategy;
use crate::server::Server;

/// Desired power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerTarget {
    /// Start the server if it is off.
    On,
    /// Stop the server if it is on.
    Off,
    /// Reboot unconditionally, honouring `boot_mode`.
    Reboot,
}

/// Plugin parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ManageParams {
    /// Server to operate on.
    #[serde(alias = "server_id", deserialize_with = "de_id")]
    pub id: u64,
    /// API base URI.
    #[serde(default, alias = "API_URI")]
    pub api_uri: Option<String>,
    /// API token.
    #[serde(default, alias = "API_TOKEN")]
    pub api_token: Option<String>,
    /// Desired power state.
    #[serde(default)]
    pub state: Option<PowerTarget>,
    /// New hostname.
    #[serde(default)]
    pub hostname: Option<String>,
    /// RPN groups the server should be in.
    #[serde(default, deserialize_with = "de_list")]
    pub rpn_groups: Option<Vec<String>>,
    /// How RPN groups are converged.
    #[serde(default)]
    pub rpn_sync: SyncStrategy,
    /// Restart the server.
    #[serde(default, deserialize_with = "de_bool")]
    pub restart: bool,
    /// List the rescue images available.
    #[serde(default, deserialize_with = "de_bool")]
    pub rescue_images: bool,
    /// Open a BMC session reachable from this IP.
    #[serde(default)]
    pub bmc_open: Option<String>,
    /// Close this BMC session.
    #[serde(default)]
    pub bmc_close: Option<String>,
    /// Boot mode for `state=reboot`, e.g. `normal` or `rescue-ubuntu1804`.
    #[serde(default)]
    pub boot_mode: Option<String>,
    /// Seconds to wait for a BMC session to authenticate.
    #[serde(default = "default_bmc_timeout")]
    pub bmc_timeout: u64,
}

fn default_bmc_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Number(u64),
    Text(String),
}

fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match IdRepr::deserialize(deserializer)? {
        IdRepr::Number(id) => Ok(id),
        IdRepr::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid server id '{text}'"))),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListRepr {
    List(Vec<String>),
    Text(String),
}

fn de_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<String>>, D::Error> {
    Ok(
        Option::<ListRepr>::deserialize(deserializer)?.map(|repr| match repr {
            ListRepr::List(items) => items,
            ListRepr::Text(text) => text
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }),
    )
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolRepr {
    Bool(bool),
    Text(String),
}

fn de_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match Option::<BoolRepr>::deserialize(deserializer)? {
        None => Ok(false),
        Some(BoolRepr::Bool(b)) => Ok(b),
        Some(BoolRepr::Text(text)) => match text.to_ascii_lowercase().as_str() {
            "yes" | "true" | "on" | "1" | "y" => Ok(true),
            "no" | "false" | "off" | "0" | "n" | "" => Ok(false),
            other => Err(de::Error::custom(format!("invalid boolean '{other}'"))),
        },
    }
}

impl ManageParams {
    /// Parse parameters from JSON text.
    ///
    /// # Errors
    /// Returns an error if the text is not a valid parameter object.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Polling bounds for `bmc_open`.
    #[must_use]
    pub fn bmc_policy(&self) -> BmcPolicy {
        BmcPolicy::with_timeout(Duration::from_secs(self.bmc_timeout))
    }
}

/// Result of one sub-operation, serialized as `{name: value}`.
#[derive(Debug, Clone, PartialEq)]
pub struct OpResult {
    pub name: &'static str,
    pub value: Value,
}

impl Serialize for OpResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.name, &self.value)?;
        map.end()
    }
}

/// Plugin result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManageOutcome {
    /// Whether any sub-operation mutated remote state.
    pub changed: bool,
    /// Server record after all operations.
    pub server: ServerRecord,
    /// Per-operation results, in execution order.
    pub output: Vec<OpResult>,
}

impl ManageOutcome {
    /// Result of the named operation, if it ran.
    #[must_use]
    pub fn result(&self, name: &str) -> Option<&Value> {
        self.output.iter().find(|r| r.name == name).map(|r| &r.value)
    }
}

/// Run every requested operation against the server.
///
/// # Errors
/// Returns [`Error::ServerNotFound`](crate::Error::ServerNotFound) if the
/// server cannot be fetched. Failures of individual operations are reported
/// in the output list instead.
pub async fn run(
    client: ApiClient,
    params: &ManageParams,
    cancel: &CancellationToken,
) -> Result<ManageOutcome> {
    let mut server = Server::find(client, params.id).await?;
    let mut output = Vec::new();
    let mut push = |name: &'static str, value: Value| {
        info!(server_id = params.id, operation = name, result = %value, "Operation done");
        output.push(OpResult { name, value });
    };

    if let Some(hostname) = &params.hostname {
        push("hostname", Value::Bool(server.rename(hostname).await));
    }

    if let Some(groups) = params.rpn_groups.as_ref().filter(|g| !g.is_empty()) {
        let synced = server.sync_rpn_groups(groups, params.rpn_sync).await;
        push("rpn_groups", Value::Bool(synced));
    }

    if params.rescue_images {
        push("rescue_images", server.rescue_images().await);
    }

    if let Some(ip) = &params.bmc_open {
        push("bmc_open", server.open_bmc(ip, params.bmc_policy(), cancel).await);
    }

    if let Some(session) = &params.bmc_close {
        push("bmc_close", Value::Bool(server.close_bmc(session).await));
    }

    if let Some(mode) = &params.boot_mode {
        server.set_boot_mode(mode.clone());
        push("boot_mode", Value::String(mode.clone()));
    }

    match params.state {
        Some(PowerTarget::On) => push("state", Value::Bool(server.power_on().await)),
        Some(PowerTarget::Off) => push("state", Value::Bool(server.power_off().await)),
        Some(PowerTarget::Reboot) => push("state", Value::Bool(server.reboot().await)),
        None => {}
    }

    if params.restart {
        push("restart", Value::Bool(server.restart().await));
    }

    Ok(ManageOutcome {
        changed: server.has_changed(),
        server: server.into_record(),
        output,
    })
}
