//! BMC (out-of-band console) sessions.
//!
//! Opening a session is asynchronous on the Online.net side: the session is
//! created first and its credentials show up later. Polling is bounded by a
//! [`BmcPolicy`] and can be cancelled.

use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::ApiClient;
use crate::error::{Error, Result};
use crate::models::{reply_id, BmcSession};

/// Default polling interval.
pub const POLL_INTERVAL_SECS: u64 = 1;

/// Default time to wait for a session to authenticate.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Bounds on session status polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BmcPolicy {
    /// Delay between status requests.
    pub interval: Duration,
    /// Maximum number of status requests.
    pub max_attempts: u32,
}

impl Default for BmcPolicy {
    fn default() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

impl BmcPolicy {
    /// One-second polling for at most `timeout`.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        let interval = Duration::from_secs(POLL_INTERVAL_SECS);
        let attempts = timeout.as_millis().div_ceil(interval.as_millis()).max(1);
        Self {
            interval,
            max_attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
        }
    }
}

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenedSession {
    /// Session ID, needed to close it.
    pub id: String,
    #[serde(flatten)]
    pub session: BmcSession,
}

/// Open a BMC session for `server_id`, reachable from `allowed_ip`.
///
/// Returns `Ok(None)` if the API refuses to create the session.
///
/// # Errors
/// Returns [`Error::BmcTimeout`] if the session does not authenticate within
/// the policy, or [`Error::BmcCancelled`] if `cancel` fires first.
pub async fn open_session(
    client: &ApiClient,
    server_id: u64,
    allowed_ip: &str,
    policy: BmcPolicy,
    cancel: &CancellationToken,
) -> Result<Option<OpenedSession>> {
    let params = [
        ("server_id", server_id.to_string()),
        ("ip", allowed_ip.to_string()),
    ];
    let Some(reply) = client.post("server/bmc/session", &params).await else {
        warn!(server_id, "Failed to create BMC session");
        return Ok(None);
    };
    let Some(id) = reply_id(&reply) else {
        warn!(server_id, reply = %reply, "BMC session reply carries no ID");
        return Ok(None);
    };
    info!(server_id, session = %id, "BMC session created, waiting for authentication");

    let path = format!("server/bmc/session/{id}");
    for attempt in 1..=policy.max_attempts {
        let status = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::BmcCancelled),
            status = client.get(&path) => status,
        };

        if let Some(status) = status {
            match serde_json::from_value::<BmcSession>(status) {
                Ok(mut session) if session.is_authenticated() => {
                    info!(server_id, session = %id, attempt, "BMC session authenticated");
                    session.extra.remove("id");
                    return Ok(Some(OpenedSession { id, session }));
                }
                Ok(_) => debug!(session = %id, attempt, "BMC session not ready"),
                Err(e) => warn!(session = %id, error = %e, "Unparseable BMC session status"),
            }
        }

        if attempt < policy.max_attempts {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::BmcCancelled),
                () = tokio::time::sleep(policy.interval) => {}
            }
        }
    }

    Err(Error::BmcTimeout {
        session: id,
        attempts: policy.max_attempts,
    })
}

/// Close a BMC session.
pub async fn close_session(client: &ApiClient, session_id: &str) -> bool {
    let closed = client
        .ok(&format!("server/bmc/session/{session_id}"), None, Method::DELETE)
        .await;
    if closed {
        info!(session = %session_id, "BMC session closed");
    } else {
        warn!(session = %session_id, "Failed to close BMC session");
    }
    closed
}
