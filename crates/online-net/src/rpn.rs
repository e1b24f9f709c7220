//! RPN group membership reconciliation.
//!
//! Converges a server's private network groups onto a desired set of group
//! names. Groups that do not exist yet are created with the server as their
//! first member. The sync is best-effort: every call is attempted, and the
//! report says whether all of them went through.

use std::collections::{HashMap, HashSet};

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::{is_truthy, ApiClient};
use crate::models::{reply_id, RpnGroup, RpnGroupRef};

/// How memberships are converged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStrategy {
    /// Leave every current group, then join each desired group.
    #[default]
    Rejoin,
    /// Leave only undesired groups and join only missing ones.
    Minimal,
}

/// Outcome of a sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Every create, removal and addition succeeded.
    pub success: bool,
    /// At least one remote call mutated membership.
    pub changed: bool,
    /// Groups the server is known to be in afterwards.
    pub joined: Vec<RpnGroupRef>,
}

/// List every RPN group with its members.
pub async fn fetch_groups(client: &ApiClient) -> Option<Vec<RpnGroup>> {
    match client.get("rpn/group").await? {
        Value::Array(items) => {
            let mut groups = Vec::with_capacity(items.len());
            for item in items {
                match serde_json::from_value(item) {
                    Ok(group) => groups.push(group),
                    Err(e) => warn!(error = %e, "Skipping unparseable RPN group"),
                }
            }
            Some(groups)
        }
        other => {
            warn!(reply = %other, "Unexpected RPN group listing");
            None
        }
    }
}

/// Converge `server_id` onto the `desired` group names.
///
/// Returns `None` if the group listing cannot be fetched, in which case
/// nothing was changed.
pub async fn sync(
    client: &ApiClient,
    server_id: u64,
    desired: &[String],
    strategy: SyncStrategy,
) -> Option<SyncReport> {
    let groups = fetch_groups(client).await?;

    let mut seen = HashSet::new();
    let desired: Vec<&str> = desired
        .iter()
        .map(String::as_str)
        .filter(|name| seen.insert(*name))
        .collect();

    let mut name_to_id: HashMap<String, u64> = groups
        .iter()
        .map(|g| (g.name.clone(), g.id))
        .collect();
    let current: Vec<&RpnGroup> = groups.iter().filter(|g| g.contains(server_id)).collect();
    debug!(
        server_id,
        current = ?current.iter().map(|g| &g.name).collect::<Vec<_>>(),
        desired = ?desired,
        "Syncing RPN groups"
    );

    let mut report = SyncReport {
        success: true,
        ..SyncReport::default()
    };
    let server_ids = server_id.to_string();

    // Missing groups are created with the server already in them.
    let mut created: HashSet<&str> = HashSet::new();
    let mut unresolved: Vec<&str> = Vec::new();
    let missing: Vec<&str> = desired
        .iter()
        .copied()
        .filter(|name| !name_to_id.contains_key(*name))
        .collect();
    for name in missing {
        let params = [("name", name.to_string()), ("server_ids", server_ids.clone())];
        match client.post("rpn/group", &params).await {
            Some(reply) if is_truthy(&reply) => {
                info!(server_id, group = %name, "Created RPN group");
                report.changed = true;
                created.insert(name);
                match reply_id(&reply).and_then(|id| id.parse::<u64>().ok()) {
                    Some(id) => {
                        name_to_id.insert(name.to_string(), id);
                    }
                    None => unresolved.push(name),
                }
            }
            _ => {
                warn!(server_id, group = %name, "Failed to create RPN group");
                report.success = false;
            }
        }
    }

    if !unresolved.is_empty() {
        if let Some(groups) = fetch_groups(client).await {
            for group in groups.into_iter().filter(|g| unresolved.contains(&g.name.as_str())) {
                name_to_id.insert(group.name, group.id);
            }
        }
    }

    let keep = |group: &RpnGroup| {
        strategy == SyncStrategy::Minimal && desired.contains(&group.name.as_str())
    };

    for group in current.iter().copied().filter(|g| !keep(*g)) {
        let params = [("group_id", group.id.to_string()), ("server_ids", server_ids.clone())];
        if client
            .ok("rpn/group/removeServers", Some(&params[..]), Method::POST)
            .await
        {
            info!(server_id, group = %group.name, "Left RPN group");
            report.changed = true;
        } else {
            warn!(server_id, group = %group.name, "Failed to leave RPN group");
            report.success = false;
        }
    }

    for &name in &desired {
        let Some(&group_id) = name_to_id.get(name) else {
            warn!(server_id, group = %name, "RPN group has no known ID");
            report.success = false;
            continue;
        };
        let joined = RpnGroupRef {
            id: group_id,
            name: name.to_string(),
        };

        let kept = current.iter().any(|g| g.id == group_id && keep(*g));
        if created.contains(name) || kept {
            report.joined.push(joined);
            continue;
        }

        let params = [("group_id", group_id.to_string()), ("server_ids", server_ids.clone())];
        if client
            .ok("rpn/group/addServers", Some(&params[..]), Method::POST)
            .await
        {
            info!(server_id, group = %name, "Joined RPN group");
            report.changed = true;
            report.joined.push(joined);
        } else {
            warn!(server_id, group = %name, "Failed to join RPN group");
            report.success = false;
        }
    }

    Some(report)
}
