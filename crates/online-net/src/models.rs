//! Online.net API request and response models.
//!
//! Records keep every field the API sends: the attributes this crate uses are
//! typed, the rest land in a flattened `extra` map so that cache files and
//! `--all` output carry them through unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Server types
// ============================================================================

/// Server power state.
///
/// Values other than `ON` and `OFF` are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PowerState {
    /// Server is powered on.
    On,
    /// Server is powered off.
    Off,
    /// Any other value reported by the API.
    Unknown(String),
}

impl From<String> for PowerState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "ON" => Self::On,
            "OFF" => Self::Off,
            _ => Self::Unknown(value),
        }
    }
}

impl From<PowerState> for String {
    fn from(state: PowerState) -> Self {
        match state {
            PowerState::On => "ON".to_string(),
            PowerState::Off => "OFF".to_string(),
            PowerState::Unknown(value) => value,
        }
    }
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::On => write!(f, "ON"),
            Self::Off => write!(f, "OFF"),
            Self::Unknown(value) => write!(f, "{value}"),
        }
    }
}

/// Move the `null` values of `keys` out of `map`.
///
/// Typed fields cannot tell `null` from absent, so explicit nulls are parked
/// in the record's `extra` map and serialized back from there.
fn take_nulls(map: &mut Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    let mut nulls = Map::new();
    for key in keys {
        if map.get(*key).is_some_and(Value::is_null) {
            map.remove(*key);
            nulls.insert((*key).to_string(), Value::Null);
        }
    }
    nulls
}

/// A dedicated server as returned by `GET server/<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct ServerRecord {
    /// Server ID.
    pub id: u64,
    /// Hostname.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Power state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<PowerState>,
    /// Network configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,
    /// Installed operating system.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<Os>,
    /// Physical location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Boot mode (`normal`, `rescue-<image>`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_mode: Option<String>,
    /// Every other attribute, including typed ones the API sent as `null`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Deserialize)]
struct ServerRepr {
    id: u64,
    #[serde(default)]
    hostname: Option<String>,
    #[serde(default)]
    power: Option<PowerState>,
    #[serde(default)]
    network: Option<Network>,
    #[serde(default)]
    os: Option<Os>,
    #[serde(default)]
    location: Option<Location>,
    #[serde(default)]
    boot_mode: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl TryFrom<Map<String, Value>> for ServerRecord {
    type Error = serde_json::Error;

    fn try_from(mut map: Map<String, Value>) -> Result<Self, Self::Error> {
        let nulls = take_nulls(
            &mut map,
            &["hostname", "power", "network", "os", "location", "boot_mode"],
        );
        let repr: ServerRepr = serde_json::from_value(Value::Object(map))?;
        let mut extra = repr.extra;
        extra.extend(nulls);
        Ok(Self {
            id: repr.id,
            hostname: repr.hostname,
            power: repr.power,
            network: repr.network,
            os: repr.os,
            location: repr.location,
            boot_mode: repr.boot_mode,
            extra,
        })
    }
}

/// Server network block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct Network {
    /// Public IP addresses, primary first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TryFrom<Map<String, Value>> for Network {
    type Error = serde_json::Error;

    fn try_from(mut map: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut extra = take_nulls(&mut map, &["ip"]);
        let ip = map.remove("ip").map(serde_json::from_value).transpose()?;
        extra.extend(map);
        Ok(Self { ip, extra })
    }
}

/// Server operating system block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct Os {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TryFrom<Map<String, Value>> for Os {
    type Error = serde_json::Error;

    fn try_from(mut map: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut extra = take_nulls(&mut map, &["name"]);
        let name = map.remove("name").map(serde_json::from_value).transpose()?;
        extra.extend(map);
        Ok(Self { name, extra })
    }
}

/// Server location block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datacenter: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TryFrom<Map<String, Value>> for Location {
    type Error = serde_json::Error;

    fn try_from(mut map: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut extra = take_nulls(&mut map, &["datacenter"]);
        let datacenter = map
            .remove("datacenter")
            .map(serde_json::from_value)
            .transpose()?;
        extra.extend(map);
        Ok(Self { datacenter, extra })
    }
}

impl ServerRecord {
    /// A record with only an ID set.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            id,
            hostname: None,
            power: None,
            network: None,
            os: None,
            location: None,
            boot_mode: None,
            extra: Map::new(),
        }
    }

    /// First public IP, used as the inventory destination.
    #[must_use]
    pub fn first_ip(&self) -> Option<&str> {
        self.network
            .as_ref()
            .and_then(|n| n.ip.as_ref())
            .and_then(|ip| ip.first())
            .map(String::as_str)
    }

    /// Set the hostname, replacing a `null` the API sent.
    pub fn set_hostname(&mut self, hostname: impl Into<String>) {
        self.extra.remove("hostname");
        self.hostname = Some(hostname.into());
    }

    /// Set the power state, replacing a `null` the API sent.
    pub fn set_power(&mut self, power: PowerState) {
        self.extra.remove("power");
        self.power = Some(power);
    }

    /// Set the boot mode, replacing a `null` the API sent.
    pub fn set_boot_mode(&mut self, mode: impl Into<String>) {
        self.extra.remove("boot_mode");
        self.boot_mode = Some(mode.into());
    }

    /// Operating system name.
    #[must_use]
    pub fn os_name(&self) -> Option<&str> {
        self.os.as_ref().and_then(|o| o.name.as_deref())
    }

    /// Datacenter name.
    #[must_use]
    pub fn datacenter(&self) -> Option<&str> {
        self.location.as_ref().and_then(|l| l.datacenter.as_deref())
    }

    /// Flatten the record into a JSON object.
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Extract the server ID from a server URI such as `/api/v1/server/1234`.
#[must_use]
pub fn server_id_from_uri(uri: &str) -> Option<&str> {
    uri.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
}

// ============================================================================
// RPN types
// ============================================================================

/// A private network group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpnGroup {
    /// Group ID.
    pub id: u64,
    /// Group name.
    pub name: String,
    /// Member servers.
    #[serde(default)]
    pub members: Vec<RpnMember>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A member of an RPN group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpnMember {
    /// Server ID.
    pub id: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RpnGroup {
    /// Whether the given server is a member of this group.
    #[must_use]
    pub fn contains(&self, server_id: u64) -> bool {
        self.members.iter().any(|m| m.id == server_id)
    }
}

/// A group the server joined, as recorded on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpnGroupRef {
    pub id: u64,
    pub name: String,
}

// ============================================================================
// BMC types
// ============================================================================

/// Status of a BMC session, `GET server/bmc/session/<id>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BmcSession {
    /// Console URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Login for the console.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    /// Password for the console.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Session expiration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BmcSession {
    /// A session is usable once the API hands out its credentials.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.url.is_some() && self.login.is_some() && self.password.is_some()
    }
}

/// Pull an identifier out of a creation reply: `{"id": ..}` or a bare scalar.
#[must_use]
pub fn reply_id(value: &Value) -> Option<String> {
    let id = match value {
        Value::Object(map) => map.get("id")?,
        other => other,
    };
    match id {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "id": 1337,
            "hostname": "web-1",
            "power": "ON",
            "boot_mode": "normal",
            "network": {"ip": ["62.210.0.1", "62.210.0.2"], "private": ["10.0.0.1"]},
            "os": {"name": "ubuntu", "version": "18.04"},
            "location": {"datacenter": "DC3", "room": "4 4-5"},
            "offer": "Dedibox XC"
        })
    }

    #[test]
    fn test_server_record_parse() {
        let server: ServerRecord = serde_json::from_value(sample()).unwrap();
        assert_eq!(server.id, 1337);
        assert_eq!(server.power, Some(PowerState::On));
        assert_eq!(server.first_ip(), Some("62.210.0.1"));
        assert_eq!(server.os_name(), Some("ubuntu"));
        assert_eq!(server.datacenter(), Some("DC3"));
        assert_eq!(server.extra.get("offer"), Some(&json!("Dedibox XC")));
    }

    #[test]
    fn test_server_record_keeps_unknown_fields() {
        let server: ServerRecord = serde_json::from_value(sample()).unwrap();
        let back = serde_json::to_value(&server).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_unknown_power_state() {
        let server: ServerRecord =
            serde_json::from_value(json!({"id": 1, "power": "BOOTING"})).unwrap();
        assert_eq!(server.power, Some(PowerState::Unknown("BOOTING".to_string())));
        assert!(server.first_ip().is_none());
    }

    #[test]
    fn test_server_record_round_trips_odd_values() {
        let raw = json!({
            "id": 1,
            "hostname": null,
            "power": "BOOTING",
            "boot_mode": null,
            "network": {"ip": null, "private": ["10.0.0.1"]},
            "os": {"name": null, "version": "18.04"},
            "location": null
        });
        let server: ServerRecord = serde_json::from_value(raw.clone()).unwrap();
        assert!(server.hostname.is_none());
        assert!(server.boot_mode.is_none());
        assert!(server.first_ip().is_none());
        assert!(server.os_name().is_none());
        assert!(server.datacenter().is_none());
        assert_eq!(serde_json::to_value(&server).unwrap(), raw);
    }

    #[test]
    fn test_setters_replace_null_values() {
        let mut server: ServerRecord = serde_json::from_value(
            json!({"id": 1, "hostname": null, "power": null, "boot_mode": null}),
        )
        .unwrap();
        server.set_hostname("db-1");
        server.set_power(PowerState::Off);
        server.set_boot_mode("rescue-ubuntu1804");
        assert_eq!(
            serde_json::to_value(&server).unwrap(),
            json!({"id": 1, "hostname": "db-1", "power": "OFF", "boot_mode": "rescue-ubuntu1804"})
        );
    }

    #[test]
    fn test_server_record_rejects_bad_types() {
        assert!(serde_json::from_value::<ServerRecord>(json!({"id": "x"})).is_err());
        assert!(serde_json::from_value::<ServerRecord>(json!({"id": 1, "network": {"ip": 3}})).is_err());
    }

    #[test]
    fn test_server_id_from_uri() {
        assert_eq!(server_id_from_uri("/api/v1/server/1234"), Some("1234"));
        assert_eq!(server_id_from_uri("/api/v1/server/1234/"), Some("1234"));
        assert_eq!(server_id_from_uri(""), None);
    }

    #[test]
    fn test_rpn_group_contains() {
        let group: RpnGroup = serde_json::from_value(json!({
            "id": 7, "name": "backend", "members": [{"id": 1}, {"id": 2, "status": "active"}]
        }))
        .unwrap();
        assert!(group.contains(2));
        assert!(!group.contains(3));
    }

    #[test]
    fn test_bmc_session_authenticated() {
        let pending: BmcSession = serde_json::from_value(json!({"id": 5})).unwrap();
        assert!(!pending.is_authenticated());
        let ready: BmcSession = serde_json::from_value(json!({
            "url": "https://bmc", "login": "u", "password": "p", "expiration": "2026-01-01"
        }))
        .unwrap();
        assert!(ready.is_authenticated());
    }

    #[test]
    fn test_reply_id() {
        assert_eq!(reply_id(&json!({"id": 42})), Some("42".into()));
        assert_eq!(reply_id(&json!("abc")), Some("abc".into()));
        assert_eq!(reply_id(&json!(true)), None);
        assert_eq!(reply_id(&json!({})), None);
    }
}
