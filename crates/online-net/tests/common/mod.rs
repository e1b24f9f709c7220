//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use online_net::ApiClient;
use serde_json::{json, Value};
use wiremock::MockServer;

pub const TOKEN: &str = "test-token";

/// Client pointed at the mock API.
pub fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(server.uri(), TOKEN).expect("client")
}

/// A server record as the API returns it.
pub fn server_json(id: u64, hostname: &str, ip: &str, os: &str, dc: &str, power: &str) -> Value {
    json!({
        "id": id,
        "hostname": hostname,
        "power": power,
        "boot_mode": "normal",
        "network": {"ip": [ip], "private": []},
        "os": {"name": os, "version": "18.04"},
        "location": {"datacenter": dc, "room": "1"},
        "offer": "Dedibox"
    })
}
