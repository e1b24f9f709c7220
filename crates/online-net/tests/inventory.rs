//! Inventory generation against a mock Online.net API.

mod common;

use online_net::{
    CacheMode, CacheSnapshot, CacheStore, Error, InventoryCommand, InventoryLoader, ServerRecord,
};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_servers(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/server"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!(["/api/v1/server/1", "/api/v1/server/2"])),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/server/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::server_json(
            1, "web-1", "10.0.0.1", "ubuntu", "DC2", "ON",
        )))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/server/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::server_json(
            2, "web-2", "10.0.0.2", "ubuntu", "DC3", "OFF",
        )))
        .mount(server)
        .await;
}

fn stale_snapshot() -> CacheSnapshot {
    let record: ServerRecord = serde_json::from_value(common::server_json(
        9, "old", "10.9.9.9", "debian", "DC1", "ON",
    ))
    .unwrap();
    CacheSnapshot::from_records(vec![record])
}

#[tokio::test]
async fn test_list_fetches_live_and_writes_cache() {
    let server = MockServer::start().await;
    mount_servers(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let store = CacheStore::new(dir.path().join("ansible-online_net.cache"), 0);
    let loader = InventoryLoader::new(common::client(&server), store.clone());

    let snapshot = loader.load(CacheMode::default()).await.unwrap();
    let output = InventoryCommand::List.render(&snapshot);

    assert_eq!(output["id_1"], json!(["10.0.0.1"]));
    assert_eq!(output["web-2"], json!(["10.0.0.2"]));
    assert_eq!(output["os_ubuntu"], json!(["10.0.0.1", "10.0.0.2"]));
    assert_eq!(output["dc_DC3"], json!(["10.0.0.2"]));

    let cached = store.load().unwrap();
    assert_eq!(cached, snapshot);
}

#[tokio::test]
async fn test_valid_cache_still_refreshed_for_listing() {
    let server = MockServer::start().await;
    mount_servers(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let store = CacheStore::new(dir.path().join("x.cache"), 60);
    store.save(&stale_snapshot()).unwrap();
    assert!(store.is_valid());

    let loader = InventoryLoader::new(common::client(&server), store.clone());
    let snapshot = loader.load(CacheMode::default()).await.unwrap();

    assert_eq!(snapshot.data.len(), 2);
    assert!(!snapshot.inventory.contains_key("old"));
    assert_eq!(store.load().unwrap().data.len(), 2);
}

#[tokio::test]
async fn test_force_cache_uses_valid_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let store = CacheStore::new(dir.path().join("x.cache"), 60);
    store.save(&stale_snapshot()).unwrap();

    let loader = InventoryLoader::new(common::client(&server), store);
    let snapshot = loader
        .load(CacheMode {
            refresh: true,
            force_cache: true,
        })
        .await
        .unwrap();

    assert_eq!(snapshot, stale_snapshot());
    let vars = InventoryCommand::Host("10.9.9.9".into()).render(&snapshot);
    assert_eq!(vars["online_net_hostname"], json!("old"));
    assert_eq!(vars["online_net_offer"], json!("Dedibox"));
}

#[tokio::test]
async fn test_force_cache_with_empty_cache_is_fatal() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let store = CacheStore::new(dir.path().join("x.cache"), 60);
    store.save(&CacheSnapshot::default()).unwrap();

    let loader = InventoryLoader::new(common::client(&server), store);
    let err = loader
        .load(CacheMode {
            refresh: false,
            force_cache: true,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CacheEmpty(_)));
}

#[tokio::test]
async fn test_empty_cache_falls_back_to_live() {
    let server = MockServer::start().await;
    mount_servers(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let store = CacheStore::new(dir.path().join("x.cache"), 60);
    store.save(&CacheSnapshot::default()).unwrap();

    let loader = InventoryLoader::new(common::client(&server), store);
    let snapshot = loader.load(CacheMode::default()).await.unwrap();
    assert_eq!(snapshot.data.len(), 2);
}

#[tokio::test]
async fn test_force_cache_with_expired_cache_fetches_live() {
    let server = MockServer::start().await;
    mount_servers(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let store = CacheStore::new(dir.path().join("x.cache"), 0);

    let loader = InventoryLoader::new(common::client(&server), store);
    let snapshot = loader
        .load(CacheMode {
            refresh: false,
            force_cache: true,
        })
        .await
        .unwrap();
    assert_eq!(snapshot.data.len(), 2);
}

#[tokio::test]
async fn test_unavailable_server_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/server"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!(["/api/v1/server/1", "/api/v1/server/2"])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/server/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::server_json(
            1, "web-1", "10.0.0.1", "ubuntu", "DC2", "ON",
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/server/2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let loader = InventoryLoader::new(
        common::client(&server),
        CacheStore::new(dir.path().join("x.cache"), 0),
    );
    let snapshot = loader.refresh().await.unwrap();

    assert_eq!(snapshot.data.len(), 1);
    assert_eq!(snapshot.data[0].id, 1);
}

#[tokio::test]
async fn test_server_without_ip_is_kept_but_not_grouped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/server"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!(["/api/v1/server/1", "/api/v1/server/2"])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/server/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::server_json(
            1, "web-1", "10.0.0.1", "ubuntu", "DC2", "ON",
        )))
        .mount(&server)
        .await;
    let unplugged = json!({
        "id": 2,
        "hostname": "spare",
        "power": "BOOTING",
        "boot_mode": null,
        "network": {"ip": null},
        "os": {"name": "debian"},
        "location": {"datacenter": "DC3"}
    });
    Mock::given(method("GET"))
        .and(path("/server/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(unplugged.clone()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = CacheStore::new(dir.path().join("x.cache"), 3600);
    let loader = InventoryLoader::new(common::client(&server), store.clone());
    let snapshot = loader.refresh().await.unwrap();

    assert_eq!(snapshot.data.len(), 2);
    assert!(!snapshot.inventory.contains_key("id_2"));
    assert!(!snapshot.inventory.contains_key("spare"));
    assert_eq!(snapshot.inventory["id_1"], vec!["10.0.0.1".to_string()]);

    let all = InventoryCommand::All.render(&snapshot);
    assert_eq!(all[1], unplugged);

    let vars = InventoryCommand::Host("2".to_string()).render(&snapshot);
    assert_eq!(vars["online_net_power"], json!("BOOTING"));
    assert_eq!(vars["online_net_boot_mode"], json!(null));

    assert_eq!(store.load().unwrap(), snapshot);
}

#[tokio::test]
async fn test_failed_listing_yields_empty_inventory() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/server"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let loader = InventoryLoader::new(
        common::client(&server),
        CacheStore::new(dir.path().join("x.cache"), 0),
    );
    let snapshot = loader.load(CacheMode::default()).await.unwrap();

    assert!(snapshot.is_empty());
    assert_eq!(InventoryCommand::List.render(&snapshot), json!({}));
    assert_eq!(InventoryCommand::All.render(&snapshot), json!([]));
}
