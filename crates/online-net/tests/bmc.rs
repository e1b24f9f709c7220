//! BMC session polling against a mock Online.net API.

mod common;

use std::time::Duration;

use online_net::bmc::{self, BmcPolicy};
use online_net::Error;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_policy(max_attempts: u32) -> BmcPolicy {
    BmcPolicy {
        interval: Duration::from_millis(10),
        max_attempts,
    }
}

async fn mount_create(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/server/bmc/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_waits_until_authenticated() {
    let server = MockServer::start().await;
    mount_create(&server).await;
    Mock::given(method("GET"))
        .and(path("/server/bmc/session/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"expiration": null})))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/server/bmc/session/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": "https://bmc.example/7", "login": "admin", "password": "pw"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = bmc::open_session(
        &common::client(&server),
        1,
        "192.0.2.1",
        fast_policy(5),
        &CancellationToken::new(),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(session.id, "7");
    assert_eq!(session.session.login.as_deref(), Some("admin"));
}

#[tokio::test]
async fn test_polling_is_bounded() {
    let server = MockServer::start().await;
    mount_create(&server).await;
    Mock::given(method("GET"))
        .and(path("/server/bmc/session/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(3)
        .mount(&server)
        .await;

    let err = bmc::open_session(
        &common::client(&server),
        1,
        "192.0.2.1",
        fast_policy(3),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::BmcTimeout { attempts: 3, .. }));
}

#[tokio::test]
async fn test_polling_can_be_cancelled() {
    let server = MockServer::start().await;
    mount_create(&server).await;
    Mock::given(method("GET"))
        .and(path("/server/bmc/session/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = bmc::open_session(&common::client(&server), 1, "192.0.2.1", fast_policy(5), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::BmcCancelled));
}

#[tokio::test]
async fn test_rejected_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/server/bmc/session"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let session = bmc::open_session(
        &common::client(&server),
        1,
        "192.0.2.1",
        fast_policy(5),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(session.is_none());
}

#[tokio::test]
async fn test_close_session() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/server/bmc/session/7"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    assert!(bmc::close_session(&common::client(&server), "7").await);
    assert!(!bmc::close_session(&common::client(&server), "8").await);
}
