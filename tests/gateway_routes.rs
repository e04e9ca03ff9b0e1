//! End-to-end REST routes against the bundled log, in both dispatch modes.

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{json, Value};

use rekor_gateway::config::DispatchMode;
use rekor_gateway::rpc::{Empty, RekorClient, TileRequest};
use rekor_gateway::MemoryLog;

mod common;
use common::{client, test_config, TestGateway};

fn entry(digest: &str) -> Value {
    json!({
        "hashedRekordRequestV002": {
            "digest": digest,
            "signature": {
                "content": "c2lnbmF0dXJl",
                "verifier": {"publicKey": {"rawBytes": "cHVibGljLWtleQ=="}, "keyDetails": "PKIX_ECDSA_P256_SHA_256"}
            }
        }
    })
}

async fn start(mode: DispatchMode) -> TestGateway {
    let mut config = test_config(mode);
    config.log.origin = "routes.test".into();
    let log = Arc::new(MemoryLog::from_config(&config.log));
    TestGateway::start_with(config, log).await
}

async fn create_then_read(mode: DispatchMode) {
    let gateway = start(mode).await;
    let http = client();

    let response = http
        .post(gateway.url("/api/v2/log/entries"))
        .json(&entry("AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8="))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK, "{mode}");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["logIndex"], "0");
    assert_eq!(body["kindVersion"]["kind"], "hashedrekord");
    assert_eq!(body["inclusionProof"]["treeSize"], "1");

    let again = http
        .post(gateway.url("/api/v2/log/entries"))
        .json(&entry("AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8="))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::CONFLICT);
    let err: Value = again.json().await.unwrap();
    assert_eq!(err["code"], 6);
    assert_eq!(err["details"], json!([]));

    let checkpoint = http
        .get(gateway.url("/api/v2/checkpoint"))
        .send()
        .await
        .unwrap();
    assert_eq!(checkpoint.status(), StatusCode::OK);
    assert_eq!(
        checkpoint.headers()["content-type"],
        "text/plain; charset=utf-8"
    );
    assert!(checkpoint.text().await.unwrap().starts_with("routes.test\n1\n"));

    let tile = http
        .get(gateway.url("/api/v2/tile/0/000/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(tile.status(), StatusCode::OK);
    assert_eq!(tile.bytes().await.unwrap().len(), 32);

    let bundle = http
        .get(gateway.url("/api/v2/tile/entries/0/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(bundle.status(), StatusCode::OK);
    let bytes = bundle.bytes().await.unwrap();
    let len = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
    assert_eq!(bytes.len(), 2 + len);

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn create_then_read_local() {
    create_then_read(DispatchMode::Local).await;
}

#[tokio::test]
async fn create_then_read_remote() {
    create_then_read(DispatchMode::Remote).await;
}

#[tokio::test]
async fn full_tile_of_small_log_is_not_found() {
    let gateway = start(DispatchMode::Remote).await;
    let response = client()
        .get(gateway.url("/api/v2/tile/0/0"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], 5);
    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn entries_path_prefers_bundle_route() {
    let gateway = start(DispatchMode::Local).await;
    // Empty log: the bundle route answers NotFound with its own message.
    let response = client()
        .get(gateway.url("/api/v2/tile/entries/0"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("entry bundle"));
    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn malformed_requests_are_rejected_before_dispatch() {
    let gateway = start(DispatchMode::Local).await;
    let http = client();

    let response = http
        .get(gateway.url("/api/v2/tile/one/0"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], 3);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("type mismatch, parameter: L"));

    let response = http
        .post(gateway.url("/api/v2/log/entries"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = http.get(gateway.url("/api/v1/log")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.text().await.unwrap(),
        r#"{"code":5,"message":"Not Found","details":[]}"#
    );

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn grpc_listener_serves_the_same_log() {
    let gateway = start(DispatchMode::Remote).await;
    client()
        .post(gateway.url("/api/v2/log/entries"))
        .json(&entry("q83v"))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap();

    let mut rpc = RekorClient::connect(format!("http://{}", gateway.rpc_addr))
        .await
        .unwrap();
    let tile = rpc
        .get_tile(TileRequest { l: 0, n: 0 })
        .await
        .unwrap_err();
    assert_eq!(tile.code(), tonic::Code::NotFound);
    let checkpoint = rpc.get_checkpoint(Empty {}).await.unwrap().into_inner();
    assert!(String::from_utf8(checkpoint.data)
        .unwrap()
        .starts_with("routes.test\n1\n"));

    drop(rpc);
    gateway.stop().await.unwrap();
}
