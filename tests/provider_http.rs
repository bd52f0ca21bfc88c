//! Provider adapters and RPC client over real HTTP against a local backend.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kaze_light::config::KazeConfig;
use kaze_light::health::EndpointCache;
use kaze_light::net::HttpTransport;
use kaze_light::rpc::RpcClient;
use kaze_light::types::{KAZE, STREAM};
use kaze_light::wallet::Fixed8;
use kaze_light::{AccessRouter, KazeError, Kazescan, KryptonDb, Provider, RouterState};
use serde_json::json;

mod common;
use common::{start_programmable_backend, MockRequest, ADDRESS};

fn transport(timeout_ms: u64) -> HttpTransport {
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    HttpTransport::with_client(client, Duration::from_millis(timeout_ms))
}

async fn explorer(request: MockRequest) -> (u16, String) {
    let body = match request.path.as_str() {
        p if p.starts_with("/v1/get_balance/") => json!({
            "address": ADDRESS,
            "balance": [
                {"asset": "KAZE", "amount": 10, "unspent": [
                    {"n": 0, "txid": "aa".repeat(32), "value": 10}
                ]},
                {"asset": "STREAM", "amount": "0.125", "unspent": [
                    {"n": 1, "txid": "bb".repeat(32), "value": "0.125"}
                ]}
            ]
        }),
        "/v1/get_height" => json!({"height": 77}),
        "/v2/block/height" => json!({"block_height": "78"}),
        _ => return (404, "{}".to_string()),
    };
    (200, body.to_string())
}

#[tokio::test]
async fn test_kazescan_balance_over_http() {
    let addr = start_programmable_backend(explorer).await;
    let base = format!("http://{}", addr);
    let kazescan = Kazescan::new(transport(2_000), Arc::new(KazeConfig::default()), EndpointCache::new());

    let balance = kazescan.get_balance(&base, ADDRESS).await.unwrap();
    assert_eq!(balance.address, ADDRESS);
    assert_eq!(balance.asset(KAZE).unwrap().balance, Fixed8::from_units(10).unwrap());
    assert_eq!(balance.asset(STREAM).unwrap().unspent[0].value.raw(), 12_500_000);
    assert_eq!(kazescan.get_ledger_height(&base).await.unwrap(), 77);
}

#[tokio::test]
async fn test_http_error_status_triggers_failover() {
    let kazescan_hits = Arc::new(AtomicU32::new(0));
    let hits = kazescan_hits.clone();
    let addr = start_programmable_backend(move |request: MockRequest| {
        let hits = hits.clone();
        async move {
            if request.path.starts_with("/v1/") {
                hits.fetch_add(1, Ordering::SeqCst);
                return (502, "{}".to_string());
            }
            explorer(request).await
        }
    })
    .await;
    let base = format!("http://{}", addr);

    let config = Arc::new(KazeConfig::default());
    let state = Arc::new(RouterState::new(&config.router));
    let http = transport(2_000);
    let router = AccessRouter::new(
        Kazescan::new(http.clone(), config.clone(), state.endpoints().clone()),
        KryptonDb::new(http, config, state.endpoints().clone()),
        state,
    );

    assert_eq!(router.get_ledger_height(&base).await.unwrap(), 78);
    assert_eq!(kazescan_hits.load(Ordering::SeqCst), 1);
    assert!((router.state().weight() - 0.2).abs() < 1e-9);
}

#[tokio::test]
async fn test_rpc_over_http() {
    let addr = start_programmable_backend(|request: MockRequest| async move {
        let result = match request.rpc_method().as_deref() {
            Some("getblockcount") => json!(1234),
            Some("sendrawtransaction") => json!(false),
            _ => return (200, json!({"jsonrpc": "2.0", "id": 1234, "error": {"code": -32601, "message": "Method not found"}}).to_string()),
        };
        (200, json!({"jsonrpc": "2.0", "id": 1234, "result": result}).to_string())
    })
    .await;
    let http = transport(2_000);
    let rpc = RpcClient::new(&http, format!("http://{}", addr));

    assert_eq!(rpc.get_block_count().await.unwrap(), 1234);
    assert!(rpc.ping().await.is_ok());
    let err = rpc.call("getpeers", vec![]).await.unwrap_err();
    assert!(matches!(err, KazeError::Rpc { code: -32601, .. }));
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    let addr = start_programmable_backend(|_request: MockRequest| async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        (200, json!({"height": 1}).to_string())
    })
    .await;
    let kazescan = Kazescan::new(transport(100), Arc::new(KazeConfig::default()), EndpointCache::new());

    let err = kazescan.get_ledger_height(&format!("http://{}", addr)).await.unwrap_err();
    assert!(matches!(err, KazeError::Timeout(100)));
}

#[tokio::test]
async fn test_non_json_body_is_unexpected_response() {
    let addr = start_programmable_backend(|_request: MockRequest| async { (200, "<html>".to_string()) }).await;
    let kazescan = Kazescan::new(transport(2_000), Arc::new(KazeConfig::default()), EndpointCache::new());

    let err = kazescan.get_ledger_height(&format!("http://{}", addr)).await.unwrap_err();
    assert!(matches!(err, KazeError::UnexpectedResponse(_)));
}
