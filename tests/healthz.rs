use std::net::SocketAddr;
use std::time::Duration;

use chfs::application::services::direct_transfer_service::DirectTransferService;
use chfs::infrastructure::config_store::ConfigStore;
use chfs::infrastructure::stores::transfer_store::TransferStore;
use chfs::interfaces::api::router;
use chfs::interfaces::state::AppState;

/// Boots the real router end to end (config load, middleware stack, the
/// lot) against a throwaway config and confirms `/healthz` and `/metrics`
/// come back through the full pipeline, the same kind of smoke check
/// `readur-readur`'s health integration test runs against its own server.
#[tokio::test]
async fn healthz_and_metrics_respond() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("chfs.yaml");
    std::fs::write(&config_path, "server:\n  port: 0\n").unwrap();

    let data_dir = dir.path().join("data");
    let config = ConfigStore::load(config_path, data_dir.clone()).await.unwrap();
    let transfer_store = TransferStore::new(&data_dir);
    let state = AppState::new(config, DirectTransferService::new(transfer_store));

    let app = router::build(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });

    let client = reqwest::Client::builder().timeout(Duration::from_secs(5)).build().unwrap();

    let health = client.get(format!("http://{addr}/healthz")).send().await.unwrap();
    assert_eq!(health.status(), 200);
    assert_eq!(health.text().await.unwrap(), "ok");

    let metrics = client.get(format!("http://{addr}/metrics")).send().await.unwrap();
    assert_eq!(metrics.status(), 200);
    let body: serde_json::Value = metrics.json().await.unwrap();
    assert_eq!(body["code"], 0);
}
