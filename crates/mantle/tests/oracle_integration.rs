use std::sync::Arc;

use chrono::{Duration, Utc};
use mantle_core::{
    BuildIdentity, DiskFreshnessStore, FreshnessStore, UpdateOracle, needs_update_at, run_check,
};
use mantle_net::CachedClient;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const RELEASE_BODY: &str = r#"{
    "tag_name": "v1.9.2",
    "assets": [{"name": "xposed-v1-1234-release.zip"}]
}"#;

fn identity(version_code: i64) -> BuildIdentity {
    BuildIdentity {
        version_code,
        version_name: "1.0.0".to_owned(),
        build_time: Utc::now() - Duration::days(1),
    }
}

/// Serve exactly one canned HTTP response on the listener, then hang up.
async fn serve_once(listener: TcpListener, status_line: &'static str, body: &'static str) {
    let (mut socket, _) = listener.accept().await.expect("fixture should accept");
    let mut request = [0u8; 4096];
    let _ = socket.read(&mut request).await;
    let response = format!(
        "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );
    socket
        .write_all(response.as_bytes())
        .await
        .expect("fixture should respond");
}

/// Bind a listener, then drop it so connections to the address are refused.
async fn refused_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("fixture should bind");
    let addr = listener.local_addr().expect("fixture should have an address");
    drop(listener);
    format!("http://{addr}/releases/latest")
}

#[tokio::test]
async fn successful_check_commits_full_verdict_and_survives_restart() {
    let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
    let record_path = temp_dir.path().join("freshness.json");

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("fixture should bind");
    let url = format!("http://{}/releases/latest", listener.local_addr().unwrap());
    tokio::spawn(serve_once(listener, "200 OK", RELEASE_BODY));

    let client = CachedClient::new(None);
    let store: Arc<dyn FreshnessStore> = Arc::new(DiskFreshnessStore::open(record_path.clone()));
    run_check(&client, store.as_ref(), &url).await;

    let snapshot = store.snapshot();
    assert!(snapshot.checked);
    assert!(snapshot.last_checked_at.is_some());
    assert_eq!(snapshot.latest_version_code, 1234);

    let oracle = UpdateOracle::new(Arc::new(client), Arc::clone(&store), identity(1000));
    assert!(oracle.needs_update());

    // A fresh process sees the persisted verdict.
    let reopened = DiskFreshnessStore::open(record_path);
    assert_eq!(reopened.snapshot(), snapshot);
}

#[tokio::test]
async fn newer_local_build_needs_no_update() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("fixture should bind");
    let url = format!("http://{}/releases/latest", listener.local_addr().unwrap());
    tokio::spawn(serve_once(listener, "200 OK", RELEASE_BODY));

    let client = Arc::new(CachedClient::new(None));
    let store: Arc<dyn FreshnessStore> = Arc::new(mantle_core::MemoryFreshnessStore::default());
    run_check(&client, store.as_ref(), &url).await;

    let oracle = UpdateOracle::new(client, store, identity(2000));
    assert!(!oracle.needs_update());
}

#[tokio::test]
async fn first_failed_check_marks_checked_only() {
    let url = refused_endpoint().await;
    let client = CachedClient::new(None);
    let store = mantle_core::MemoryFreshnessStore::default();

    run_check(&client, &store, &url).await;

    let snapshot = store.snapshot();
    assert!(snapshot.checked);
    assert!(snapshot.last_checked_at.is_none());
    assert_eq!(snapshot.latest_version_code, 0);

    // Never-verified builds are only nagged once they are 30 days old.
    let built = identity(1000);
    assert!(!needs_update_at(
        &snapshot,
        &built,
        built.build_time + Duration::days(29)
    ));
    assert!(needs_update_at(
        &snapshot,
        &built,
        built.build_time + Duration::days(31)
    ));
}

#[tokio::test]
async fn failed_recheck_leaves_earlier_verdict_untouched() {
    let client = CachedClient::new(None);
    let store = mantle_core::MemoryFreshnessStore::default();
    let checked_at = Utc::now();
    store.update(&mut |record| {
        record.checked = true;
        record.last_checked_at = Some(checked_at);
        record.latest_version_code = 1234;
    });

    let url = refused_endpoint().await;
    run_check(&client, &store, &url).await;

    let snapshot = store.snapshot();
    assert!(snapshot.checked);
    assert_eq!(snapshot.last_checked_at, Some(checked_at));
    assert_eq!(snapshot.latest_version_code, 1234);
}

#[tokio::test]
async fn http_error_status_counts_as_failed_check() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("fixture should bind");
    let url = format!("http://{}/releases/latest", listener.local_addr().unwrap());
    tokio::spawn(serve_once(listener, "404 Not Found", "{}"));

    let client = CachedClient::new(None);
    let store = mantle_core::MemoryFreshnessStore::default();
    run_check(&client, &store, &url).await;

    let snapshot = store.snapshot();
    assert!(snapshot.checked);
    assert!(snapshot.last_checked_at.is_none());
}

#[tokio::test]
async fn malformed_body_counts_as_failed_check() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("fixture should bind");
    let url = format!("http://{}/releases/latest", listener.local_addr().unwrap());
    tokio::spawn(serve_once(listener, "200 OK", "<html>rate limited</html>"));

    let client = CachedClient::new(None);
    let store = mantle_core::MemoryFreshnessStore::default();
    run_check(&client, &store, &url).await;

    let snapshot = store.snapshot();
    assert!(snapshot.checked);
    assert!(snapshot.last_checked_at.is_none());
    assert_eq!(snapshot.latest_version_code, 0);
}
