#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use davit_auth::{AuthConfig, BasicAuth};
use davit_retention::{CleanupController, CleanupEngine, CleanupSchedule, RetentionPolicy};
use davit_server::{router, ServiceConfig};
use davit_storage::{ArtifactStore, FsStorage};
use std::sync::Arc;

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "password";

pub struct TestServer {
    pub dir: tempfile::TempDir,
    pub store: FsStorage,
    pub router: Router,
}

pub fn test_server(proxy_urls: Vec<String>) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStorage::new(dir.path()).unwrap();

    let auth = BasicAuth::new(AuthConfig {
        username: USERNAME.into(),
        password: PASSWORD.into(),
        accounts_file: None,
        anonymous_read: false,
    })
    .unwrap();

    let engine = CleanupEngine::new(
        store.clone(),
        RetentionPolicy {
            keep_days: 30,
            keep_latest_only: false,
        },
    );
    let cleanup = Arc::new(CleanupController::new(
        engine,
        CleanupSchedule {
            enabled: false,
            interval: "1h".into(),
        },
    ));

    let router = router(ServiceConfig { proxy_urls }, store.clone(), auth, cleanup);

    TestServer { dir, store, router }
}

pub fn basic_auth(user: &str, pass: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{pass}")))
}

pub fn request(method: &str, uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, basic_auth(USERNAME, PASSWORD))
        .body(body.into())
        .unwrap()
}

pub async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    use http_body_util::BodyExt;
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn seed(store: &FsStorage, path: &str, bytes: &[u8]) {
    store.save(path, &mut &bytes[..]).await.unwrap();
}

pub async fn stored_bytes(store: &FsStorage, path: &str) -> Option<Vec<u8>> {
    use tokio::io::AsyncReadExt;
    let mut reader = store.get(path).await.unwrap()?;
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await.unwrap();
    Some(buf)
}
