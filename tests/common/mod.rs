#![allow(dead_code)]

pub mod upstream_stub;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use assistant_relay::config::RelayConfig;
use assistant_relay::server::build_router;
use assistant_relay::util::AppState;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// The relay bound to an ephemeral local port.
///
/// Configuration is built from an explicit key/value list rather than the
/// process environment, so tests can run in parallel. Outbound and test
/// clients bypass any proxy configured on the host.
pub struct TestServer {
    pub base_url: String,
    pub addr: SocketAddr,
    pub upload_dir: PathBuf,
    _upload_root: tempfile::TempDir,
    join: JoinHandle<()>,
    client: reqwest::Client,
}

impl TestServer {
    fn make_client() -> reqwest::Client {
        reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed building reqwest client")
    }

    pub async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
    }

    pub async fn post_json<T: serde::Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
    }

    pub async fn post_bytes(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
    }

    pub async fn post_form(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .multipart(form)
            .send()
            .await
    }

    /// Files currently left in the upload directory.
    pub fn leftover_uploads(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.upload_dir) {
            Ok(entries) => entries.filter_map(|e| e.ok().map(|e| e.path())).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.join.abort();
    }
}

/// Spawn the relay against `upstream_base_url` with fast polling.
///
/// `overrides` are applied last and may unset a default by giving an empty value.
pub async fn spawn_relay(upstream_base_url: &str, overrides: &[(&str, &str)]) -> TestServer {
    let upload_root = tempfile::tempdir().expect("upload tempdir");
    let upload_dir = upload_root.path().join("uploads");

    let mut env: HashMap<String, String> = HashMap::new();
    env.insert("OPENAI_API_KEY".into(), "sk-test".into());
    env.insert("ASSISTANT_ID".into(), "asst_test".into());
    env.insert("OPENAI_BASE_URL".into(), upstream_base_url.into());
    env.insert("RELAY_POLL_INTERVAL_MS".into(), "5".into());
    env.insert(
        "RELAY_UPLOAD_DIR".into(),
        upload_dir.to_string_lossy().into_owned(),
    );
    env.insert(
        "RELAY_STATIC_DIR".into(),
        upload_root.path().join("no-static").to_string_lossy().into_owned(),
    );
    for (k, v) in overrides {
        env.insert(k.to_string(), v.to_string());
    }

    let config = RelayConfig::from_lookup(|k| env.get(k).cloned()).expect("test config");
    let http = reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("relay http client");
    let app = build_router(Arc::new(AppState::with_http(config, http)));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let base_url = format!("http://{}", addr);
    let server = axum::serve(listener, app.into_make_service());

    let join = tokio::spawn(async move {
        if let Err(e) = server.await {
            eprintln!("Test server error: {e:?}");
        }
    });

    TestServer {
        base_url,
        addr,
        upload_dir,
        _upload_root: upload_root,
        join,
        client: TestServer::make_client(),
    }
}
