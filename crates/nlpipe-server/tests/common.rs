//! Shared test harness: spins up a real `nlpipe-server` on a loopback
//! port backed by a temporary store, then drives it with `reqwest`.
//!
//! Grounded on `oxcrypt-webdav`'s `tests/*` pattern of running the real
//! HTTP server against a temp-dir-backed vault and exercising it with an
//! HTTP client, rather than calling handlers in-process.

use std::sync::Arc;

use nlpipe_core::{Registry, Service, Store};
use nlpipe_server::{AppState, Server, ServerConfig};

pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    server: Option<Server>,
    _dir: tempfile::TempDir,
}

impl TestServer {
    pub async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let mut registry = Registry::new();
        nlpipe_modules::register_builtins(&mut registry).unwrap();
        let service = Service::new(store, registry);

        let state = Arc::new(AppState::new(service, None));
        let config = ServerConfig {
            bind_address: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
            port: 0,
            root: dir.path().to_path_buf(),
            disable_authentication: true,
        };
        let server = Server::start(state, &config).await.unwrap();
        let base_url = server.url();

        Self { base_url, client: reqwest::Client::new(), server: Some(server), _dir: dir }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    #[allow(dead_code)]
    pub async fn stop(mut self) {
        if let Some(server) = self.server.take() {
            server.stop().await;
        }
    }
}
