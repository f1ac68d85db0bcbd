//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crushd::config::{ClusterConfig, ServiceConfig};
use crushd::http::{HttpServer, ServerError};
use crushd::lifecycle::Shutdown;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[allow(dead_code)]
pub const FSID: &str = "12fad6a4-9f5b-4c2a-8c4e-3b2d1f0e9a11";
#[allow(dead_code)]
pub const OTHER_FSID: &str = "5d0c1c1e-2b1f-4d7a-9a61-7c0e8f1b2a33";

/// Three hosts with four OSDs each; rulesets data/metadata/rbd.
pub fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/crush_map.json")
}

pub fn cluster(fsid: &str, name: &str, crush_map: impl Into<PathBuf>) -> ClusterConfig {
    ClusterConfig {
        fsid: fsid.into(),
        name: name.into(),
        crush_map: crush_map.into().to_string_lossy().into_owned(),
    }
}

/// Defaults suited to tests: one fixture cluster, no periodic refresh.
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.inventory.refresh_enabled = false;
    config.timeouts.shutdown_grace_secs = 1;
    config.clusters.push(cluster(FSID, "ceph", fixture_path()));
    config
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    #[allow(dead_code)]
    pub config_tx: mpsc::UnboundedSender<ServiceConfig>,
    pub handle: JoinHandle<Result<(), ServerError>>,
    pub client: reqwest::Client,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("server unreachable")
    }
}

/// Start the server on an ephemeral port and wait until it answers.
pub async fn start_server(config: ServiceConfig) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (config_tx, config_rx) = mpsc::unbounded_channel();
    let server = HttpServer::new(config);
    let handle = tokio::spawn(server.run(listener, config_rx, shutdown.subscribe()));

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap();

    for _ in 0..50 {
        if let Ok(res) = client.get(format!("http://{}/health", addr)).send().await {
            if res.status().is_success() {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    TestServer {
        addr,
        shutdown,
        config_tx,
        handle,
        client,
    }
}
