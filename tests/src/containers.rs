//! Testcontainer setup for ClickHouse.
//!
//! Set `MIGRATE_TEST_CLICKHOUSE_URL` to run against an existing server
//! instead of starting a container.

use std::time::Duration;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

const CLICKHOUSE_URL_VAR: &str = "MIGRATE_TEST_CLICKHOUSE_URL";

fn configured_url() -> Option<String> {
    std::env::var(CLICKHOUSE_URL_VAR)
        .ok()
        .filter(|v| !v.trim().is_empty())
}

/// Whether a ClickHouse server is configured or a Docker daemon can start one.
pub fn clickhouse_available() -> bool {
    configured_url().is_some()
        || std::env::var_os("DOCKER_HOST").is_some()
        || std::path::Path::new("/var/run/docker.sock").exists()
}

/// Container handle for ClickHouse.
pub struct TestContainers {
    // Keeps the container alive for the duration of the test
    _clickhouse: Option<ContainerAsync<GenericImage>>,
    pub clickhouse_url: String,
    pub clickhouse_username: Option<String>,
    pub clickhouse_password: Option<String>,
}

impl TestContainers {
    /// Start ClickHouse container, or reuse the configured server.
    pub async fn start() -> Self {
        if let Some(url) = configured_url() {
            return Self {
                _clickhouse: None,
                clickhouse_url: url,
                clickhouse_username: std::env::var("MIGRATE_TEST_CLICKHOUSE_USER").ok(),
                clickhouse_password: std::env::var("MIGRATE_TEST_CLICKHOUSE_PASSWORD").ok(),
            };
        }

        let (clickhouse, clickhouse_url) = start_clickhouse().await;

        Self {
            _clickhouse: Some(clickhouse),
            clickhouse_url,
            clickhouse_username: Some("default".to_string()),
            clickhouse_password: None,
        }
    }
}

/// Start ClickHouse container, return container and HTTP URL.
pub async fn start_clickhouse() -> (ContainerAsync<GenericImage>, String) {
    // CLICKHOUSE_DEFAULT_ACCESS_MANAGEMENT=1 allows creating databases without password
    let image = GenericImage::new("clickhouse/clickhouse-server", "24.3")
        .with_wait_for(WaitFor::seconds(5))
        .with_exposed_port(8123.tcp())
        .with_env_var("CLICKHOUSE_DEFAULT_ACCESS_MANAGEMENT", "1")
        .with_env_var("CLICKHOUSE_USER", "default")
        .with_env_var("CLICKHOUSE_PASSWORD", "")
        .with_env_var("TZ", "UTC");

    let container = image.start().await.expect("Failed to start ClickHouse");

    let port = container.get_host_port_ipv4(8123).await.unwrap();
    let url = format!("http://127.0.0.1:{}", port);

    wait_for_http(&url, Duration::from_secs(30)).await;

    (container, url)
}

/// Wait for HTTP endpoint to respond.
async fn wait_for_http(url: &str, timeout: Duration) {
    let client = reqwest::Client::new();
    let start = std::time::Instant::now();

    while start.elapsed() < timeout {
        if let Ok(resp) = client.get(url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    panic!("HTTP endpoint {} not ready after {:?}", url, timeout);
}
