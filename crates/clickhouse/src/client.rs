//! ClickHouse client wrapper.

use crate::config::ClickHouseConfig;
use clickhouse::Client;
use migrate_core::{Error, Result};
use tracing::info;

/// ClickHouse client wrapper.
///
/// Cheap to clone; one instance is created per runner invocation and passed
/// to everything that talks to the store.
#[derive(Clone)]
pub struct ClickHouseClient {
    inner: Client,
    config: ClickHouseConfig,
}

impl ClickHouseClient {
    /// Creates a new ClickHouse client.
    pub fn new(config: ClickHouseConfig) -> Result<Self> {
        let parsed = url::Url::parse(&config.url)
            .map_err(|e| Error::config(format!("invalid ClickHouse URL {}: {}", config.url, e)))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "ClickHouse URL must use http or https, got {}",
                parsed.scheme()
            )));
        }

        let mut client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database)
            // Respond only once the statement has finished server-side
            .with_option("wait_end_of_query", "1")
            .with_option("max_execution_time", config.max_execution_time_secs.to_string());

        if let Some(ref user) = config.username {
            client = client.with_user(user);
        }

        if let Some(ref pass) = config.password {
            client = client.with_password(pass);
        }

        info!(
            url = %config.url,
            database = %config.database,
            "Created ClickHouse client"
        );

        Ok(Self {
            inner: client,
            config,
        })
    }

    /// Returns the inner clickhouse client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Returns a client that tags every request with `query_id`.
    pub fn tagged(&self, query_id: &str) -> Client {
        self.inner.clone().with_option("query_id", query_id)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }
}

/// Escape `?` so the client's bind-parameter parser passes SQL through verbatim.
pub fn escape_placeholders(sql: &str) -> String {
    sql.replace('?', "??")
}
