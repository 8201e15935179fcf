//! ClickHouse health checks.

use crate::client::ClickHouseClient;
use tracing::{debug, error};

/// Check ClickHouse connection health.
pub async fn check_connection(client: &ClickHouseClient) -> bool {
    match client.inner().query("SELECT 1").fetch_one::<u8>().await {
        Ok(_) => {
            debug!("ClickHouse connection healthy");
            true
        }
        Err(e) => {
            error!(url = %client.config().url, "ClickHouse health check failed: {}", e);
            false
        }
    }
}
