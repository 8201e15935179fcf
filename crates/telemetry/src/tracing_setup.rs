//! Tracing setup for structured logging.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter: our crates at info, the store client quieter.
pub const DEFAULT_FILTER: &str = "info,hyper=warn,sqlx=warn";

/// Tracing configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level filter (e.g., "info", "migrations=debug")
    pub filter: String,
    /// Whether to output JSON format
    pub json: bool,
    /// Whether to include source locations
    pub source_location: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            json: false,
            source_location: false,
        }
    }
}

impl TracingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `RUST_LOG` and `LOG_JSON`.
    pub fn from_env() -> Self {
        let json = std::env::var("LOG_JSON")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());

        Self::new().with_filter(filter).with_json(json)
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self.source_location = json;
        self
    }
}

/// Initialize tracing with the given configuration.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(config: TracingConfig) -> bool {
    let env_filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = if config.json {
        let fmt_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_file(config.source_location)
            .with_line_number(config.source_location);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .is_ok()
    } else {
        let fmt_layer = fmt::layer()
            .with_target(false)
            .with_file(config.source_location)
            .with_line_number(config.source_location);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .is_ok()
    };

    if installed {
        tracing::debug!(filter = %config.filter, json = config.json, "Tracing initialized");
    }
    installed
}

/// Initialize tracing from environment variables.
pub fn init_tracing_from_env() -> bool {
    init_tracing(TracingConfig::from_env())
}
