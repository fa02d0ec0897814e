//! Tracing subscriber initialization.
//!
//! Structured logs go to stdout, as JSON lines when `MESHGATE_LOG_JSON` is
//! set and human-readable otherwise. `RUST_LOG` overrides the default
//! filter.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "meshgate_api=debug,tower_http=debug,info";

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Emit JSON lines instead of pretty text
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "meshgate-api".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            json: false,
        }
    }
}

impl TelemetryConfig {
    /// Environment variables:
    /// - `MESHGATE_SERVICE_NAME`: Service name (default: meshgate-api)
    /// - `MESHGATE_LOG_JSON`: "true" or "1" for JSON output (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            service_name: std::env::var("MESHGATE_SERVICE_NAME")
                .unwrap_or(defaults.service_name),
            service_version: defaults.service_version,
            json: std::env::var("MESHGATE_LOG_JSON")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(false),
        }
    }
}

/// Install the global tracing subscriber.
///
/// Call once at startup before any tracing occurs. A second call fails.
pub fn init_tracing(config: &TelemetryConfig) -> ApiResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    result.map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = config.service_name,
        service_version = config.service_version,
        json = config.json,
        "Telemetry initialized"
    );

    Ok(())
}
