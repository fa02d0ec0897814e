//! API Configuration Module
//!
//! Configuration for the read pipeline and the HTTP listener. Everything is
//! loaded from environment variables with defaults suitable for local
//! development.

use meshgate_storage::{CacheConfig, DEFAULT_LIMIT_THRESHOLD};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::{ApiError, ApiResult};

/// Default server-side row ceiling for listings with `depth > 0`.
pub const DEFAULT_DEPTH_ROW_LIMIT: usize = 250;

// ============================================================================
// QUERY CONFIGURATION
// ============================================================================

/// Read pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    // ========================================================================
    // Snapshot cache
    // ========================================================================
    /// Whether listings may be served from snapshots.
    pub cache_enabled: bool,

    /// Directory holding `<tag>-<depth>.json` snapshots.
    pub cache_root: PathBuf,

    /// Serve small depth-0 pages from snapshots too.
    pub cache_all_limits: bool,

    /// Depth-0 listings with a limit at or below this are answered live.
    pub cache_limit_threshold: usize,

    // ========================================================================
    // Live listings
    // ========================================================================
    /// Row ceiling for listings with `depth > 0`. Zero disables the ceiling.
    pub depth_row_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            cache_enabled: false,
            cache_root: PathBuf::from("api-cache"),
            cache_all_limits: false,
            cache_limit_threshold: DEFAULT_LIMIT_THRESHOLD,
            depth_row_limit: DEFAULT_DEPTH_ROW_LIMIT,
        }
    }
}

impl QueryConfig {
    /// Create QueryConfig from environment variables.
    ///
    /// Environment variables:
    /// - `MESHGATE_API_CACHE_ENABLED`: "true" or "false" (default: false)
    /// - `MESHGATE_API_CACHE_ROOT`: Snapshot directory (default: ./api-cache)
    /// - `MESHGATE_API_CACHE_ALL_LIMITS`: "true" or "false" (default: false)
    /// - `MESHGATE_API_CACHE_LIMIT_THRESHOLD`: Live-query limit threshold (default: 250)
    /// - `MESHGATE_API_DEPTH_ROW_LIMIT`: Row ceiling for depth > 0, 0 disables (default: 250)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cache_enabled = std::env::var("MESHGATE_API_CACHE_ENABLED")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(false);

        let cache_root = std::env::var("MESHGATE_API_CACHE_ROOT")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_root);

        let cache_all_limits = std::env::var("MESHGATE_API_CACHE_ALL_LIMITS")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(false);

        let cache_limit_threshold = std::env::var("MESHGATE_API_CACHE_LIMIT_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.cache_limit_threshold);

        let depth_row_limit = std::env::var("MESHGATE_API_DEPTH_ROW_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.depth_row_limit);

        Self {
            cache_enabled,
            cache_root,
            cache_all_limits,
            cache_limit_threshold,
            depth_row_limit,
        }
    }

    pub fn with_cache(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_enabled = true;
        self.cache_root = root.into();
        self
    }

    pub fn with_depth_row_limit(mut self, limit: usize) -> Self {
        self.depth_row_limit = limit;
        self
    }

    /// Snapshot cache settings derived from this config.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_enabled(self.cache_enabled)
            .with_root(self.cache_root.clone())
            .with_all_limits(self.cache_all_limits)
            .with_limit_threshold(self.cache_limit_threshold)
    }

    /// The active row ceiling, if any.
    pub fn row_ceiling(&self) -> Option<usize> {
        (self.depth_row_limit > 0).then_some(self.depth_row_limit)
    }
}

// ============================================================================
// SERVER CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: "3000".to_string(),
        }
    }
}

impl ServerConfig {
    /// Environment variables:
    /// - `MESHGATE_API_BIND`: Listen host (default: 0.0.0.0)
    /// - `PORT` or `MESHGATE_API_PORT`: Listen port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let host = std::env::var("MESHGATE_API_BIND").unwrap_or(defaults.host);
        let port = std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("MESHGATE_API_PORT").ok())
            .unwrap_or(defaults.port);
        Self { host, port }
    }

    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let port = self.port.parse::<u16>().map_err(|_| {
            ApiError::invalid_parameter(format!("Invalid port value: {}", self.port))
        })?;

        let addr = format!("{}:{}", self.host, port);
        addr.parse::<SocketAddr>().map_err(|e| {
            ApiError::invalid_parameter(format!("Invalid bind address {}: {}", addr, e))
        })
    }
}
