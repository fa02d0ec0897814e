//! Snapshot cache configuration.

use std::path::PathBuf;

/// Default limit below which a depth-0 listing is answered live.
pub const DEFAULT_LIMIT_THRESHOLD: usize = 250;

/// Deepest listing depth snapshots are generated for.
pub const MAX_SNAPSHOT_DEPTH: u32 = 3;

/// Configuration for the snapshot cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Whether snapshots may be served at all.
    pub enabled: bool,
    /// Directory holding `<tag>-<depth>.json` files.
    pub root: PathBuf,
    /// Serve small-limit listings from snapshots too.
    pub all_limits: bool,
    /// Depth-0 listings with a limit at or below this go live.
    pub limit_threshold: usize,
    pub max_depth: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            root: PathBuf::from("api-cache"),
            all_limits: false,
            limit_threshold: DEFAULT_LIMIT_THRESHOLD,
            max_depth: MAX_SNAPSHOT_DEPTH,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_all_limits(mut self, all_limits: bool) -> Self {
        self.all_limits = all_limits;
        self
    }

    pub fn with_limit_threshold(mut self, threshold: usize) -> Self {
        self.limit_threshold = threshold;
        self
    }

    /// Path of the snapshot for `(tag, depth)`.
    pub fn snapshot_path(&self, tag: &str, depth: u32) -> PathBuf {
        self.root.join(format!("{}-{}.json", tag, depth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.limit_threshold, 250);
        assert_eq!(config.max_depth, 3);
    }

    #[test]
    fn test_snapshot_path() {
        let config = CacheConfig::new().with_root("/var/cache/meshgate");
        assert_eq!(
            config.snapshot_path("net", 2),
            PathBuf::from("/var/cache/meshgate/net-2.json")
        );
    }
}
