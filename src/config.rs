use serde::Deserialize;
use std::path::PathBuf;

// =============================================================================
// Time-related constants
// =============================================================================

/// Timeout for a single fetch attempt in seconds
pub const FETCH_TIMEOUT_SECS: u64 = 30;

/// Delay between starting each fetch request to avoid rate limiting (10ms)
pub const FETCH_STAGGER_DELAY_MS: u64 = 10;

/// Total attempts for a transiently-failing fetch (1 initial + 2 retries)
pub const RETRY_MAX_ATTEMPTS: usize = 3;

/// First retry delay in milliseconds; doubles on each subsequent attempt
pub const RETRY_BASE_DELAY_MS: u64 = 200;

/// Cap on a single retry delay
pub const RETRY_MAX_DELAY_MS: u64 = 2_000;

/// Upper bound on the random jitter added to each retry delay
pub const RETRY_JITTER_MS: u64 = 100;

// =============================================================================
// Resource limits
// =============================================================================

/// Concurrent recommendation file fetches per batch
pub const RECOMMENDATION_FETCH_PERMITS: usize = 3;

/// Ceiling on the decompressed size of a remote data document (15 MB)
pub const MAX_DECODED_DOCUMENT_BYTES: usize = 15_000_000;

/// User agent sent with every outbound request
pub const USER_AGENT: &str = "compat-advisor";

/// Default base URL for the compatibility data store
pub const DEFAULT_DATA_BASE_URL: &str = "https://data.compat-advisor.dev";

/// Engine configuration structure
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub sources: SourcesConfig,
    pub recommendations: RecommendationConfig,
    pub cache: CacheConfig,
}

/// Per-source-checker configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SourcesConfig {
    pub platform_sdk: SourceConfig,
    pub registry: SourceConfig,
    pub fallback: SourceConfig,
}

/// Individual data source configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SourceConfig {
    pub enabled: bool,
    /// Override for the source's base URL (tests point this at a local server)
    pub base_url: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
        }
    }
}

/// Recommendation lookup configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RecommendationConfig {
    pub enabled: bool,
    pub base_url: Option<String>,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
        }
    }
}

/// Cache-related configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// Snapshot file loaded at startup and saved at shutdown when set
    pub snapshot_path: Option<PathBuf>,
}

/// Returns the path to the data directory for compat-advisor.
/// Uses $XDG_DATA_HOME/compat-advisor if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/compat-advisor,
/// or ./compat-advisor if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the default path of the cache snapshot file.
pub fn snapshot_path() -> PathBuf {
    data_dir().join("analysis-cache.json")
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join("compat-advisor.log")
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("compat-advisor")
}
