// =============================================================================
// Ingestion configuration
// =============================================================================
//
// Loaded once at startup from a JSON file. Every field carries a serde
// default so that a partial config file keeps working as fields are added;
// a missing file is a hard startup failure, never a silent default run.
// =============================================================================

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{FeedError, Result};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_interval() -> String {
    "1h".to_string()
}

fn default_limit() -> u32 {
    500
}

fn default_table() -> String {
    "btc_candles".to_string()
}

fn default_labeled_table() -> String {
    "btc_candles_labeled".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("feature_store/bitcoin.db")
}

fn default_base_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

// =============================================================================
// IngestionConfig
// =============================================================================

/// Configuration describing how candles are fetched and where they land.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Kline sampling granularity, e.g. "1m", "1h", "1d".
    #[serde(default = "default_interval")]
    pub interval: String,

    /// Candles per fetch. The source enforces the provider's [1, 1000] bound.
    #[serde(default = "default_limit")]
    pub limit: u32,

    /// Optional inclusive lower fetch bound, epoch milliseconds.
    #[serde(default)]
    pub start_time: Option<i64>,

    /// Optional inclusive upper fetch bound, epoch milliseconds.
    #[serde(default)]
    pub end_time: Option<i64>,

    /// Destination table for raw candles.
    #[serde(default = "default_table")]
    pub table: String,

    /// Destination table for labeled candles.
    #[serde(default = "default_labeled_table")]
    pub labeled_table: String,

    /// Store file location.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Exchange API host.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Spot market symbol.
    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Per-request network timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            limit: default_limit(),
            start_time: None,
            end_time: None,
            table: default_table(),
            labeled_table: default_labeled_table(),
            db_path: default_db_path(),
            base_url: default_base_url(),
            symbol: default_symbol(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl IngestionConfig {
    /// Load configuration from the JSON file at `path`.
    ///
    /// # Errors
    /// `ConfigNotFound` when the file does not exist; `Validation` when it
    /// exists but cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(FeedError::ConfigNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            FeedError::Validation(format!(
                "failed to read ingestion config {}: {e}",
                path.display()
            ))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            FeedError::Validation(format!(
                "failed to parse ingestion config {}: {e}",
                path.display()
            ))
        })?;

        info!(
            path = %path.display(),
            interval = %config.interval,
            limit = config.limit,
            table = %config.table,
            "ingestion config loaded"
        );

        Ok(config)
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = IngestionConfig::default();
        assert_eq!(cfg.interval, "1h");
        assert_eq!(cfg.limit, 500);
        assert_eq!(cfg.start_time, None);
        assert_eq!(cfg.end_time, None);
        assert_eq!(cfg.table, "btc_candles");
        assert_eq!(cfg.labeled_table, "btc_candles_labeled");
        assert_eq!(cfg.db_path, PathBuf::from("feature_store/bitcoin.db"));
        assert_eq!(cfg.base_url, "https://api.binance.com");
        assert_eq!(cfg.symbol, "BTCUSDT");
        assert_eq!(cfg.timeout_secs, 15);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: IngestionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.interval, "1h");
        assert_eq!(cfg.limit, 500);
        assert_eq!(cfg.table, "btc_candles");
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "interval": "5m", "limit": 750, "start_time": 1700000000000 }"#;
        let cfg: IngestionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.interval, "5m");
        assert_eq!(cfg.limit, 750);
        assert_eq!(cfg.start_time, Some(1_700_000_000_000));
        assert_eq!(cfg.end_time, None);
        assert_eq!(cfg.table, "btc_candles");
        assert_eq!(cfg.symbol, "BTCUSDT");
    }

    #[test]
    fn missing_file_is_config_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does_not_exist.json");
        match IngestionConfig::load(&path) {
            Err(FeedError::ConfigNotFound(p)) => assert_eq!(p, path),
            other => panic!("expected ConfigNotFound, got {other:?}"),
        }
    }

    #[test]
    fn malformed_file_is_a_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            IngestionConfig::load(&path),
            Err(FeedError::Validation(_))
        ));
    }

    #[test]
    fn load_reads_a_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bitcoin_ingest.json");
        std::fs::write(&path, r#"{ "interval": "15m", "table": "eth_candles" }"#).unwrap();

        let cfg = IngestionConfig::load(&path).unwrap();
        assert_eq!(cfg.interval, "15m");
        assert_eq!(cfg.table, "eth_candles");
        assert_eq!(cfg.limit, 500);
    }

    #[test]
    fn roundtrip_serialisation() {
        let cfg = IngestionConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let cfg2: IngestionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.interval, cfg2.interval);
        assert_eq!(cfg.limit, cfg2.limit);
        assert_eq!(cfg.table, cfg2.table);
        assert_eq!(cfg.db_path, cfg2.db_path);
    }
}
