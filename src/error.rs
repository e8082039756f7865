// =============================================================================
// Crate-level error types
// =============================================================================
//
// One enum covers every failure source so that callers can match on the
// variant they care about while still propagating with `?`. Retry policy is
// the caller's decision: `SourceUnavailable` and `StorageUnavailable` are
// transient, everything else is not worth retrying without intervention.
// =============================================================================

use std::path::PathBuf;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FeedError>;

/// Top-level error type returned by all public APIs.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// A caller-supplied identifier or argument is invalid. Never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A numeric parameter is outside its allowed bounds.
    #[error("limit must be between 1 and 1000 (inclusive), got {0}")]
    Range(u32),

    /// The market-data provider could not be reached (network, timeout,
    /// or a transient HTTP status). Safe to retry with backoff.
    #[error("market data source unavailable: {0}")]
    SourceUnavailable(String),

    /// The provider responded, but not in the expected row shape.
    /// Structural, not retryable.
    #[error("malformed market data response: {0}")]
    SourceProtocol(String),

    /// The stored schema conflicts with the declared one. Requires operator
    /// intervention.
    #[error("storage schema mismatch: {0}")]
    Schema(String),

    /// The storage layer itself failed (open, busy, I/O). Retryable.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Too few rows to derive labels. Ingest more data before retrying.
    #[error("need at least 3 candles to build a labeled dataset, got {0}")]
    InsufficientData(usize),

    /// The ingestion config file does not exist. Fatal at startup.
    #[error("ingestion config {} not found", .0.display())]
    ConfigNotFound(PathBuf),
}
