pub mod candle;
pub mod labeling;

// Re-export the candle types for convenient access (e.g. `use crate::market_data::Candle`).
pub use candle::{Candle, LabeledCandle};
pub use labeling::label_candles;

use crate::error::Result;

/// A source of ordered candle batches for one market.
///
/// Implementations must return candles ascending by `open_time` with no
/// duplicate `open_time` values within one call. Retry policy is left to the
/// caller.
pub trait CandleSource {
    /// Fetch at most `limit` candles (1..=1000) for `interval`, optionally
    /// bounded by `start_time` / `end_time` (epoch milliseconds, inclusive).
    fn fetch_candles(
        &self,
        interval: &str,
        limit: u32,
        start_time: Option<i64>,
        end_time: Option<i64>,
    ) -> impl std::future::Future<Output = Result<Vec<Candle>>> + Send;
}
