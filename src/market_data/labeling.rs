// =============================================================================
// Candle labeling
// =============================================================================
//
// Derives lag/lead close-price indicators from an ordered candle sequence:
//
//   close_price_gt_prev      = 1 iff close(t) > close(t-1)
//   next_close_price_gt_curr = 1 iff close(t+1) > close(t)
//
// Both comparisons are strict. A candle needs a predecessor and a successor
// to be labeled, so the first and last candle of the input are excluded and
// at least 3 candles are required to produce a single labeled record.
// =============================================================================

use crate::error::{FeedError, Result};
use crate::market_data::{Candle, LabeledCandle};

/// Label every interior candle of an ascending, deduplicated sequence.
///
/// # Returns
/// `candles.len() - 2` labeled records, in the same order as the input.
///
/// # Errors
/// `InsufficientData` when fewer than 3 candles are supplied.
pub fn label_candles(candles: &[Candle]) -> Result<Vec<LabeledCandle>> {
    if candles.len() < 3 {
        return Err(FeedError::InsufficientData(candles.len()));
    }

    Ok(candles
        .windows(3)
        .map(|w| from_neighbors(&w[0], &w[1], &w[2]))
        .collect())
}

fn from_neighbors(prev: &Candle, curr: &Candle, next: &Candle) -> LabeledCandle {
    LabeledCandle {
        open_time: curr.open_time,
        close_time: curr.close_time,
        open_price: curr.open_price,
        high_price: curr.high_price,
        low_price: curr.low_price,
        close_price: curr.close_price,
        volume_base: curr.volume_base,
        volume_quote: curr.volume_quote,
        trade_count: curr.trade_count,
        taker_buy_volume_base: curr.taker_buy_volume_base,
        taker_buy_volume_quote: curr.taker_buy_volume_quote,
        close_price_gt_prev: (curr.close_price > prev.close_price) as i64,
        next_close_price_gt_curr: (next.close_price > curr.close_price) as i64,
    }
}
