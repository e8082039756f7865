// =============================================================================
// Candle value types and their table schemas
// =============================================================================
//
// `Candle` is one OHLCV time bucket as served by the exchange; `LabeledCandle`
// extends it with lag/lead close-price indicators. Both declare their column
// list and SQLite type tags statically, so the struct fields and the stored
// schema come from the same canonical source. The first column (`open_time`,
// epoch milliseconds) is the primary key and natural sort order.
// =============================================================================

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::storage::TableRecord;

/// A single OHLCV candle for one market/interval bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bucket open time, epoch milliseconds. Unique within a market/interval.
    pub open_time: i64,
    /// Bucket close time, epoch milliseconds.
    pub close_time: i64,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub close_price: f64,
    /// Traded volume in the base asset.
    pub volume_base: f64,
    /// Traded volume in the quote asset.
    pub volume_quote: f64,
    pub trade_count: i64,
    pub taker_buy_volume_base: f64,
    pub taker_buy_volume_quote: f64,
}

impl Candle {
    /// Bucket open time as a UTC datetime, for logs and status output.
    pub fn open_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.open_time)
    }
}

impl TableRecord for Candle {
    const COLUMNS: &'static [&'static str] = &[
        "open_time",
        "close_time",
        "open_price",
        "high_price",
        "low_price",
        "close_price",
        "volume_base",
        "volume_quote",
        "trade_count",
        "taker_buy_volume_base",
        "taker_buy_volume_quote",
    ];

    const TYPES: &'static [&'static str] = &[
        "INTEGER", "INTEGER", "REAL", "REAL", "REAL", "REAL", "REAL", "REAL", "INTEGER", "REAL",
        "REAL",
    ];

    fn sort_key(&self) -> i64 {
        self.open_time
    }

    fn to_params(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.open_time),
            Value::Integer(self.close_time),
            Value::Real(self.open_price),
            Value::Real(self.high_price),
            Value::Real(self.low_price),
            Value::Real(self.close_price),
            Value::Real(self.volume_base),
            Value::Real(self.volume_quote),
            Value::Integer(self.trade_count),
            Value::Real(self.taker_buy_volume_base),
            Value::Real(self.taker_buy_volume_quote),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            open_time: row.get(0)?,
            close_time: row.get(1)?,
            open_price: row.get(2)?,
            high_price: row.get(3)?,
            low_price: row.get(4)?,
            close_price: row.get(5)?,
            volume_base: row.get(6)?,
            volume_quote: row.get(7)?,
            trade_count: row.get(8)?,
            taker_buy_volume_base: row.get(9)?,
            taker_buy_volume_quote: row.get(10)?,
        })
    }
}

/// A candle augmented with indicators derived from its temporal neighbors.
///
/// Only interior candles of a labeling batch carry these flags; the first and
/// last candle of the batch have no predecessor/successor and are excluded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledCandle {
    pub open_time: i64,
    pub close_time: i64,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub close_price: f64,
    pub volume_base: f64,
    pub volume_quote: f64,
    pub trade_count: i64,
    pub taker_buy_volume_base: f64,
    pub taker_buy_volume_quote: f64,
    /// 1 when this candle closed strictly above the previous close, else 0.
    pub close_price_gt_prev: i64,
    /// 1 when the next candle closed strictly above this close, else 0.
    pub next_close_price_gt_curr: i64,
}

impl TableRecord for LabeledCandle {
    const COLUMNS: &'static [&'static str] = &[
        "open_time",
        "close_time",
        "open_price",
        "high_price",
        "low_price",
        "close_price",
        "volume_base",
        "volume_quote",
        "trade_count",
        "taker_buy_volume_base",
        "taker_buy_volume_quote",
        "close_price_gt_prev",
        "next_close_price_gt_curr",
    ];

    const TYPES: &'static [&'static str] = &[
        "INTEGER", "INTEGER", "REAL", "REAL", "REAL", "REAL", "REAL", "REAL", "INTEGER", "REAL",
        "REAL", "INTEGER", "INTEGER",
    ];

    fn sort_key(&self) -> i64 {
        self.open_time
    }

    fn to_params(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.open_time),
            Value::Integer(self.close_time),
            Value::Real(self.open_price),
            Value::Real(self.high_price),
            Value::Real(self.low_price),
            Value::Real(self.close_price),
            Value::Real(self.volume_base),
            Value::Real(self.volume_quote),
            Value::Integer(self.trade_count),
            Value::Real(self.taker_buy_volume_base),
            Value::Real(self.taker_buy_volume_quote),
            Value::Integer(self.close_price_gt_prev),
            Value::Integer(self.next_close_price_gt_curr),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            open_time: row.get(0)?,
            close_time: row.get(1)?,
            open_price: row.get(2)?,
            high_price: row.get(3)?,
            low_price: row.get(4)?,
            close_price: row.get(5)?,
            volume_base: row.get(6)?,
            volume_quote: row.get(7)?,
            trade_count: row.get(8)?,
            taker_buy_volume_base: row.get(9)?,
            taker_buy_volume_quote: row.get(10)?,
            close_price_gt_prev: row.get(11)?,
            next_close_price_gt_curr: row.get(12)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_declarations_are_consistent() {
        assert_eq!(Candle::COLUMNS.len(), Candle::TYPES.len());
        assert_eq!(LabeledCandle::COLUMNS.len(), LabeledCandle::TYPES.len());
        // The labeled table is the raw table plus the two flag columns.
        assert_eq!(&LabeledCandle::COLUMNS[..Candle::COLUMNS.len()], Candle::COLUMNS);
        assert_eq!(Candle::COLUMNS[0], "open_time");
        assert_eq!(LabeledCandle::COLUMNS[0], "open_time");
    }

    #[test]
    fn params_match_column_count() {
        let candle = Candle {
            open_time: 1_700_000_000_000,
            close_time: 1_700_000_059_999,
            open_price: 37000.0,
            high_price: 37050.0,
            low_price: 36990.0,
            close_price: 37020.0,
            volume_base: 123.456,
            volume_quote: 4_567_890.12,
            trade_count: 1500,
            taker_buy_volume_base: 60.123,
            taker_buy_volume_quote: 2_224_455.66,
        };
        assert_eq!(candle.to_params().len(), Candle::COLUMNS.len());
        assert_eq!(candle.sort_key(), 1_700_000_000_000);
    }

    #[test]
    fn open_datetime_converts_epoch_millis() {
        let candle = Candle {
            open_time: 0,
            close_time: 59_999,
            open_price: 1.0,
            high_price: 1.0,
            low_price: 1.0,
            close_price: 1.0,
            volume_base: 0.0,
            volume_quote: 0.0,
            trade_count: 0,
            taker_buy_volume_base: 0.0,
            taker_buy_volume_quote: 0.0,
        };
        let dt = candle.open_datetime().unwrap();
        assert_eq!(dt.timestamp_millis(), 0);
    }
}
