// =============================================================================
// Binance REST API client for public kline data
// =============================================================================
//
// Only the public market-data surface is used here, so no request signing is
// involved. One bounded timeout is configured on the underlying HTTP client;
// on expiry the fetch surfaces as `SourceUnavailable`. Retry policy is the
// caller's decision: this client never retries.
// =============================================================================

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::{FeedError, Result};
use crate::market_data::{Candle, CandleSource};

/// Binance REST API client for one spot market.
#[derive(Debug, Clone)]
pub struct BinanceClient {
    base_url: String,
    symbol: String,
    client: reqwest::Client,
}

impl BinanceClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create a new `BinanceClient`.
    ///
    /// # Arguments
    /// * `base_url` — API host, e.g. "https://api.binance.com".
    /// * `symbol`   — spot market symbol, e.g. "BTCUSDT".
    /// * `timeout`  — per-request timeout applied to every fetch.
    pub fn new(base_url: impl Into<String>, symbol: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");

        Self {
            base_url: base_url.into(),
            symbol: symbol.into(),
            client,
        }
    }

    // -------------------------------------------------------------------------
    // Public market data
    // -------------------------------------------------------------------------

    /// GET /api/v3/klines (public, no signature required).
    ///
    /// Array indices in each kline row:
    ///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
    ///   [6] closeTime, [7] quoteAssetVolume, [8] numberOfTrades,
    ///   [9] takerBuyBaseVolume, [10] takerBuyQuoteVolume
    #[instrument(skip(self), name = "binance::fetch_candles")]
    async fn fetch_klines(
        &self,
        interval: &str,
        limit: u32,
        start_time: Option<i64>,
        end_time: Option<i64>,
    ) -> Result<Vec<Candle>> {
        validate_limit(limit)?;

        let mut url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url, self.symbol, interval, limit
        );
        if let Some(start) = start_time {
            url.push_str(&format!("&startTime={start}"));
        }
        if let Some(end) = end_time {
            url.push_str(&format!("&endTime={end}"));
        }

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FeedError::SourceUnavailable(format!("GET /api/v3/klines failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = format!("GET /api/v3/klines returned {status}: {body}");
            // 5xx and rate limiting are transient; anything else means the
            // request itself is wrong and a retry cannot help.
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                FeedError::SourceUnavailable(message)
            } else {
                FeedError::SourceProtocol(message)
            });
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| FeedError::SourceProtocol(format!("failed to parse klines response: {e}")))?;
        let raw = body
            .as_array()
            .ok_or_else(|| FeedError::SourceProtocol("klines response is not an array".into()))?;

        let mut candles = raw
            .iter()
            .map(parse_kline_row)
            .collect::<Result<Vec<Candle>>>()?;

        // Binance serves klines ascending already; normalising here upholds
        // the CandleSource contract even if the provider misbehaves.
        candles.sort_by_key(|c| c.open_time);
        candles.dedup_by_key(|c| c.open_time);

        debug!(
            symbol = %self.symbol,
            interval,
            count = candles.len(),
            "klines fetched"
        );
        Ok(candles)
    }
}

impl CandleSource for BinanceClient {
    async fn fetch_candles(
        &self,
        interval: &str,
        limit: u32,
        start_time: Option<i64>,
        end_time: Option<i64>,
    ) -> Result<Vec<Candle>> {
        self.fetch_klines(interval, limit, start_time, end_time).await
    }
}

// -----------------------------------------------------------------------------
// Parsing helpers
// -----------------------------------------------------------------------------

/// Reject fetch limits outside the provider's documented [1, 1000] window.
fn validate_limit(limit: u32) -> Result<()> {
    if !(1..=1000).contains(&limit) {
        return Err(FeedError::Range(limit));
    }
    Ok(())
}

/// Parse one kline row from Binance's array-of-arrays response format.
fn parse_kline_row(entry: &Value) -> Result<Candle> {
    let arr = entry
        .as_array()
        .ok_or_else(|| FeedError::SourceProtocol("kline entry is not an array".into()))?;

    if arr.len() < 11 {
        return Err(FeedError::SourceProtocol(format!(
            "kline entry has {} elements, expected at least 11",
            arr.len()
        )));
    }

    Ok(Candle {
        open_time: parse_i64(&arr[0], "openTime")?,
        close_time: parse_i64(&arr[6], "closeTime")?,
        open_price: parse_f64(&arr[1], "open")?,
        high_price: parse_f64(&arr[2], "high")?,
        low_price: parse_f64(&arr[3], "low")?,
        close_price: parse_f64(&arr[4], "close")?,
        volume_base: parse_f64(&arr[5], "volume")?,
        volume_quote: parse_f64(&arr[7], "quoteAssetVolume")?,
        trade_count: parse_i64(&arr[8], "numberOfTrades")?,
        taker_buy_volume_base: parse_f64(&arr[9], "takerBuyBaseVolume")?,
        taker_buy_volume_quote: parse_f64(&arr[10], "takerBuyQuoteVolume")?,
    })
}

/// Binance sends numeric fields as either JSON strings or numbers.
fn parse_f64(val: &Value, name: &str) -> Result<f64> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>()
            .map_err(|_| FeedError::SourceProtocol(format!("failed to parse {name} '{s}' as f64")))
    } else if let Some(n) = val.as_f64() {
        Ok(n)
    } else {
        Err(FeedError::SourceProtocol(format!(
            "field {name} has unexpected JSON type: {val}"
        )))
    }
}

fn parse_i64(val: &Value, name: &str) -> Result<i64> {
    val.as_i64().ok_or_else(|| {
        FeedError::SourceProtocol(format!("field {name} is not an integer: {val}"))
    })
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn limit_bounds_are_enforced() {
        assert!(matches!(validate_limit(0), Err(FeedError::Range(0))));
        assert!(matches!(validate_limit(1001), Err(FeedError::Range(1001))));
        assert!(validate_limit(1).is_ok());
        assert!(validate_limit(1000).is_ok());
        assert!(validate_limit(500).is_ok());
    }

    #[tokio::test]
    async fn out_of_range_limit_fails_before_any_io() {
        // Unroutable base URL: a network attempt would fail differently.
        let client = BinanceClient::new("http://127.0.0.1:1", "BTCUSDT", Duration::from_secs(1));
        let err = client.fetch_candles("1h", 0, None, None).await.unwrap_err();
        assert!(matches!(err, FeedError::Range(0)));
        let err = client
            .fetch_candles("1h", 1001, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::Range(1001)));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transient_failure() {
        let client = BinanceClient::new("http://127.0.0.1:1", "BTCUSDT", Duration::from_secs(1));
        let err = client.fetch_candles("1h", 10, None, None).await.unwrap_err();
        assert!(matches!(err, FeedError::SourceUnavailable(_)));
    }

    #[test]
    fn parse_kline_row_ok() {
        let entry = json!([
            1700000000000i64,
            "37000.00",
            "37050.00",
            "36990.00",
            "37020.00",
            "123.456",
            1700000059999i64,
            "4567890.12",
            1500,
            "60.123",
            "2224455.66",
            "0"
        ]);
        let candle = parse_kline_row(&entry).expect("should parse");
        assert_eq!(candle.open_time, 1_700_000_000_000);
        assert_eq!(candle.close_time, 1_700_000_059_999);
        assert!((candle.close_price - 37020.0).abs() < f64::EPSILON);
        assert!((candle.volume_base - 123.456).abs() < f64::EPSILON);
        assert!((candle.volume_quote - 4_567_890.12).abs() < f64::EPSILON);
        assert_eq!(candle.trade_count, 1500);
    }

    #[test]
    fn parse_kline_row_accepts_plain_numbers() {
        let entry = json!([
            1700000000000i64,
            37000.0,
            37050.0,
            36990.0,
            37020.0,
            123.456,
            1700000059999i64,
            4567890.12,
            1500,
            60.123,
            2224455.66,
            0
        ]);
        let candle = parse_kline_row(&entry).expect("should parse");
        assert!((candle.open_price - 37000.0).abs() < f64::EPSILON);
        assert!((candle.taker_buy_volume_quote - 2_224_455.66).abs() < f64::EPSILON);
    }

    #[test]
    fn short_kline_row_is_a_protocol_error() {
        let entry = json!([1700000000000i64, "37000.00", "37050.00"]);
        assert!(matches!(
            parse_kline_row(&entry),
            Err(FeedError::SourceProtocol(_))
        ));
    }

    #[test]
    fn non_array_kline_entry_is_a_protocol_error() {
        let entry = json!({"openTime": 1700000000000i64});
        assert!(matches!(
            parse_kline_row(&entry),
            Err(FeedError::SourceProtocol(_))
        ));
    }

    #[test]
    fn unparsable_price_is_a_protocol_error() {
        let entry = json!([
            1700000000000i64,
            "not-a-price",
            "37050.00",
            "36990.00",
            "37020.00",
            "123.456",
            1700000059999i64,
            "4567890.12",
            1500,
            "60.123",
            "2224455.66",
            "0"
        ]);
        assert!(matches!(
            parse_kline_row(&entry),
            Err(FeedError::SourceProtocol(_))
        ));
    }
}
