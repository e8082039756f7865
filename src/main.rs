// =============================================================================
// Aurora Feature Feed: main entry point
// =============================================================================
//
// Three one-shot commands over the candle feature store:
//
//   aurora-feed ingest   fetch one batch of klines and upsert the raw table
//   aurora-feed label    rebuild the labeled table from stored raw candles
//   aurora-feed status   row counts and the most recent stored candle
//
// A missing config file aborts startup; retry/abort policy for transient
// fetch or storage failures belongs to whoever schedules this binary.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod binance;
mod error;
mod ingest_config;
mod market_data;
mod pipeline;
mod storage;

use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::binance::BinanceClient;
use crate::error::FeedError;
use crate::ingest_config::IngestionConfig;
use crate::storage::FeatureStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Aurora Feature Feed starting up");

    let command = std::env::args().nth(1).unwrap_or_else(|| "ingest".to_string());

    let config_path = std::env::var("INGEST_CONFIG")
        .unwrap_or_else(|_| "config/bitcoin_ingest.json".to_string());
    let mut config = IngestionConfig::load(&config_path)?;

    // Env overrides take precedence over the config file.
    if let Ok(url) = std::env::var("BINANCE_BASE_URL") {
        config.base_url = url;
    }
    if let Ok(symbol) = std::env::var("BINANCE_SYMBOL") {
        config.symbol = symbol.trim().to_uppercase();
    }
    if let Ok(db_path) = std::env::var("FEATURE_DB_PATH") {
        config.db_path = db_path.into();
    }

    info!(
        symbol = %config.symbol,
        interval = %config.interval,
        db_path = %config.db_path.display(),
        "configured market"
    );

    // ── 2. Build caller-owned collaborators ──────────────────────────────
    let mut store = FeatureStore::open(&config.db_path)?;

    // ── 3. Dispatch ──────────────────────────────────────────────────────
    match command.as_str() {
        "ingest" => {
            let client = BinanceClient::new(
                &config.base_url,
                &config.symbol,
                Duration::from_secs(config.timeout_secs),
            );
            let (new_rows, total_rows) =
                pipeline::run_ingestion(&client, &mut store, &config).await?;
            info!(new_rows, total_rows, table = %config.table, "ingestion finished");
        }
        "label" => {
            let new_rows =
                pipeline::run_labeling(&mut store, &config.table, &config.labeled_table, None)?;
            info!(new_rows, table = %config.labeled_table, "labeling finished");
        }
        "status" => {
            match store.count_rows(&config.table) {
                Ok(total) => {
                    info!(table = %config.table, rows = total, "raw candle table");
                    if total > 0 {
                        if let Some(latest) =
                            pipeline::load_candles(&store, &config.table, Some(1), true)?
                                .into_iter()
                                .next()
                        {
                            let open_time = latest
                                .open_datetime()
                                .map(|dt| dt.to_rfc3339())
                                .unwrap_or_else(|| latest.open_time.to_string());
                            info!(
                                open_time = %open_time,
                                close_price = latest.close_price,
                                "most recent candle"
                            );
                        }
                    }
                }
                Err(FeedError::Schema(_)) => {
                    info!(table = %config.table, "raw candle table not created yet");
                }
                Err(e) => return Err(e.into()),
            }
            match store.count_rows(&config.labeled_table) {
                Ok(total) => {
                    info!(table = %config.labeled_table, rows = total, "labeled candle table");
                    if total > 0 {
                        if let Some(latest) =
                            pipeline::load_labeled_candles(&store, &config.labeled_table, Some(1), true)?
                                .into_iter()
                                .next()
                        {
                            info!(
                                open_time = latest.open_time,
                                close_price_gt_prev = latest.close_price_gt_prev,
                                next_close_price_gt_curr = latest.next_close_price_gt_curr,
                                "most recent labeled candle"
                            );
                        }
                    }
                }
                Err(FeedError::Schema(_)) => {
                    info!(table = %config.labeled_table, "labeled candle table not created yet");
                }
                Err(e) => return Err(e.into()),
            }
        }
        other => {
            anyhow::bail!("unknown command: {other} (expected ingest, label, or status)");
        }
    }

    Ok(())
}
