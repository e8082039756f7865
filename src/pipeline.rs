// =============================================================================
// Ingestion and labeling pipelines
// =============================================================================
//
// Each pipeline is one fetch/read, one transform, one upsert. The source and
// the store are owned by the caller and passed in explicitly, so a run never
// touches hidden shared state and tests can substitute either collaborator.
// =============================================================================

use tracing::info;

use crate::error::Result;
use crate::ingest_config::IngestionConfig;
use crate::market_data::{label_candles, Candle, CandleSource, LabeledCandle};
use crate::storage::FeatureStore;

/// One fetch-and-persist cycle.
///
/// Fetches candles per `config`, upserts them into `config.table` keyed by
/// `open_time`, and returns `(new_rows, total_rows)`: the upsert's new-key
/// count and the post-upsert table total. An empty fetch is a valid outcome
/// and yields `(0, total)`.
pub async fn run_ingestion<S: CandleSource>(
    source: &S,
    store: &mut FeatureStore,
    config: &IngestionConfig,
) -> Result<(usize, u64)> {
    info!(
        interval = %config.interval,
        limit = config.limit,
        table = %config.table,
        "running candle ingestion"
    );

    let candles = source
        .fetch_candles(
            &config.interval,
            config.limit,
            config.start_time,
            config.end_time,
        )
        .await?;
    if candles.is_empty() {
        info!(table = %config.table, "fetch returned no candles");
    }

    // Ensure the table exists even for an empty fetch, so the total below is
    // well defined on a fresh store.
    store.ensure_schema::<Candle>(&config.table)?;
    let new_rows = store.upsert(&config.table, &candles)?;
    let total_rows = store.count_rows(&config.table)?;

    info!(new_rows, total_rows, table = %config.table, "candle ingestion complete");
    Ok((new_rows, total_rows))
}

/// Read up to `limit` raw candles ascending by open time, derive labels, and
/// upsert them into `destination_table`. Returns that upsert's new-row count.
///
/// Labels are recomputed wholesale from whatever raw rows currently exist;
/// rerunning after new raw candles arrive refreshes the labeled table.
pub fn run_labeling(
    store: &mut FeatureStore,
    source_table: &str,
    destination_table: &str,
    limit: Option<usize>,
) -> Result<usize> {
    let candles = load_candles(store, source_table, limit, false)?;
    let labeled = label_candles(&candles)?;
    let new_rows = store.upsert(destination_table, &labeled)?;

    info!(
        source = source_table,
        destination = destination_table,
        labeled = labeled.len(),
        new_rows,
        "labeled candles materialized"
    );
    Ok(new_rows)
}

/// Raw candles from `table`, ordered by open time.
pub fn load_candles(
    store: &FeatureStore,
    table: &str,
    limit: Option<usize>,
    order_desc: bool,
) -> Result<Vec<Candle>> {
    store.fetch_rows(table, limit, Some("open_time"), order_desc)
}

/// Labeled candles from `table`, ordered by open time.
pub fn load_labeled_candles(
    store: &FeatureStore,
    table: &str,
    limit: Option<usize>,
    order_desc: bool,
) -> Result<Vec<LabeledCandle>> {
    store.fetch_rows(table, limit, Some("open_time"), order_desc)
}
