// =============================================================================
// FeatureStore: keyed table persistence over embedded SQLite
// =============================================================================
//
// Schema-flexible upsert/read store for uniform record sequences. Each record
// type declares its column list statically via `TableRecord`; the first column
// is the primary key, the upsert conflict key, and the default sort order.
//
// Identifier safety: table and column names are used structurally in generated
// SQL, so they must pass the allow-list check (alphanumeric plus underscore)
// before any statement text is assembled. All row values are bound through
// placeholders, never interpolated.
//
// The store is exclusively owned by one process instance; writes take
// `&mut self` and there is no multi-writer consistency guarantee.
// =============================================================================

use std::collections::HashSet;
use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, ErrorCode, Row};
use tracing::{debug, info};

use crate::error::{FeedError, Result};

/// Binds a record type to its table schema.
///
/// `COLUMNS` and `TYPES` are parallel; `COLUMNS[0]` is the primary key.
pub trait TableRecord: Sized {
    /// Column names in declaration order. The first column is the primary key.
    const COLUMNS: &'static [&'static str];
    /// SQLite type tags parallel to `COLUMNS`.
    const TYPES: &'static [&'static str];

    /// Value of the primary-key column, used for ordering and for the
    /// new-key count in [`FeatureStore::upsert`].
    fn sort_key(&self) -> i64;

    /// Column values in declaration order, ready for parameter binding.
    fn to_params(&self) -> Vec<Value>;

    /// Rebuild a record from a row selected with `COLUMNS` in order.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// SQLite-backed store for candle feature tables.
pub struct FeatureStore {
    conn: Connection,
}

impl FeatureStore {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Open (or create) the store file at `path`, creating parent directories
    /// on demand.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    FeedError::StorageUnavailable(format!(
                        "failed to create store directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let conn = Connection::open(path).map_err(storage_error)?;
        // Best-effort tuning; the store also works without WAL.
        let _ = conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;");

        debug!(path = %path.display(), "feature store opened");
        Ok(Self { conn })
    }

    /// Open a transient in-memory store.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_error)?;
        Ok(Self { conn })
    }

    // -------------------------------------------------------------------------
    // Schema management
    // -------------------------------------------------------------------------

    /// Create `table` for record type `R` if it does not exist yet.
    ///
    /// Idempotent and additive only: safe to call before every write. Fails
    /// with `Schema` when a pre-existing table disagrees with `R`'s declared
    /// primary key or lacks one of its declared columns; existing data is
    /// never silently dropped or altered.
    pub fn ensure_schema<R: TableRecord>(&self, table: &str) -> Result<()> {
        let table = validated_identifier(table)?;

        let mut column_defs = Vec::with_capacity(R::COLUMNS.len());
        for (i, (name, dtype)) in R::COLUMNS.iter().zip(R::TYPES).enumerate() {
            let name = validated_identifier(name)?;
            if i == 0 {
                column_defs.push(format!("{name} {dtype} PRIMARY KEY"));
            } else {
                column_defs.push(format!("{name} {dtype}"));
            }
        }
        let create = format!(
            "CREATE TABLE IF NOT EXISTS {table} ({})",
            column_defs.join(", ")
        );
        self.conn.execute(&create, []).map_err(storage_error)?;

        // The create above is a no-op on an existing table, so inspect the
        // actual schema and reject any conflict with the declaration.
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .map_err(storage_error)?;
        let existing: Vec<(String, i64)> = stmt
            .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, i64>(5)?)))
            .map_err(storage_error)?
            .collect::<rusqlite::Result<_>>()
            .map_err(storage_error)?;

        let pk_columns: Vec<&str> = existing
            .iter()
            .filter(|(_, pk)| *pk > 0)
            .map(|(name, _)| name.as_str())
            .collect();
        if pk_columns != [R::COLUMNS[0]] {
            return Err(FeedError::Schema(format!(
                "table {table} has primary key {pk_columns:?}, declared {:?}",
                R::COLUMNS[0]
            )));
        }
        for declared in R::COLUMNS {
            if !existing.iter().any(|(name, _)| name == declared) {
                return Err(FeedError::Schema(format!(
                    "table {table} is missing declared column {declared}"
                )));
            }
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    /// Insert-or-replace `items` into `table`, keyed by the first column.
    ///
    /// Items are written in ascending key order (stable sort, ties keep input
    /// order). Rows whose key already exists are fully overwritten. The whole
    /// write happens inside one transaction: either every supplied row lands
    /// or none does.
    ///
    /// # Returns
    /// The number of supplied items whose key was NOT present in the table
    /// before this call. Re-upserting N already-stored rows returns 0 even
    /// though N rows were physically rewritten.
    pub fn upsert<R: TableRecord>(&mut self, table: &str, items: &[R]) -> Result<usize> {
        let table = validated_identifier(table)?;

        let mut ordered: Vec<&R> = items.iter().collect();
        ordered.sort_by_key(|r| r.sort_key());
        if ordered.is_empty() {
            info!(table, "no rows supplied for upsert");
            return Ok(0);
        }

        self.ensure_schema::<R>(table)?;

        let keys: Vec<i64> = ordered.iter().map(|r| r.sort_key()).collect();
        // Measured before the write: the return value is the count of keys
        // that were new at call start, not the count of rows written.
        let existing = self.fetch_existing_keys(table, R::COLUMNS[0], &keys)?;

        let placeholders = vec!["?"; R::COLUMNS.len()].join(", ");
        let insert = format!(
            "INSERT OR REPLACE INTO {table} ({}) VALUES ({placeholders})",
            R::COLUMNS.join(", ")
        );

        let tx = self.conn.transaction().map_err(storage_error)?;
        {
            let mut stmt = tx.prepare(&insert).map_err(storage_error)?;
            for item in &ordered {
                stmt.execute(params_from_iter(item.to_params()))
                    .map_err(storage_error)?;
            }
        }
        tx.commit().map_err(storage_error)?;

        let new_rows = keys.iter().filter(|k| !existing.contains(*k)).count();
        info!(table, new_rows, written = ordered.len(), "rows stored");
        Ok(new_rows)
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Return rows of `table` ordered by `order_by` (default: the primary-key
    /// column), ascending unless `order_desc`, optionally capped to `limit`.
    pub fn fetch_rows<R: TableRecord>(
        &self,
        table: &str,
        limit: Option<usize>,
        order_by: Option<&str>,
        order_desc: bool,
    ) -> Result<Vec<R>> {
        let table = validated_identifier(table)?;
        for name in R::COLUMNS {
            validated_identifier(name)?;
        }
        let order_column = validated_identifier(order_by.unwrap_or(R::COLUMNS[0]))?;
        let order_clause = if order_desc { "DESC" } else { "ASC" };

        let mut query = format!(
            "SELECT {} FROM {table} ORDER BY {order_column} {order_clause}",
            R::COLUMNS.join(", ")
        );
        let mut params: Vec<i64> = Vec::new();
        if let Some(limit) = limit {
            if limit == 0 {
                return Err(FeedError::Validation(
                    "limit must be positive when provided".to_string(),
                ));
            }
            query.push_str(" LIMIT ?");
            params.push(limit as i64);
        }

        let mut stmt = self.conn.prepare(&query).map_err(storage_error)?;
        let rows = stmt
            .query_map(params_from_iter(params), R::from_row)
            .map_err(storage_error)?
            .collect::<rusqlite::Result<Vec<R>>>()
            .map_err(storage_error)?;
        Ok(rows)
    }

    /// Total number of rows stored in `table`.
    pub fn count_rows(&self, table: &str) -> Result<u64> {
        let table = validated_identifier(table)?;
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })
            .map_err(storage_error)?;
        Ok(count as u64)
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    /// Which of `keys` already exist in `table`.
    fn fetch_existing_keys(
        &self,
        table: &str,
        key_column: &str,
        keys: &[i64],
    ) -> Result<HashSet<i64>> {
        if keys.is_empty() {
            return Ok(HashSet::new());
        }
        let placeholders = vec!["?"; keys.len()].join(", ");
        let query = format!("SELECT {key_column} FROM {table} WHERE {key_column} IN ({placeholders})");
        let mut stmt = self.conn.prepare(&query).map_err(storage_error)?;
        let found = stmt
            .query_map(params_from_iter(keys.iter()), |row| row.get::<_, i64>(0))
            .map_err(storage_error)?
            .collect::<rusqlite::Result<HashSet<i64>>>()
            .map_err(storage_error)?;
        Ok(found)
    }
}

/// Allow-list check for identifiers that end up in generated SQL text:
/// alphanumeric plus underscore, non-empty after stripping underscores.
fn validated_identifier(identifier: &str) -> Result<&str> {
    let cleaned: String = identifier.chars().filter(|c| *c != '_').collect();
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(FeedError::Validation(format!(
            "invalid identifier: {identifier}"
        )));
    }
    Ok(identifier)
}

/// Classify a rusqlite failure: connection-level problems are transient
/// (`StorageUnavailable`), statement/shape problems are `Schema`.
fn storage_error(err: rusqlite::Error) -> FeedError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) => match e.code {
            ErrorCode::CannotOpen
            | ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::SystemIoFailure
            | ErrorCode::DiskFull
            | ErrorCode::PermissionDenied
            | ErrorCode::NotADatabase => FeedError::StorageUnavailable(err.to_string()),
            _ => FeedError::Schema(err.to_string()),
        },
        _ => FeedError::Schema(err.to_string()),
    }
}
