//! SQLite-backed review store.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tracing::{debug, info};
use uuid::Uuid;

use pulse_analytics::{
    AnalyticsError, Classification, Dimension, Filter, GroupStat, NewRecord, Record, RecordStore,
    RecordWriter,
};

use crate::error::StoreError;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS reviews (
        id TEXT PRIMARY KEY,
        rating INTEGER NOT NULL,
        feedback TEXT NOT NULL,
        website TEXT NOT NULL DEFAULT '',
        product TEXT NOT NULL DEFAULT '',
        classification TEXT NOT NULL DEFAULT 'other',
        ai_summary TEXT NOT NULL DEFAULT '',
        ai_suggestions TEXT NOT NULL DEFAULT '[]',
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_reviews_created_at ON reviews(created_at);
    CREATE INDEX IF NOT EXISTS idx_reviews_website ON reviews(website);
    CREATE INDEX IF NOT EXISTS idx_reviews_product ON reviews(product);
    CREATE INDEX IF NOT EXISTS idx_reviews_classification ON reviews(classification);
";

/// Columns added after the first release. Adding one that already exists
/// fails and is ignored.
const ADDED_COLUMNS: [&str; 2] = [
    "ALTER TABLE reviews ADD COLUMN ai_summary TEXT NOT NULL DEFAULT ''",
    "ALTER TABLE reviews ADD COLUMN ai_suggestions TEXT NOT NULL DEFAULT '[]'",
];

const RECORD_COLUMNS: &str =
    "id, rating, feedback, website, product, classification, ai_summary, ai_suggestions, created_at";

/// Timestamps are stored as fixed-width RFC 3339 UTC text, so text order is
/// chronological order and `MAX(created_at)` is the newest record.
fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidRow(format!("bad timestamp '{}': {}", raw, e)))
}

/// Raw column values of one `reviews` row.
struct ReviewRow {
    id: String,
    rating: i64,
    feedback: String,
    website: String,
    product: String,
    classification: String,
    ai_summary: String,
    ai_suggestions: String,
    created_at: String,
}

impl ReviewRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            rating: row.get(1)?,
            feedback: row.get(2)?,
            website: row.get(3)?,
            product: row.get(4)?,
            classification: row.get(5)?,
            ai_summary: row.get(6)?,
            ai_suggestions: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn into_record(self) -> Result<Record, StoreError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| StoreError::InvalidRow(format!("bad id '{}': {}", self.id, e)))?;
        let rating = u8::try_from(self.rating)
            .map_err(|_| StoreError::InvalidRow(format!("rating out of range: {}", self.rating)))?;
        let ai_suggestions: Vec<String> = serde_json::from_str(&self.ai_suggestions)
            .map_err(|e| StoreError::InvalidRow(format!("bad suggestions: {}", e)))?;
        Ok(Record {
            id,
            rating,
            feedback: self.feedback,
            website: self.website,
            product: self.product,
            classification: Classification::from_label(Some(&self.classification)),
            ai_summary: self.ai_summary,
            ai_suggestions,
            created_at: decode_timestamp(&self.created_at)?,
        })
    }
}

/// Predicate selecting `other` rows: the label itself plus any label the
/// read path folds into it.
fn other_label_clause() -> String {
    let known: Vec<String> = Classification::ALL
        .iter()
        .filter(|c| **c != Classification::Other)
        .map(|c| format!("'{}'", c.as_str()))
        .collect();
    format!("classification NOT IN ({})", known.join(", "))
}

/// `WHERE` clause and positional parameters for a filter.
///
/// Column names come from [`Filter::constraints`] keys, never from user input.
fn where_clause(filter: &Filter) -> (String, Vec<String>) {
    let constraints = filter.constraints();
    if constraints.is_empty() {
        return (String::new(), Vec::new());
    }
    let mut clauses = Vec::with_capacity(constraints.len());
    let mut values = Vec::with_capacity(constraints.len());
    for (column, value) in constraints {
        if column == Dimension::Classification.as_str() && value == Classification::Other.as_str() {
            clauses.push(other_label_clause());
            continue;
        }
        values.push(value.to_string());
        clauses.push(format!("{} = ?{}", column, values.len()));
    }
    (format!(" WHERE {}", clauses.join(" AND ")), values)
}

fn query_records(
    conn: &Connection,
    filter: &Filter,
    limit: Option<usize>,
) -> Result<Vec<Record>, StoreError> {
    let (clause, values) = where_clause(filter);
    let mut sql = format!(
        "SELECT {} FROM reviews{} ORDER BY created_at DESC",
        RECORD_COLUMNS, clause
    );
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), ReviewRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(ReviewRow::into_record).collect()
}

/// Review store persisted in a SQLite database.
///
/// The single connection sits behind a mutex; every query runs on the
/// blocking thread pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database at `path` and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;

        // WAL lets readers proceed while a write is in flight
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.execute_batch(SCHEMA)?;
        for ddl in ADDED_COLUMNS {
            let _ = conn.execute(ddl, []);
        }

        info!(path = %path.display(), "review database initialized");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Delete every review. Returns the number of rows removed.
    pub async fn clear(&self) -> Result<u64, StoreError> {
        let removed = self
            .run(|conn| Ok(conn.execute("DELETE FROM reviews", [])?))
            .await?;
        info!(removed, "review table cleared");
        Ok(removed as u64)
    }

    /// Fetch one review by id.
    pub async fn get(&self, id: Uuid) -> Result<Option<Record>, StoreError> {
        self.run(move |conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {} FROM reviews WHERE id = ?1", RECORD_COLUMNS),
                    params![id.to_string()],
                    ReviewRow::from_row,
                )
                .optional()?;
            row.map(ReviewRow::into_record).transpose()
        })
        .await
    }

    /// Check that the database answers a trivial query.
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.run(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn count(&self, filter: &Filter) -> Result<u64, AnalyticsError> {
        let filter = filter.clone();
        let count = self
            .run(move |conn| {
                let (clause, values) = where_clause(&filter);
                let sql = format!("SELECT COUNT(*) FROM reviews{}", clause);
                let count: i64 =
                    conn.query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn aggregate_average(&self, filter: &Filter) -> Result<Option<f64>, AnalyticsError> {
        let filter = filter.clone();
        let avg = self
            .run(move |conn| {
                let (clause, values) = where_clause(&filter);
                let sql = format!("SELECT AVG(rating) FROM reviews{}", clause);
                let avg: Option<f64> =
                    conn.query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;
                Ok(avg)
            })
            .await?;
        Ok(avg)
    }

    async fn group_by(
        &self,
        dimension: Dimension,
        filter: &Filter,
    ) -> Result<Vec<GroupStat>, AnalyticsError> {
        let filter = filter.clone();
        let groups = self
            .run(move |conn| {
                let (clause, values) = where_clause(&filter);
                let column = dimension.as_str();
                let sql = format!(
                    "SELECT {col}, COUNT(*), AVG(rating) FROM reviews{clause} GROUP BY {col}",
                    col = column,
                    clause = clause
                );
                let mut stmt = conn.prepare(&sql)?;
                let groups = stmt
                    .query_map(params_from_iter(values.iter()), |row| {
                        Ok(GroupStat {
                            key: row.get(0)?,
                            count: row.get::<_, i64>(1)?.max(0) as u64,
                            avg_rating: row.get(2)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(groups)
            })
            .await?;
        Ok(groups)
    }

    async fn latest(&self, filter: &Filter, limit: usize) -> Result<Vec<Record>, AnalyticsError> {
        let filter = filter.clone();
        Ok(self
            .run(move |conn| query_records(conn, &filter, Some(limit)))
            .await?)
    }

    async fn latest_timestamp_overall(&self) -> Result<Option<DateTime<Utc>>, AnalyticsError> {
        let raw = self
            .run(|conn| {
                let raw: Option<String> =
                    conn.query_row("SELECT MAX(created_at) FROM reviews", [], |row| row.get(0))?;
                Ok(raw)
            })
            .await?;
        Ok(raw.as_deref().map(decode_timestamp).transpose()?)
    }

    async fn list_all(&self) -> Result<Vec<Record>, AnalyticsError> {
        Ok(self
            .run(|conn| query_records(conn, &Filter::all(), None))
            .await?)
    }
}

#[async_trait]
impl RecordWriter for SqliteStore {
    async fn insert(&self, record: NewRecord) -> Result<Record, AnalyticsError> {
        let record = record.into_record();
        let row = record.clone();
        self.run(move |conn| {
            let suggestions = serde_json::to_string(&row.ai_suggestions)
                .map_err(|e| StoreError::InvalidRow(format!("bad suggestions: {}", e)))?;
            conn.execute(
                "INSERT INTO reviews
                 (id, rating, feedback, website, product, classification,
                  ai_summary, ai_suggestions, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    row.id.to_string(),
                    row.rating,
                    row.feedback,
                    row.website,
                    row.product,
                    row.classification.as_str(),
                    row.ai_summary,
                    suggestions,
                    encode_timestamp(&row.created_at),
                ],
            )?;
            Ok(())
        })
        .await?;
        debug!(id = %record.id, "review inserted");
        Ok(record)
    }
}
