use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use duckdb::Connection;
use tokio::sync::Mutex;
use tracing::info;

use shoplytics_core::event::NewTrackEvent;
use shoplytics_core::event_types::EventTypes;

use crate::schema::{init_sql, MIGRATIONS_TABLE_SQL};

const SCHEMA_VERSION: &str = "0001_init";
const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Render a UTC timestamp the way it is bound into DuckDB `TIMESTAMP` params.
pub(crate) fn format_ts(ts: NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

/// Parse `CAST(created_at AS VARCHAR)` output (fractional seconds optional).
pub(crate) fn parse_ts(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TS_FORMAT)
        .with_context(|| format!("unparseable timestamp '{raw}'"))
}

/// A DuckDB backend for Shoplytics.
///
/// DuckDB is single-writer. The connection sits behind `Arc<Mutex<_>>` and
/// every operation holds the lock for its whole transaction, which is what
/// makes session upsert atomic under concurrent identical requests.
///
/// Memory and thread limits are enforced by [`init_sql`] at open time.
pub struct DuckDbBackend {
    pub(crate) conn: Arc<Mutex<Connection>>,
    pub(crate) event_types: Arc<EventTypes>,
}

impl DuckDbBackend {
    /// Open (or create) a DuckDB database file at `path`.
    ///
    /// `memory_limit` is a DuckDB size string such as `"1GB"` or `"512MB"`.
    pub fn open(path: &str, memory_limit: &str, event_types: EventTypes) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(&conn, memory_limit)?;
        info!(
            "DuckDB opened at {} with memory_limit={}, threads=2",
            path, memory_limit
        );
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            event_types: Arc::new(event_types),
        })
    }

    /// Open an **in-memory** DuckDB database with the default type table.
    ///
    /// Intended for tests only. Data is discarded when the struct is dropped.
    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with(EventTypes::default())
    }

    pub fn open_in_memory_with(event_types: EventTypes) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn, "1GB")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            event_types: Arc::new(event_types),
        })
    }

    fn init(conn: &Connection, memory_limit: &str) -> Result<()> {
        conn.execute_batch(MIGRATIONS_TABLE_SQL)?;
        conn.execute_batch(&init_sql(memory_limit))?;
        conn.execute(
            "INSERT OR IGNORE INTO _migrations (id) VALUES (?1)",
            duckdb::params![SCHEMA_VERSION],
        )?;
        Ok(())
    }

    pub fn event_types(&self) -> &EventTypes {
        &self.event_types
    }

    /// Execute `SELECT 1` as a lightweight liveness check for `/health`.
    pub async fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch("SELECT 1")?;
        Ok(())
    }

    /// Acquire the DuckDB connection lock for direct queries.
    ///
    /// Intended for integration tests that seed aggregate tables or verify
    /// stored rows. Production code should use the typed methods.
    pub async fn conn_for_test(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }

    /// Record an event as if it arrived at `now`, running the same
    /// derivation rules as `TrackingBackend::record_event`.
    pub async fn record_event_at(&self, event: NewTrackEvent, now: NaiveDateTime) -> Result<i64> {
        crate::derivation::record_event_inner(self, event, now).await
    }

    /// Resolve a named type code, failing loudly when the table lacks it.
    pub(crate) fn require_type(&self, name: &str) -> Result<i32> {
        self.event_types
            .code(name)
            .with_context(|| format!("event type '{name}' is not configured"))
    }
}
