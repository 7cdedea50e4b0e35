pub mod rows;
pub mod schema;

use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{Result, StoreError};

const BUSY_TIMEOUT_MS: u64 = 5000;

/// Serializes journal-mode setup and schema creation across store instances
/// in this process, so two stores opening the same new file don't interleave
/// DDL.
static SCHEMA_INIT_LOCK: Mutex<()> = Mutex::new(());

fn schema_lock() -> Result<MutexGuard<'static, ()>> {
    SCHEMA_INIT_LOCK
        .lock()
        .map_err(|e| StoreError::Task(format!("schema init lock poisoned: {e}")))
}

/// Open (or create) the store database at the given path with the schema
/// initialized. The parent directory is created if missing.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(path)?;

    conn.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))?;
    {
        let _guard = schema_lock()?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        schema::init_schema(&conn)?;
    }

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open an in-memory database, for tests and throwaway stores.
pub fn open_memory_database() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    schema::init_schema(&conn)?;
    Ok(conn)
}

/// Result of [`check_database_health`].
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub integrity_ok: bool,
    pub integrity_details: String,
    pub item_count: i64,
    pub vector_count: i64,
    pub namespace_count: i64,
}

/// Run `PRAGMA integrity_check` and collect row counts.
pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
    let item_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM store_items", [], |row| row.get(0))?;
    let vector_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM store_vectors", [], |row| row.get(0))?;
    let namespace_count: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT namespace) FROM store_items",
        [],
        |row| row.get(0),
    )?;

    Ok(HealthReport {
        integrity_ok: integrity == "ok",
        integrity_details: integrity,
        item_count,
        vector_count,
        namespace_count,
    })
}
