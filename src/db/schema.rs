//! SQL DDL for the store tables.
//!
//! `store_items` holds one row per live record; `store_vectors` holds one row
//! per embedded field of a record. All DDL uses `IF NOT EXISTS` for idempotent
//! initialization.

use rusqlite::Connection;

const SCHEMA_SQL: &str = r#"
-- One row per (namespace, key). `value` is a zstd-compressed JSON document
-- {namespace, key, value}; `namespace` is the segments joined with ':'.
CREATE TABLE IF NOT EXISTS store_items (
    namespace TEXT NOT NULL,
    key TEXT NOT NULL,
    value BLOB NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (namespace, key)
);

CREATE INDEX IF NOT EXISTS idx_store_items_namespace ON store_items(namespace);

-- Embeddings, little-endian f32, one row per indexed field path.
CREATE TABLE IF NOT EXISTS store_vectors (
    namespace TEXT NOT NULL,
    key TEXT NOT NULL,
    field TEXT NOT NULL,
    embedding BLOB NOT NULL,
    PRIMARY KEY (namespace, key, field)
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
