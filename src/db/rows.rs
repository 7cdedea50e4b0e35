//! Row codec and write-through for the store tables.
//!
//! Loading is lenient: a row that can't be decoded is logged and skipped so one
//! corrupt record doesn't hide every other one. Writing is strict: any engine
//! or encoding failure is returned to the caller.

use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::store::index::ItemVectors;
use crate::store::types::{Item, Namespace, NAMESPACE_SEPARATOR};

const ZSTD_LEVEL: i32 = 3;

/// Everything read back from disk at open.
#[derive(Debug, Default)]
pub struct LoadedRows {
    pub items: Vec<Item>,
    pub vectors: Vec<StoredVector>,
    /// Item and vector rows dropped because they could not be decoded.
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredVector {
    pub namespace: Namespace,
    pub key: String,
    pub field: String,
    pub embedding: Vec<f32>,
}

#[derive(Serialize)]
struct BlobRef<'a> {
    namespace: &'a [String],
    key: &'a str,
    value: &'a Map<String, Value>,
}

#[derive(Deserialize)]
struct Blob {
    namespace: Namespace,
    key: String,
    value: Map<String, Value>,
}

pub fn join_namespace(namespace: &[String]) -> String {
    namespace.join(&NAMESPACE_SEPARATOR.to_string())
}

pub fn split_namespace(joined: &str) -> Namespace {
    joined.split(NAMESPACE_SEPARATOR).map(str::to_string).collect()
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

fn parse_timestamp(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("bad timestamp {s:?}: {e}"))
}

/// Serialize `{namespace, key, value}` and compress it.
pub fn encode_value(
    namespace: &[String],
    key: &str,
    value: &Map<String, Value>,
) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(&BlobRef {
        namespace,
        key,
        value,
    })?;
    Ok(zstd::encode_all(json.as_slice(), ZSTD_LEVEL)?)
}

fn decode_value(bytes: &[u8]) -> std::result::Result<Blob, String> {
    let json = zstd::decode_all(bytes).map_err(|e| format!("decompression failed: {e}"))?;
    serde_json::from_slice(&json).map_err(|e| format!("invalid JSON document: {e}"))
}

pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

pub fn decode_vector(bytes: &[u8]) -> std::result::Result<Vec<f32>, String> {
    if bytes.len() % 4 != 0 {
        return Err(format!("embedding length {} is not a multiple of 4", bytes.len()));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn as_text(value: &SqlValue) -> std::result::Result<&str, String> {
    match value {
        SqlValue::Text(s) => Ok(s.as_str()),
        other => Err(format!("expected text, found {:?}", other.data_type())),
    }
}

fn as_bytes(value: &SqlValue) -> std::result::Result<&[u8], String> {
    match value {
        SqlValue::Blob(b) => Ok(b.as_slice()),
        SqlValue::Text(s) => Ok(s.as_bytes()),
        other => Err(format!("expected blob, found {:?}", other.data_type())),
    }
}

/// Raw column values; decoding happens outside rusqlite so a bad row can be
/// skipped instead of failing the whole query.
struct RawItemRow {
    namespace: SqlValue,
    key: SqlValue,
    value: SqlValue,
    created_at: SqlValue,
    updated_at: SqlValue,
}

fn decode_item_row(row: &RawItemRow) -> std::result::Result<Item, String> {
    let ns_column = as_text(&row.namespace)?;
    let key_column = as_text(&row.key)?;
    let blob = decode_value(as_bytes(&row.value)?)?;

    if join_namespace(&blob.namespace) != ns_column || blob.key != key_column {
        return Err(format!(
            "document identity {:?}/{} does not match row",
            blob.namespace, blob.key
        ));
    }

    Ok(Item {
        namespace: blob.namespace,
        key: blob.key,
        value: blob.value,
        created_at: parse_timestamp(as_text(&row.created_at)?)?,
        updated_at: parse_timestamp(as_text(&row.updated_at)?)?,
    })
}

/// Read every item and vector row.
pub fn load_all(conn: &Connection) -> Result<LoadedRows> {
    let mut loaded = LoadedRows::default();

    let mut stmt = conn.prepare(
        "SELECT namespace, key, value, created_at, updated_at FROM store_items \
         ORDER BY namespace, key",
    )?;
    let raw_items = stmt
        .query_map([], |row| {
            Ok(RawItemRow {
                namespace: row.get(0)?,
                key: row.get(1)?,
                value: row.get(2)?,
                created_at: row.get(3)?,
                updated_at: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for raw in &raw_items {
        match decode_item_row(raw) {
            Ok(item) => loaded.items.push(item),
            Err(reason) => {
                tracing::warn!(
                    namespace = ?raw.namespace,
                    key = ?raw.key,
                    %reason,
                    "skipping undecodable store row"
                );
                loaded.skipped += 1;
            }
        }
    }

    let mut stmt =
        conn.prepare("SELECT namespace, key, field, embedding FROM store_vectors")?;
    let raw_vectors = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, SqlValue>(0)?,
                row.get::<_, SqlValue>(1)?,
                row.get::<_, SqlValue>(2)?,
                row.get::<_, SqlValue>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for (ns, key, field, embedding) in &raw_vectors {
        let decoded = (|| {
            Ok::<_, String>(StoredVector {
                namespace: split_namespace(as_text(ns)?),
                key: as_text(key)?.to_string(),
                field: as_text(field)?.to_string(),
                embedding: decode_vector(as_bytes(embedding)?)?,
            })
        })();
        match decoded {
            Ok(vector) => loaded.vectors.push(vector),
            Err(reason) => {
                tracing::warn!(
                    namespace = ?ns,
                    key = ?key,
                    %reason,
                    "skipping undecodable vector row"
                );
                loaded.skipped += 1;
            }
        }
    }

    Ok(loaded)
}

/// Upsert one item. The caller supplies `created_at`; the store carries it
/// over from the previous value.
pub fn write_through(conn: &Connection, item: &Item) -> Result<()> {
    let blob = encode_value(&item.namespace, &item.key, &item.value)?;
    conn.execute(
        "INSERT INTO store_items (namespace, key, value, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5) \
         ON CONFLICT(namespace, key) DO UPDATE SET \
         value = excluded.value, created_at = excluded.created_at, \
         updated_at = excluded.updated_at",
        params![
            join_namespace(&item.namespace),
            item.key,
            blob,
            format_timestamp(&item.created_at),
            format_timestamp(&item.updated_at),
        ],
    )?;
    Ok(())
}

/// Replace all vector rows for one item.
pub fn replace_vectors(
    conn: &Connection,
    namespace: &[String],
    key: &str,
    vectors: &ItemVectors,
) -> Result<()> {
    let ns = join_namespace(namespace);
    conn.execute(
        "DELETE FROM store_vectors WHERE namespace = ?1 AND key = ?2",
        params![ns, key],
    )?;

    let mut stmt = conn.prepare_cached(
        "INSERT INTO store_vectors (namespace, key, field, embedding) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (field, vector) in vectors {
        stmt.execute(params![ns, key, field, encode_vector(vector)])?;
    }
    Ok(())
}

/// Delete one item and its vectors. Deleting a missing item is not an error.
pub fn delete_item(conn: &Connection, namespace: &[String], key: &str) -> Result<()> {
    let ns = join_namespace(namespace);
    conn.execute(
        "DELETE FROM store_items WHERE namespace = ?1 AND key = ?2",
        params![ns, key],
    )?;
    conn.execute(
        "DELETE FROM store_vectors WHERE namespace = ?1 AND key = ?2",
        params![ns, key],
    )?;
    Ok(())
}
