#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use agent_memstore::db::rows::LoadedRows;
use agent_memstore::store::persist::{PendingWrite, Persistence, SqlitePersistence};
use agent_memstore::{EmbeddingProvider, IndexConfig, Store};
use serde_json::{Map, Value};
use tempfile::TempDir;

/// A temp directory plus a store path inside a not-yet-created subdirectory.
pub fn temp_db() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("data").join("store.db");
    (tmp, path)
}

/// Unwrap a `json!` literal that must be an object.
pub fn obj(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

/// A 2-dim unit vector whose cosine with `[1, 0]` is `cos`.
pub fn at_cos(cos: f32) -> Vec<f32> {
    vec![cos, (1.0 - cos * cos).max(0.0).sqrt()]
}

/// Embeds by table lookup. Unknown texts map to the zero vector.
pub struct StubEmbedder {
    table: HashMap<String, Vec<f32>>,
    pub calls: AtomicUsize,
}

impl StubEmbedder {
    pub fn new<'a>(entries: impl IntoIterator<Item = (&'a str, Vec<f32>)>) -> Self {
        Self {
            table: entries
                .into_iter()
                .map(|(text, v)| (text.to_string(), v))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl EmbeddingProvider for StubEmbedder {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(self.table.get(text).cloned().unwrap_or_else(|| vec![0.0, 0.0]))
    }

    fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimensions(&self) -> usize {
        2
    }
}

/// In-memory store that embeds `fields` through `embedder`.
pub fn embedded_store(embedder: Arc<StubEmbedder>, fields: &[&str]) -> Store {
    let config = IndexConfig {
        fields: fields.iter().map(|f| f.to_string()).collect(),
    };
    Store::open_in_memory()
        .unwrap()
        .with_embeddings(embedder, config)
}

/// SQLite persistence that records every write it is asked to apply.
pub struct RecordingPersistence {
    inner: SqlitePersistence,
    pub log: Arc<Mutex<Vec<PendingWrite>>>,
}

impl RecordingPersistence {
    pub fn new() -> (Self, Arc<Mutex<Vec<PendingWrite>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let persistence = Self {
            inner: SqlitePersistence::open_in_memory().unwrap(),
            log: Arc::clone(&log),
        };
        (persistence, log)
    }
}

impl Persistence for RecordingPersistence {
    fn load(&self) -> agent_memstore::Result<LoadedRows> {
        self.inner.load()
    }

    fn apply(&mut self, writes: &[PendingWrite]) -> agent_memstore::Result<()> {
        self.log.lock().unwrap().extend(writes.iter().cloned());
        self.inner.apply(writes)
    }
}
