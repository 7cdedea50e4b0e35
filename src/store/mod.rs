//! The store: an in-memory index backed by write-through persistence.
//!
//! [`Store::batch`] is the single execution path. Every read in a batch (get,
//! search, list) sees the state from before the batch; puts are deduplicated
//! by `(namespace, key)` with the last one winning, persisted together, and
//! only then applied to the index.

pub mod asynchronous;
pub mod index;
pub mod persist;
pub mod query;
pub mod similarity;
pub mod types;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};

use crate::embedding::{extract_texts, EmbeddingProvider, IndexConfig};
use crate::error::{Result, StoreError};
use index::{Index, ItemVectors};
use persist::{PendingWrite, Persistence, SqlitePersistence};
use query::Filter;
use types::{
    validate_namespace, Indexing, Item, ListNamespacesOp, Namespace, Op, OpResult, PutOp,
    SearchItem, SearchOp,
};

struct PreparedSearch {
    position: usize,
    op: SearchOp,
    filter: Option<Filter>,
}

pub struct Store {
    persistence: Box<dyn Persistence>,
    index: Index,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    index_config: IndexConfig,
}

impl Store {
    /// Open (or create) a store file and load every record into memory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_persistence(Box::new(SqlitePersistence::open(path)?))
    }

    /// A store backed by an in-memory SQLite database.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_persistence(Box::new(SqlitePersistence::open_in_memory()?))
    }

    /// Build the index from whatever `persistence` holds.
    pub fn with_persistence(persistence: Box<dyn Persistence>) -> Result<Self> {
        let loaded = persistence.load()?;
        let mut index = Index::new();

        let item_count = loaded.items.len();
        for item in loaded.items {
            index.upsert(item, ItemVectors::new());
        }

        let mut vector_count = 0usize;
        for v in loaded.vectors {
            if index.insert_vector(&v.namespace, &v.key, v.field, v.embedding) {
                vector_count += 1;
            } else {
                tracing::debug!(namespace = ?v.namespace, key = %v.key, "ignoring vector without item");
            }
        }

        if loaded.skipped > 0 {
            tracing::warn!(skipped = loaded.skipped, "some stored rows could not be decoded");
        }
        tracing::info!(items = item_count, vectors = vector_count, "store loaded");

        Ok(Self {
            persistence,
            index,
            embedder: None,
            index_config: IndexConfig::default(),
        })
    }

    /// Embed values on write and rank searches that carry a query.
    pub fn with_embeddings(mut self, provider: Arc<dyn EmbeddingProvider>, config: IndexConfig) -> Self {
        self.embedder = Some(provider);
        self.index_config = config;
        self
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Execute `ops` and return one result per op, in input order.
    ///
    /// Validation errors (bad filter operator, invalid namespace on a put) fail
    /// the whole batch before anything is written. A storage error while
    /// persisting also leaves the index untouched.
    pub fn batch(&mut self, ops: Vec<Op>) -> Result<Vec<OpResult>> {
        let op_count = ops.len();
        let mut results: Vec<OpResult> = Vec::with_capacity(op_count);
        let mut searches: Vec<PreparedSearch> = Vec::new();
        let mut puts: BTreeMap<(Namespace, String), PutOp> = BTreeMap::new();

        for (position, op) in ops.into_iter().enumerate() {
            match op {
                Op::Get(get) => results.push(OpResult::Item(self.get(&get.namespace, &get.key))),
                Op::ListNamespaces(list) => {
                    results.push(OpResult::Namespaces(self.list_namespaces(&list)))
                }
                Op::Search(search) => {
                    searches.push(prepare_search(position, search)?);
                    results.push(OpResult::Search(Vec::new()));
                }
                Op::Put(put) => {
                    validate_namespace(&put.namespace)?;
                    puts.insert((put.namespace.clone(), put.key.clone()), put);
                    results.push(OpResult::Done);
                }
            }
        }

        let search_count = searches.len();
        for (prepared, items) in searches.iter().zip(self.execute_searches(&searches)?) {
            results[prepared.position] = OpResult::Search(items);
        }

        let write_count = self.apply_puts(puts.into_values().collect())?;

        tracing::debug!(
            ops = op_count,
            searches = search_count,
            writes = write_count,
            "batch executed"
        );
        Ok(results)
    }

    pub fn get(&self, namespace: &[String], key: &str) -> Option<Item> {
        self.index.get(namespace, key).cloned()
    }

    pub fn put(&mut self, namespace: Namespace, key: impl Into<String>, value: Map<String, Value>) -> Result<()> {
        self.batch(vec![Op::Put(PutOp::upsert(namespace, key, value))])?;
        Ok(())
    }

    pub fn put_with_index(
        &mut self,
        namespace: Namespace,
        key: impl Into<String>,
        value: Map<String, Value>,
        index: Indexing,
    ) -> Result<()> {
        let op = PutOp::upsert(namespace, key, value).with_index(index);
        self.batch(vec![Op::Put(op)])?;
        Ok(())
    }

    /// Remove an item. Deleting a missing key is not an error.
    pub fn delete(&mut self, namespace: Namespace, key: impl Into<String>) -> Result<()> {
        self.batch(vec![Op::Put(PutOp::delete(namespace, key))])?;
        Ok(())
    }

    pub fn search(&self, op: SearchOp) -> Result<Vec<SearchItem>> {
        let prepared = [prepare_search(0, op)?];
        Ok(self.execute_searches(&prepared)?.into_iter().next().unwrap_or_default())
    }

    pub fn list_namespaces(&self, op: &ListNamespacesOp) -> Vec<Namespace> {
        query::list_namespaces(self.index.namespaces(), op)
    }

    /// The query text to rank by, if ranking is possible for this search.
    fn ranking_query<'a>(&self, op: &'a SearchOp) -> Option<&'a str> {
        self.embedder.as_ref()?;
        op.query.as_deref().filter(|q| !q.is_empty())
    }

    fn execute_searches(&self, searches: &[PreparedSearch]) -> Result<Vec<Vec<SearchItem>>> {
        let queries: Vec<&str> = searches
            .iter()
            .filter_map(|s| self.ranking_query(&s.op))
            .collect();
        let mut query_embeddings = self.embed_texts(&queries)?.into_iter();

        let results = searches
            .iter()
            .map(|s| {
                let candidates =
                    query::select_candidates(&self.index, &s.op.namespace_prefix, s.filter.as_ref());
                let embedding = self
                    .ranking_query(&s.op)
                    .and_then(|_| query_embeddings.next());
                match embedding {
                    Some(q) => similarity::rank(&self.index, &candidates, &q, s.op.offset, s.op.limit),
                    None => candidates
                        .into_iter()
                        .skip(s.op.offset)
                        .take(s.op.limit)
                        .map(|item| SearchItem::unscored(item.clone()))
                        .collect(),
                }
            })
            .collect();
        Ok(results)
    }

    /// Field paths to embed for a put, or `None` when it stores no vectors.
    fn index_fields<'a>(&'a self, indexing: &'a Indexing) -> Option<&'a [String]> {
        self.embedder.as_ref()?;
        match indexing {
            Indexing::Default => Some(self.index_config.fields.as_slice()),
            Indexing::Disabled => None,
            Indexing::Fields(fields) => Some(fields.as_slice()),
        }
    }

    fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let Some(embedder) = &self.embedder else {
            return Ok(Vec::new());
        };
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = embedder
            .embed_batch(texts)
            .map_err(|e| StoreError::Embedding(e.to_string()))?;
        if vectors.len() != texts.len() {
            return Err(StoreError::Embedding(format!(
                "provider returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }

    /// Embed, persist, then index. Returns the number of writes.
    fn apply_puts(&mut self, puts: Vec<PutOp>) -> Result<usize> {
        if puts.is_empty() {
            return Ok(0);
        }

        let mut texts: Vec<(usize, String, String)> = Vec::new();
        for (i, put) in puts.iter().enumerate() {
            if let (Some(value), Some(fields)) = (&put.value, self.index_fields(&put.index)) {
                for field in fields {
                    for (path, text) in extract_texts(value, field) {
                        texts.push((i, path, text));
                    }
                }
            }
        }
        let text_refs: Vec<&str> = texts.iter().map(|(_, _, t)| t.as_str()).collect();
        let embeddings = self.embed_texts(&text_refs)?;

        let mut vectors: Vec<ItemVectors> = vec![ItemVectors::new(); puts.len()];
        for ((i, path, _), embedding) in texts.into_iter().zip(embeddings) {
            vectors[i].insert(path, embedding);
        }

        let now = Utc::now();
        let writes: Vec<PendingWrite> = puts
            .into_iter()
            .zip(vectors)
            .map(|(put, vectors)| match put.value {
                Some(value) => {
                    let created_at = self
                        .index
                        .get(&put.namespace, &put.key)
                        .map_or(now, |existing| existing.created_at);
                    PendingWrite::Upsert {
                        item: Item {
                            namespace: put.namespace,
                            key: put.key,
                            value,
                            created_at,
                            updated_at: now,
                        },
                        vectors,
                    }
                }
                None => PendingWrite::Delete {
                    namespace: put.namespace,
                    key: put.key,
                },
            })
            .collect();

        self.persistence.apply(&writes)?;

        let count = writes.len();
        for write in writes {
            match write {
                PendingWrite::Upsert { item, vectors } => self.index.upsert(item, vectors),
                PendingWrite::Delete { namespace, key } => {
                    self.index.remove(&namespace, &key);
                }
            }
        }
        Ok(count)
    }
}

fn prepare_search(position: usize, op: SearchOp) -> Result<PreparedSearch> {
    let filter = op.filter.as_ref().map(Filter::compile).transpose()?;
    Ok(PreparedSearch {
        position,
        op,
        filter,
    })
}
