//! Async front-end over [`Store`].
//!
//! Store calls do blocking SQLite I/O and may run an embedding provider, so
//! each one moves onto tokio's blocking pool with a clone of the shared handle.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};

use crate::error::{Result, StoreError};
use crate::store::types::{Item, ListNamespacesOp, Namespace, Op, OpResult, SearchItem, SearchOp};
use crate::store::Store;

#[derive(Clone)]
pub struct AsyncStore {
    inner: Arc<Mutex<Store>>,
}

impl AsyncStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let store = tokio::task::spawn_blocking(move || Store::open(path))
            .await
            .map_err(|e| StoreError::Task(format!("open task failed: {e}")))??;
        Ok(Self::from_store(store))
    }

    pub fn from_store(store: Store) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Store) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut store = inner
                .lock()
                .map_err(|e| StoreError::Task(format!("store lock poisoned: {e}")))?;
            f(&mut *store)
        })
        .await
        .map_err(|e| StoreError::Task(format!("store task failed: {e}")))?
    }

    pub async fn batch(&self, ops: Vec<Op>) -> Result<Vec<OpResult>> {
        self.run(move |store| store.batch(ops)).await
    }

    pub async fn get(&self, namespace: Namespace, key: impl Into<String>) -> Result<Option<Item>> {
        let key = key.into();
        self.run(move |store| Ok(store.get(&namespace, &key))).await
    }

    pub async fn put(
        &self,
        namespace: Namespace,
        key: impl Into<String>,
        value: Map<String, Value>,
    ) -> Result<()> {
        let key = key.into();
        self.run(move |store| store.put(namespace, key, value)).await
    }

    pub async fn delete(&self, namespace: Namespace, key: impl Into<String>) -> Result<()> {
        let key = key.into();
        self.run(move |store| store.delete(namespace, key)).await
    }

    pub async fn search(&self, op: SearchOp) -> Result<Vec<SearchItem>> {
        self.run(move |store| store.search(op)).await
    }

    pub async fn list_namespaces(&self, op: ListNamespacesOp) -> Result<Vec<Namespace>> {
        self.run(move |store| Ok(store.list_namespaces(&op))).await
    }
}
