//! Materialized copy of every persisted record.
//!
//! Items are kept as `namespace -> key -> Item` and vectors as
//! `namespace -> key -> field path -> vector`. Both use ordered maps so prefix
//! scans and unscored pagination are deterministic.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::store::query::has_prefix;
use crate::store::types::{Item, Namespace};

/// Field path → embedding for one item.
pub type ItemVectors = BTreeMap<String, Vec<f32>>;

#[derive(Debug, Default)]
pub struct Index {
    items: BTreeMap<Namespace, BTreeMap<String, Item>>,
    vectors: BTreeMap<Namespace, BTreeMap<String, ItemVectors>>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, namespace: &[String], key: &str) -> Option<&Item> {
        self.items.get(namespace)?.get(key)
    }

    pub fn vectors(&self, namespace: &[String], key: &str) -> Option<&ItemVectors> {
        self.vectors.get(namespace)?.get(key)
    }

    /// Insert or overwrite an item. The key's vectors are replaced wholesale.
    pub fn upsert(&mut self, item: Item, vectors: ItemVectors) {
        let ns_vectors = self.vectors.entry(item.namespace.clone()).or_default();
        if vectors.is_empty() {
            ns_vectors.remove(&item.key);
            if ns_vectors.is_empty() {
                self.vectors.remove(&item.namespace);
            }
        } else {
            ns_vectors.insert(item.key.clone(), vectors);
        }

        self.items
            .entry(item.namespace.clone())
            .or_default()
            .insert(item.key.clone(), item);
    }

    /// Attach vectors to an existing item, used while rebuilding from disk.
    pub(crate) fn insert_vector(
        &mut self,
        namespace: &[String],
        key: &str,
        field: String,
        vector: Vec<f32>,
    ) -> bool {
        if self.get(namespace, key).is_none() {
            return false;
        }
        self.vectors
            .entry(namespace.to_vec())
            .or_default()
            .entry(key.to_string())
            .or_default()
            .insert(field, vector);
        true
    }

    /// Remove an item and its vectors. Empty namespaces are pruned.
    pub fn remove(&mut self, namespace: &[String], key: &str) -> Option<Item> {
        if let Some(ns_vectors) = self.vectors.get_mut(namespace) {
            ns_vectors.remove(key);
            if ns_vectors.is_empty() {
                self.vectors.remove(namespace);
            }
        }

        let ns_items = self.items.get_mut(namespace)?;
        let removed = ns_items.remove(key);
        if ns_items.is_empty() {
            self.items.remove(namespace);
        }
        removed
    }

    /// Every item whose namespace starts with `prefix`.
    pub fn iter_prefix<'a>(&'a self, prefix: &[String]) -> impl Iterator<Item = &'a Item> + 'a {
        // Namespaces sharing a prefix are contiguous in the map, starting at
        // the prefix itself.
        let owned: Namespace = prefix.to_vec();
        self.items
            .range::<[String], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(ns, _)| has_prefix(ns, &owned))
            .flat_map(|(_, keys)| keys.values())
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &Namespace> {
        self.items.keys()
    }

    pub fn len(&self) -> usize {
        self.items.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
