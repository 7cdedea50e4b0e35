//! Namespaced memory store for AI agents.
//!
//! Records are JSON objects addressed by a hierarchical namespace plus a key.
//! Every record lives in memory for reads and is written through to a local
//! SQLite file, so a store reopened on the same file sees the same records.
//!
//! # Modules
//!
//! - [`store`]: the [`Store`] handle, batched operations, filters, namespace
//!   listing and max-pooled similarity search, plus the async [`AsyncStore`]
//! - [`db`]: SQLite connection setup, schema, row encoding and health checks
//! - [`embedding`]: the [`EmbeddingProvider`] seam and field-path text extraction
//! - [`config`]: configuration loading from TOML files and environment variables
//! - [`error`]: the crate's error type

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod store;

pub use embedding::{EmbeddingProvider, IndexConfig};
pub use error::{Result, StoreError};
pub use store::asynchronous::AsyncStore;
pub use store::types::{
    namespace, GetOp, Indexing, Item, ListNamespacesOp, MatchCondition, Namespace,
    NamespaceMatchType, Op, OpResult, PutOp, SearchItem, SearchOp,
};
pub use store::Store;
