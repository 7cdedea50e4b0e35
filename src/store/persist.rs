//! The boundary between the batcher and the storage engine.
//!
//! [`Store`](crate::store::Store) hands each batch's surviving writes to
//! [`Persistence::apply`] in one call; [`SqlitePersistence`] runs them in one
//! transaction.

use std::path::Path;

use rusqlite::Connection;

use crate::db::{self, rows, rows::LoadedRows};
use crate::error::Result;
use crate::store::index::ItemVectors;
use crate::store::types::{Item, Namespace};

/// One durable mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingWrite {
    Upsert { item: Item, vectors: ItemVectors },
    Delete { namespace: Namespace, key: String },
}

impl PendingWrite {
    pub fn namespace(&self) -> &[String] {
        match self {
            Self::Upsert { item, .. } => &item.namespace,
            Self::Delete { namespace, .. } => namespace,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Upsert { item, .. } => &item.key,
            Self::Delete { key, .. } => key,
        }
    }
}

pub trait Persistence: Send {
    /// Read every persisted record, skipping undecodable rows.
    fn load(&self) -> Result<LoadedRows>;

    /// Durably apply one batch of writes. On error nothing from the batch is
    /// applied.
    fn apply(&mut self, writes: &[PendingWrite]) -> Result<()>;
}

/// SQLite-backed persistence owning its connection.
pub struct SqlitePersistence {
    conn: Connection,
}

impl SqlitePersistence {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            conn: db::open_database(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: db::open_memory_database()?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Persistence for SqlitePersistence {
    fn load(&self) -> Result<LoadedRows> {
        rows::load_all(&self.conn)
    }

    fn apply(&mut self, writes: &[PendingWrite]) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        for write in writes {
            match write {
                PendingWrite::Upsert { item, vectors } => {
                    rows::write_through(&tx, item)?;
                    rows::replace_vectors(&tx, &item.namespace, &item.key, vectors)?;
                }
                PendingWrite::Delete { namespace, key } => {
                    rows::delete_item(&tx, namespace, key)?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}
