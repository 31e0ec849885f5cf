//! Entity stores: the persistence seam under every repository.
//!
//! A store owns at most one open transaction and a buffer of staged writes.
//! Repositories stage writes; nothing reaches the backing database until
//! `save_changes` or `commit` flushes the buffer as one batch.

mod memory;
mod postgres;
mod record;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

use common::AppResult;

use crate::query::{Filter, QuerySpec};

pub use memory::{InMemoryDatabase, InMemoryStore};
pub use postgres::SeaOrmStore;
pub use record::{Entity, EntityKind, Record};

/// A buffered write
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Insert(Record),
    /// Full-row replace keyed by the record's id
    Update(Record),
    Delete { kind: EntityKind, id: i64 },
}

impl Change {
    pub fn kind(&self) -> EntityKind {
        match self {
            Change::Insert(record) | Change::Update(record) => record.kind(),
            Change::Delete { kind, .. } => *kind,
        }
    }
}

/// Identifies the transaction opened by `begin_transaction`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionHandle {
    id: u64,
}

impl TransactionHandle {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Persistence abstraction shared by the repositories of one unit of work.
///
/// A store instance serves one logical unit of work and is never shared
/// between concurrent units of work.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Open a transaction. Fails with `Conflict` if one is already open.
    async fn begin_transaction(&self) -> AppResult<TransactionHandle>;

    /// Flush staged writes and commit the open transaction.
    ///
    /// On failure the transaction is rolled back before the error returns.
    /// Without an open transaction this only flushes.
    async fn commit(&self) -> AppResult<()>;

    /// Discard staged writes and end the open transaction. No-op if none.
    async fn rollback(&self) -> AppResult<()>;

    fn in_transaction(&self) -> bool;

    /// Buffer a write until the next flush
    fn stage(&self, change: Change);

    fn pending_changes(&self) -> usize;

    /// Apply staged writes in call order as one atomic batch.
    ///
    /// Returns the number of affected rows. A failed batch is discarded.
    async fn save_changes(&self) -> AppResult<u64>;

    /// Rows of `kind` matching `spec`. `spec.include` is left to the caller.
    async fn query(&self, kind: EntityKind, spec: &QuerySpec) -> AppResult<Vec<Record>>;

    async fn count(&self, kind: EntityKind, filter: &Filter) -> AppResult<u64>;

    /// Release any open transaction and staged writes without awaiting.
    ///
    /// Used from `Drop`, where rollback cannot be awaited.
    fn abandon(&self);
}
