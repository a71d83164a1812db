// Persistent store collaborator for progress records
//
// The progression rules live in `progress`; a store only has to provide
// snapshot reads and a per-user atomic unit with conditional writes.

pub mod memory;
#[cfg(feature = "database")]
pub mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "database")]
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::catalog::ModuleId;
use crate::progress::{ProgressRecord, ProgressStatus, UserId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("write conflict on {module_id} for user {user_id}: expected {expected:?}, found {found:?}")]
    Conflict {
        user_id: UserId,
        module_id: ModuleId,
        expected: Option<ProgressStatus>,
        found: Option<ProgressStatus>,
    },
    #[error("store busy: {0}")]
    Busy(String),
    #[error("corrupt progress row: {0}")]
    Corrupt(String),
    #[error("record for user {record_user} written through transaction for user {tx_user}")]
    ForeignRecord { tx_user: UserId, record_user: UserId },
    #[cfg(feature = "database")]
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[cfg(feature = "database")]
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Contention that may succeed if the whole unit is retried
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Busy(_))
    }
}

/// Snapshot reads and atomic units over one user's progress
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Consistent snapshot of every stored record for `user_id`
    async fn load(&self, user_id: &UserId) -> Result<Vec<ProgressRecord>, StoreError>;

    /// Open an atomic unit scoped to `user_id`. Dropping it without
    /// `commit` discards every write made through it.
    async fn begin(&self, user_id: &UserId) -> Result<Box<dyn ProgressTx>, StoreError>;
}

#[async_trait]
pub trait ProgressTx: Send {
    /// Current record for `module_id`, including this unit's own writes
    async fn fetch(&mut self, module_id: &ModuleId) -> Result<Option<ProgressRecord>, StoreError>;

    /// Upsert `record` only if the stored status still equals `expected`
    /// (`None` meaning no row). Fails with `StoreError::Conflict` otherwise.
    async fn write(
        &mut self,
        record: &ProgressRecord,
        expected: Option<ProgressStatus>,
    ) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
