// In-process progress store
//
// Each user's records sit behind their own async mutex. A transaction holds
// that mutex until it commits or is dropped, so units for the same user are
// serialized while different users never contend. A slot is released once
// the last transaction on it ends with no records stored.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::{ProgressStore, ProgressTx, StoreError};
use crate::catalog::ModuleId;
use crate::progress::{ProgressRecord, ProgressStatus, UserId};

type UserRecords = BTreeMap<ModuleId, ProgressRecord>;
type Slots = Mutex<HashMap<UserId, Arc<AsyncMutex<UserRecords>>>>;

#[derive(Debug, Default)]
pub struct MemoryStore {
    users: Arc<Slots>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write records verbatim, bypassing every progression rule.
    /// Used to load fixtures or reproduce damaged data.
    pub async fn seed(&self, records: impl IntoIterator<Item = ProgressRecord>) {
        for record in records {
            let slot = self.slot(&record.user_id);
            let mut guard = slot.lock().await;
            guard.insert(record.module_id.clone(), record);
        }
    }

    fn slot(&self, user_id: &UserId) -> Arc<AsyncMutex<UserRecords>> {
        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        users.entry(user_id.clone()).or_default().clone()
    }

    #[cfg(test)]
    fn tracked_users(&self) -> usize {
        self.users.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Drop `user_id`'s slot if nothing else holds it and it stores no records
fn release_if_empty(users: &Slots, user_id: &UserId) {
    let mut users = users.lock().unwrap_or_else(PoisonError::into_inner);
    let idle = users.get(user_id).is_some_and(|slot| {
        Arc::strong_count(slot) == 1 && slot.try_lock().is_ok_and(|records| records.is_empty())
    });
    if idle {
        users.remove(user_id);
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn load(&self, user_id: &UserId) -> Result<Vec<ProgressRecord>, StoreError> {
        let slot = self
            .users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned();
        let Some(slot) = slot else {
            return Ok(Vec::new());
        };
        let guard = slot.lock().await;
        Ok(guard.values().cloned().collect())
    }

    async fn begin(&self, user_id: &UserId) -> Result<Box<dyn ProgressTx>, StoreError> {
        let guard = self.slot(user_id).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTx {
            users: self.users.clone(),
            user_id: user_id.clone(),
            guard: Some(guard),
            staged,
        }))
    }
}

struct MemoryTx {
    users: Arc<Slots>,
    user_id: UserId,
    guard: Option<OwnedMutexGuard<UserRecords>>,
    staged: UserRecords,
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        let empty = guard.is_empty();
        drop(guard);
        if empty {
            release_if_empty(&self.users, &self.user_id);
        }
    }
}

#[async_trait]
impl ProgressTx for MemoryTx {
    async fn fetch(&mut self, module_id: &ModuleId) -> Result<Option<ProgressRecord>, StoreError> {
        Ok(self.staged.get(module_id).cloned())
    }

    async fn write(
        &mut self,
        record: &ProgressRecord,
        expected: Option<ProgressStatus>,
    ) -> Result<(), StoreError> {
        if record.user_id != self.user_id {
            return Err(StoreError::ForeignRecord {
                tx_user: self.user_id.clone(),
                record_user: record.user_id.clone(),
            });
        }

        let found = self.staged.get(&record.module_id).map(|r| r.status);
        if found != expected {
            return Err(StoreError::Conflict {
                user_id: self.user_id.clone(),
                module_id: record.module_id.clone(),
                expected,
                found,
            });
        }

        self.staged.insert(record.module_id.clone(), record.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut this = self;
        let staged = std::mem::take(&mut this.staged);
        if let Some(guard) = this.guard.as_mut() {
            **guard = staged;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user: &str, module: &str, status: ProgressStatus) -> ProgressRecord {
        ProgressRecord {
            status,
            ..ProgressRecord::locked(UserId::from(user), ModuleId::from(module))
        }
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = MemoryStore::new();
        let user = UserId::from("u1");

        let mut tx = store.begin(&user).await.unwrap();
        tx.write(&record("u1", "a", ProgressStatus::Active), None)
            .await
            .unwrap();
        assert_eq!(
            tx.fetch(&ModuleId::from("a")).await.unwrap().unwrap().status,
            ProgressStatus::Active
        );
        tx.commit().await.unwrap();

        let records = store.load(&user).await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_drop_discards_writes() {
        let store = MemoryStore::new();
        let user = UserId::from("u1");

        {
            let mut tx = store.begin(&user).await.unwrap();
            tx.write(&record("u1", "a", ProgressStatus::Active), None)
                .await
                .unwrap();
        }

        assert!(store.load(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_conditional_write_detects_mismatch() {
        let store = MemoryStore::new();
        store.seed([record("u1", "a", ProgressStatus::Done)]).await;

        let mut tx = store.begin(&UserId::from("u1")).await.unwrap();
        let err = tx
            .write(
                &record("u1", "a", ProgressStatus::Done),
                Some(ProgressStatus::Active),
            )
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert!(matches!(
            err,
            StoreError::Conflict {
                found: Some(ProgressStatus::Done),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_rejects_records_of_other_users() {
        let store = MemoryStore::new();
        let mut tx = store.begin(&UserId::from("u1")).await.unwrap();
        let err = tx
            .write(&record("u2", "a", ProgressStatus::Active), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignRecord { .. }));
    }

    #[tokio::test]
    async fn test_idle_users_are_not_tracked() {
        let store = MemoryStore::new();

        assert!(store.load(&UserId::from("ghost")).await.unwrap().is_empty());
        drop(store.begin(&UserId::from("ghost")).await.unwrap());
        assert_eq!(store.tracked_users(), 0);

        let mut tx = store.begin(&UserId::from("u1")).await.unwrap();
        tx.write(&record("u1", "a", ProgressStatus::Active), None)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.tracked_users(), 1);
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let store = MemoryStore::new();
        let _held = store.begin(&UserId::from("u1")).await.unwrap();

        // A unit open for u1 must not block u2
        let mut other = store.begin(&UserId::from("u2")).await.unwrap();
        other
            .write(&record("u2", "a", ProgressStatus::Active), None)
            .await
            .unwrap();
        other.commit().await.unwrap();

        assert_eq!(store.load(&UserId::from("u2")).await.unwrap().len(), 1);
    }
}
