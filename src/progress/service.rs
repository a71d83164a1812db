// Progression service - read path (projection) and write path (completion)

use moka::future::Cache;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, Instrument};

use super::clock::{Clock, SystemClock};
use super::lifecycle::{LifecycleEvent, ModuleLifecycle};
use super::projection::project;
use super::types::{
    CompletionOutcome, ModuleAccess, ProgressRecord, ProgressStatus, SkipReason,
    StatusProjection, UserId,
};
use super::ProgressError;
use crate::catalog::{Catalog, ModuleId};
use crate::config::CacheConfig;
use crate::observability::{progress_metrics, OperationTimer};
use crate::store::{ProgressStore, ProgressTx};
use crate::telemetry::{create_progress_span, generate_correlation_id};

/// Per-user projection cache.
///
/// Entries are stamped with the write clock at the time the underlying rows
/// were read. A committed write advances the clock and records the stamp
/// against the user, so an entry computed from pre-write rows can never be
/// served afterwards, even if it lands in the cache after the write finished.
struct ProjectionCache {
    entries: Cache<UserId, CachedProjection>,
    writes: Mutex<WriteLog>,
}

#[derive(Clone)]
struct CachedProjection {
    stamp: u64,
    projection: Arc<StatusProjection>,
}

/// Last write stamp per user, bounded to `capacity` users.
///
/// Evicting a user raises `floor` to at least their stamp, and users without
/// an entry are judged against `floor`. Forgetting a user can only cost cache
/// hits, never serve a stale projection.
#[derive(Debug)]
struct WriteLog {
    clock: u64,
    floor: u64,
    last_write: HashMap<UserId, u64>,
    capacity: usize,
}

impl WriteLog {
    fn new(capacity: usize) -> Self {
        Self {
            clock: 0,
            floor: 0,
            last_write: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    fn last_write(&self, user_id: &UserId) -> u64 {
        self.last_write.get(user_id).copied().unwrap_or(self.floor)
    }

    fn record(&mut self, user_id: &UserId) {
        self.clock += 1;
        self.last_write.insert(user_id.clone(), self.clock);

        if self.last_write.len() > self.capacity {
            let oldest = self
                .last_write
                .iter()
                .min_by_key(|(_, stamp)| **stamp)
                .map(|(user, stamp)| (user.clone(), *stamp));
            if let Some((user, stamp)) = oldest {
                self.last_write.remove(&user);
                self.floor = self.floor.max(stamp);
            }
        }
    }
}

impl ProjectionCache {
    fn new(config: &CacheConfig) -> Self {
        let entries = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(Duration::from_secs(config.ttl_seconds))
            .build();

        Self {
            entries,
            writes: Mutex::new(WriteLog::new(
                usize::try_from(config.max_capacity).unwrap_or(usize::MAX),
            )),
        }
    }

    fn writes(&self) -> std::sync::MutexGuard<'_, WriteLog> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stamp for a read that is about to start
    fn stamp(&self) -> u64 {
        self.writes().clock
    }

    async fn get(&self, user_id: &UserId) -> Option<Arc<StatusProjection>> {
        let entry = self.entries.get(user_id).await?;
        (entry.stamp >= self.writes().last_write(user_id)).then_some(entry.projection)
    }

    async fn put(&self, user_id: &UserId, stamp: u64, projection: Arc<StatusProjection>) {
        self.entries
            .insert(user_id.clone(), CachedProjection { stamp, projection })
            .await;
    }

    async fn invalidate(&self, user_id: &UserId) {
        self.writes().record(user_id);
        self.entries.invalidate(user_id).await;
    }
}

pub struct ProgressService {
    catalog: Arc<Catalog>,
    store: Arc<dyn ProgressStore>,
    clock: Arc<dyn Clock>,
    cache: Option<ProjectionCache>,
}

impl ProgressService {
    pub fn new(catalog: Catalog, store: Arc<dyn ProgressStore>) -> Self {
        Self {
            catalog: Arc::new(catalog),
            store,
            clock: Arc::new(SystemClock),
            cache: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cache(mut self, config: &CacheConfig) -> Self {
        self.cache = config.enabled.then(|| ProjectionCache::new(config));
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Effective status of every catalog module for `user_id`
    pub async fn project(&self, user_id: &UserId) -> Result<Arc<StatusProjection>, ProgressError> {
        ensure_user(user_id)?;

        let Some(cache) = &self.cache else {
            return Ok(Arc::new(self.compute(user_id).await?));
        };

        let stamp = cache.stamp();
        if let Some(hit) = cache.get(user_id).await {
            progress_metrics().record_cache_hit();
            return Ok(hit);
        }

        progress_metrics().record_cache_miss();
        let projection = Arc::new(self.compute(user_id).await?);
        cache.put(user_id, stamp, projection.clone()).await;
        Ok(projection)
    }

    /// Mark `module_id` done for `user_id` and activate its successor, as one
    /// atomic unit. Requests against modules that are not currently active
    /// are silent no-ops, which makes the call safe to replay.
    pub async fn complete_module(
        &self,
        user_id: &UserId,
        module_id: &ModuleId,
    ) -> Result<CompletionOutcome, ProgressError> {
        ensure_user(user_id)?;
        let successor = self.catalog.successor(module_id)?.map(|m| m.id.clone());

        let correlation_id = generate_correlation_id();
        let span = create_progress_span(
            "complete_module",
            user_id.as_str(),
            Some(module_id.as_str()),
            &correlation_id,
        );

        let timer = OperationTimer::new("complete_module");
        let result = self
            .complete_in_tx(user_id, module_id, successor.as_ref())
            .instrument(span)
            .await;
        timer.finish();

        match &result {
            Ok(CompletionOutcome::Advanced { .. }) => {
                progress_metrics().record_advanced();
                self.invalidate(user_id).await;
            }
            Ok(CompletionOutcome::Skipped { .. }) => progress_metrics().record_skipped(),
            Err(err) if err.is_retryable() => progress_metrics().record_transient_failure(),
            Err(_) => {}
        }

        result
    }

    /// Give the user an explicit `active` record for the first module.
    /// Returns whether anything was written.
    pub async fn enroll(&self, user_id: &UserId) -> Result<bool, ProgressError> {
        ensure_user(user_id)?;
        let Some(head) = self.catalog.first() else {
            return Ok(false);
        };

        let now = self.clock.now();
        let mut tx = self.store.begin(user_id).await?;
        let existing = tx.fetch(&head.id).await?;
        let expected = existing.as_ref().map(|r| r.status);
        let record =
            existing.unwrap_or_else(|| ProgressRecord::locked(user_id.clone(), head.id.clone()));

        let provisioned = ModuleLifecycle::apply(record, &LifecycleEvent::Provision { at: now });
        if !provisioned.changed {
            return Ok(false);
        }

        tx.write(&provisioned.record, expected).await?;
        tx.commit().await?;
        self.invalidate(user_id).await;

        info!(user_id = %user_id, module_id = %head.id, "User enrolled");
        Ok(true)
    }

    /// Whether the user may open `module_id`. Never mutates state.
    pub async fn check_access(
        &self,
        user_id: &UserId,
        module_id: &ModuleId,
    ) -> Result<ModuleAccess, ProgressError> {
        self.catalog.get(module_id)?;
        let projection = self.project(user_id).await?;

        let view = projection
            .view(module_id)
            .cloned()
            .ok_or_else(|| ProgressError::NotFound {
                entity: "module",
                id: module_id.to_string(),
            })?;

        let access = match view.status {
            ProgressStatus::Active => ModuleAccess::Open(view),
            ProgressStatus::Done => ModuleAccess::Completed(view),
            ProgressStatus::Locked => {
                let blocked_by = projection
                    .modules
                    .iter()
                    .take_while(|v| &v.module_id != module_id)
                    .find(|v| v.status != ProgressStatus::Done)
                    .map(|v| v.module_id.clone());

                debug!(user_id = %user_id, module_id = %module_id, "Module not yet available");
                ModuleAccess::NotYetAvailable {
                    module_id: module_id.clone(),
                    blocked_by,
                }
            }
        };

        Ok(access)
    }

    async fn compute(&self, user_id: &UserId) -> Result<StatusProjection, ProgressError> {
        let records = self.store.load(user_id).await?;
        Ok(project(&self.catalog, user_id, &records))
    }

    async fn complete_in_tx(
        &self,
        user_id: &UserId,
        module_id: &ModuleId,
        successor: Option<&ModuleId>,
    ) -> Result<CompletionOutcome, ProgressError> {
        let now = self.clock.now();
        let mut tx = self.store.begin(user_id).await?;

        let stored = tx.fetch(module_id).await?;
        let expected = stored.as_ref().map(|r| r.status);

        // Unprovisioned modules are workable once everything before them is done
        let current = match stored {
            Some(record) if record.status != ProgressStatus::Locked => record,
            stored => {
                if !self.predecessors_done(&mut *tx, module_id).await? {
                    let reason = match stored {
                        Some(_) => SkipReason::Locked,
                        None => SkipReason::NotStarted,
                    };
                    debug!(%reason, "Completion skipped");
                    return Ok(CompletionOutcome::Skipped { reason });
                }
                implicitly_active(
                    stored.unwrap_or_else(|| {
                        ProgressRecord::locked(user_id.clone(), module_id.clone())
                    }),
                    now,
                )
            }
        };

        let completed = ModuleLifecycle::apply(current, &LifecycleEvent::Complete { at: now });
        if !completed.changed {
            debug!(reason = %SkipReason::AlreadyDone, "Completion skipped");
            return Ok(CompletionOutcome::Skipped {
                reason: SkipReason::AlreadyDone,
            });
        }
        tx.write(&completed.record, expected).await?;

        let mut provisioned = None;
        if let Some(next_id) = successor {
            let existing = tx.fetch(next_id).await?;
            let next_expected = existing.as_ref().map(|r| r.status);
            let next = existing
                .unwrap_or_else(|| ProgressRecord::locked(user_id.clone(), next_id.clone()));

            let next = ModuleLifecycle::apply(next, &LifecycleEvent::Provision { at: now });
            if next.changed {
                tx.write(&next.record, next_expected).await?;
            }
            if next.record.status == ProgressStatus::Active {
                provisioned = Some(next_id.clone());
            }
        }

        tx.commit().await?;

        info!(
            provisioned = provisioned.as_ref().map(|id| id.as_str()),
            "Module completed"
        );
        Ok(CompletionOutcome::Advanced {
            completed: module_id.clone(),
            provisioned,
        })
    }

    async fn predecessors_done(
        &self,
        tx: &mut dyn ProgressTx,
        module_id: &ModuleId,
    ) -> Result<bool, ProgressError> {
        for module in self.catalog.list().iter().take_while(|m| &m.id != module_id) {
            let done = tx
                .fetch(&module.id)
                .await?
                .is_some_and(|r| r.status == ProgressStatus::Done);
            if !done {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn invalidate(&self, user_id: &UserId) {
        if let Some(cache) = &self.cache {
            cache.invalidate(user_id).await;
        }
    }
}

fn implicitly_active(mut record: ProgressRecord, now: chrono::DateTime<chrono::Utc>) -> ProgressRecord {
    record.status = ProgressStatus::Active;
    record.started_at.get_or_insert(now);
    record
}

fn ensure_user(user_id: &UserId) -> Result<(), ProgressError> {
    if user_id.is_blank() {
        return Err(ProgressError::NotFound {
            entity: "user",
            id: user_id.to_string(),
        });
    }
    Ok(())
}
