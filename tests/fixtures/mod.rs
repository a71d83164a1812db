#![allow(dead_code)]
/// Shared fixtures for progression integration tests
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use module_progress::catalog::{Catalog, Module, ModuleId};
use module_progress::progress::{Clock, ProgressRecord, ProgressStatus, UserId};
use module_progress::store::{MemoryStore, ProgressStore, ProgressTx, StoreError};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Three-module catalog A -> B -> C
pub fn sample_catalog() -> Catalog {
    Catalog::from_modules(vec![
        Module::new("a", 1, "Module A").with_description("First steps"),
        Module::new("b", 2, "Module B"),
        Module::new("c", 3, "Module C"),
    ])
    .expect("sample catalog is valid")
}

pub fn sample_catalog_toml() -> &'static str {
    r#"
[[modules]]
id = "a"
sequence_position = 1
title = "Module A"
description = "First steps"

[[modules]]
id = "b"
sequence_position = 2
title = "Module B"

[[modules]]
id = "c"
sequence_position = 3
title = "Module C"
"#
}

pub fn module(id: &str) -> ModuleId {
    ModuleId::from(id)
}

pub fn user(id: &str) -> UserId {
    UserId::from(id)
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
}

pub fn done_record(user_id: &str, module_id: &str, at: DateTime<Utc>) -> ProgressRecord {
    ProgressRecord {
        status: ProgressStatus::Done,
        started_at: Some(at),
        completed_at: Some(at),
        ..ProgressRecord::locked(user(user_id), module(module_id))
    }
}

pub fn active_record(user_id: &str, module_id: &str, at: DateTime<Utc>) -> ProgressRecord {
    ProgressRecord {
        status: ProgressStatus::Active,
        started_at: Some(at),
        ..ProgressRecord::locked(user(user_id), module(module_id))
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(start),
        })
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Store wrapper that injects `Busy` failures into upcoming transactions.
///
/// `fail_write_at` picks which write (1-based) of a unit fails; the failure
/// repeats for the next `failures` units, then the store behaves normally.
pub struct FailingStore {
    inner: Arc<MemoryStore>,
    fail_write_at: Option<u32>,
    fail_commit: bool,
    failures: AtomicU32,
}

impl FailingStore {
    pub fn failing_write(inner: Arc<MemoryStore>, write_number: u32, failures: u32) -> Self {
        Self {
            inner,
            fail_write_at: Some(write_number),
            fail_commit: false,
            failures: AtomicU32::new(failures),
        }
    }

    pub fn failing_commit(inner: Arc<MemoryStore>, failures: u32) -> Self {
        Self {
            inner,
            fail_write_at: None,
            fail_commit: true,
            failures: AtomicU32::new(failures),
        }
    }

    pub fn remaining_failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ProgressStore for FailingStore {
    async fn load(&self, user_id: &UserId) -> Result<Vec<ProgressRecord>, StoreError> {
        self.inner.load(user_id).await
    }

    async fn begin(&self, user_id: &UserId) -> Result<Box<dyn ProgressTx>, StoreError> {
        let inner = self.inner.begin(user_id).await?;
        let armed = self.take_failure();
        Ok(Box::new(FailingTx {
            inner,
            writes: 0,
            fail_write_at: self.fail_write_at.filter(|_| armed),
            fail_commit: self.fail_commit && armed,
        }))
    }
}

struct FailingTx {
    inner: Box<dyn ProgressTx>,
    writes: u32,
    fail_write_at: Option<u32>,
    fail_commit: bool,
}

#[async_trait]
impl ProgressTx for FailingTx {
    async fn fetch(&mut self, module_id: &ModuleId) -> Result<Option<ProgressRecord>, StoreError> {
        self.inner.fetch(module_id).await
    }

    async fn write(
        &mut self,
        record: &ProgressRecord,
        expected: Option<ProgressStatus>,
    ) -> Result<(), StoreError> {
        self.writes += 1;
        if self.fail_write_at == Some(self.writes) {
            return Err(StoreError::Busy("injected write failure".to_string()));
        }
        self.inner.write(record, expected).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if self.fail_commit {
            return Err(StoreError::Busy("injected commit failure".to_string()));
        }
        self.inner.commit().await
    }
}
