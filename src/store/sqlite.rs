// SQLite progress store
//
// Each unit of work is one SQLite transaction and every write is conditional
// on the status it expects to replace. Timestamps are stored as Unix
// milliseconds, so sub-millisecond precision does not survive a round trip.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use super::{ProgressStore, ProgressTx, StoreError};
use crate::catalog::{Catalog, Module, ModuleId};
use crate::config::DatabaseConfig;
use crate::progress::{ProgressRecord, ProgressStatus, UserId};

/// SQLite-backed progress store
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database and run migrations if enabled
    pub async fn open(config: &DatabaseConfig) -> Result<Self, StoreError> {
        if let Some(parent) = Path::new(&config.path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        info!("Opening progress database at {}", config.path);
        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        if config.auto_migrate {
            info!("Running database migrations...");
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Database migrations completed");
        }

        Ok(Self { pool })
    }

    /// Make the `modules` table match `catalog`.
    ///
    /// Modules that left the catalog are deleted along with their progress
    /// rows. Surviving rows are first parked below every old and new
    /// position, so reordering or reusing a position never trips the unique
    /// constraint mid-sync.
    pub async fn sync_catalog(&self, catalog: &Catalog) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let stored: Vec<String> = sqlx::query_scalar("SELECT id FROM modules")
            .fetch_all(&mut *tx)
            .await?;
        for id in stored {
            if catalog.get(&ModuleId::new(id.as_str())).is_ok() {
                continue;
            }
            let removed = sqlx::query("DELETE FROM module_progress WHERE module_id = ?1")
                .bind(&id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM modules WHERE id = ?1")
                .bind(&id)
                .execute(&mut *tx)
                .await?;
            warn!(
                module_id = %id,
                progress_rows = removed.rows_affected(),
                "Removed module no longer in the catalog"
            );
        }

        let stored_min: Option<i64> =
            sqlx::query_scalar("SELECT MIN(sequence_position) FROM modules")
                .fetch_one(&mut *tx)
                .await?;
        let catalog_min = catalog.first().map(|m| m.sequence_position);
        if let Some(base) = stored_min.into_iter().chain(catalog_min).min() {
            // rowid >= 1, so every parked position is distinct and below `base`
            sqlx::query("UPDATE modules SET sequence_position = ?1 - rowid")
                .bind(base)
                .execute(&mut *tx)
                .await?;
        }

        for module in catalog.list() {
            sqlx::query(
                r#"
                INSERT INTO modules (id, sequence_position, title, description)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT (id) DO UPDATE SET
                    sequence_position = excluded.sequence_position,
                    title = excluded.title,
                    description = excluded.description
                "#,
            )
            .bind(module.id.as_str())
            .bind(module.sequence_position)
            .bind(&module.title)
            .bind(&module.description)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        info!("Synchronized {} catalog modules", catalog.len());
        Ok(())
    }

    /// Read the catalog back in `sequence_position` order
    pub async fn load_catalog(&self) -> Result<Catalog, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, sequence_position, title, description
            FROM modules
            ORDER BY sequence_position ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let modules = rows
            .into_iter()
            .map(|row| -> Result<Module, StoreError> {
                Ok(Module {
                    id: ModuleId::new(row.try_get::<String, _>("id")?),
                    sequence_position: row.try_get("sequence_position")?,
                    title: row.try_get("title")?,
                    description: row.try_get("description")?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Catalog::from_modules(modules).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    /// Close database connections gracefully
    pub async fn shutdown(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
        info!("Database connections closed");
    }
}

#[async_trait]
impl ProgressStore for SqliteStore {
    async fn load(&self, user_id: &UserId) -> Result<Vec<ProgressRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, module_id, status, started_at_ms, completed_at_ms
            FROM module_progress
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn begin(&self, user_id: &UserId) -> Result<Box<dyn ProgressTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteTx {
            tx,
            user_id: user_id.clone(),
        }))
    }
}

struct SqliteTx {
    tx: Transaction<'static, Sqlite>,
    user_id: UserId,
}

#[async_trait]
impl ProgressTx for SqliteTx {
    async fn fetch(&mut self, module_id: &ModuleId) -> Result<Option<ProgressRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT user_id, module_id, status, started_at_ms, completed_at_ms
            FROM module_progress
            WHERE user_id = ?1 AND module_id = ?2
            "#,
        )
        .bind(self.user_id.as_str())
        .bind(module_id.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(record_from_row).transpose()
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

        let started_at_ms = record.started_at.map(|t| t.timestamp_millis());
        let completed_at_ms = record.completed_at.map(|t| t.timestamp_millis());

        let result = match expected {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO module_progress
                        (user_id, module_id, status, started_at_ms, completed_at_ms)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT (user_id, module_id) DO NOTHING
                    "#,
                )
                .bind(record.user_id.as_str())
                .bind(record.module_id.as_str())
                .bind(record.status.as_str())
                .bind(started_at_ms)
                .bind(completed_at_ms)
                .execute(&mut *self.tx)
                .await?
            }
            Some(current) => {
                sqlx::query(
                    r#"
                    UPDATE module_progress
                    SET status = ?3, started_at_ms = ?4, completed_at_ms = ?5
                    WHERE user_id = ?1 AND module_id = ?2 AND status = ?6
                    "#,
                )
                .bind(record.user_id.as_str())
                .bind(record.module_id.as_str())
                .bind(record.status.as_str())
                .bind(started_at_ms)
                .bind(completed_at_ms)
                .bind(current.as_str())
                .execute(&mut *self.tx)
                .await?
            }
        };

        if result.rows_affected() != 1 {
            let found = self.fetch(&record.module_id).await?.map(|r| r.status);
            return Err(StoreError::Conflict {
                user_id: self.user_id.clone(),
                module_id: record.module_id.clone(),
                expected,
                found,
            });
        }

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        this.tx.commit().await?;
        Ok(())
    }
}

fn record_from_row(row: &SqliteRow) -> Result<ProgressRecord, StoreError> {
    let status: String = row.try_get("status")?;
    Ok(ProgressRecord {
        user_id: UserId::new(row.try_get::<String, _>("user_id")?),
        module_id: ModuleId::new(row.try_get::<String, _>("module_id")?),
        status: status.parse().map_err(StoreError::Corrupt)?,
        started_at: from_millis(row.try_get("started_at_ms")?)?,
        completed_at: from_millis(row.try_get("completed_at_ms")?)?,
    })
}

fn from_millis(ms: Option<i64>) -> Result<Option<DateTime<Utc>>, StoreError> {
    ms.map(|ms| {
        DateTime::<Utc>::from_timestamp_millis(ms)
            .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {ms}")))
    })
    .transpose()
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::PoolTimedOut) {
            return StoreError::Busy("timed out waiting for a connection".to_string());
        }

        // SQLITE_BUSY (5) and SQLITE_LOCKED (6), including their extended codes
        let busy = err
            .as_database_error()
            .and_then(|db| db.code())
            .and_then(|code| code.parse::<i32>().ok())
            .is_some_and(|code| matches!(code & 0xff, 5 | 6));

        if busy {
            StoreError::Busy(err.to_string())
        } else {
            StoreError::Database(err)
        }
    }
}
