use anyhow::{Context, Result};
use module_progress::config::ModuleProgressConfig;
use module_progress::{Catalog, ProgressService, ProgressStore};
use std::sync::Arc;
use tracing::info;

pub mod catalog;
pub mod complete;
pub mod enroll;
pub mod open;
pub mod status;

#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(&self) -> Result<()>;
}

/// Load the catalog, open the configured store and run `f` against the service
pub async fn with_progress_service<F, Fut, R>(config: &ModuleProgressConfig, f: F) -> Result<R>
where
    F: FnOnce(ProgressService) -> Fut,
    Fut: std::future::Future<Output = Result<R>>,
{
    let catalog = Catalog::load(&config.catalog.path)
        .with_context(|| format!("Failed to load module catalog from {}", config.catalog.path))?;
    info!("Loaded {} modules from {}", catalog.len(), config.catalog.path);

    let store = open_store(config, &catalog).await?;
    let service = ProgressService::new(catalog, store).with_cache(&config.cache);
    f(service).await
}

#[cfg(feature = "database")]
async fn open_store(config: &ModuleProgressConfig, catalog: &Catalog) -> Result<Arc<dyn ProgressStore>> {
    use module_progress::SqliteStore;

    let Some(database) = &config.database else {
        return Ok(memory_store());
    };

    let store = SqliteStore::open(database)
        .await
        .with_context(|| format!("Failed to open progress database at {}", database.path))?;
    store.sync_catalog(catalog).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "database"))]
async fn open_store(_config: &ModuleProgressConfig, _catalog: &Catalog) -> Result<Arc<dyn ProgressStore>> {
    Ok(memory_store())
}

fn memory_store() -> Arc<dyn ProgressStore> {
    tracing::warn!("No database configured; progress will not outlive this process");
    Arc::new(module_progress::MemoryStore::new())
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
