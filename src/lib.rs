// Module Progress Library - linear module progression per user
// This exposes the core components for testing and integration

pub mod catalog;
pub mod config;
pub mod observability;
pub mod progress;
pub mod store;
pub mod telemetry;

// Re-export key types for easy access
pub use catalog::{Catalog, CatalogError, Module, ModuleId};
pub use config::{config, ModuleProgressConfig};
pub use observability::{progress_metrics, OperationTimer, ProgressMetrics, ProgressStats};
pub use progress::{
    Clock, CompletionOutcome, ModuleAccess, ModuleView, ProgressError, ProgressRecord,
    ProgressService, ProgressStatus, RetryConfig, SkipReason, StatusProjection, SystemClock,
    UserId,
};
#[cfg(feature = "database")]
pub use store::SqliteStore;
pub use store::{MemoryStore, ProgressStore, ProgressTx, StoreError};
pub use telemetry::{create_progress_span, generate_correlation_id, init_telemetry};
