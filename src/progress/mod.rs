// Per-user module progression: status projection and the completion transition

pub mod clock;
pub mod error;
pub mod lifecycle;
pub mod projection;
pub mod retry;
pub mod service;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use error::ProgressError;
pub use lifecycle::{LifecycleEvent, ModuleLifecycle, Transitioned};
pub use projection::project;
pub use retry::RetryConfig;
pub use service::ProgressService;
pub use types::{
    CompletionOutcome, ModuleAccess, ModuleView, ProgressRecord, ProgressStatus, SkipReason,
    StatusProjection, UserId,
};
