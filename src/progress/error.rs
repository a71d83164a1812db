use thiserror::Error;

use crate::catalog::CatalogError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    /// The atomic write could not commit; retrying with the same arguments is safe
    #[error("transient store failure: {0}")]
    TransientStoreFailure(#[source] StoreError),
    #[error("store failure: {0}")]
    Store(#[source] StoreError),
    #[error(transparent)]
    Catalog(CatalogError),
}

impl ProgressError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientStoreFailure(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<StoreError> for ProgressError {
    fn from(err: StoreError) -> Self {
        if err.is_transient() {
            Self::TransientStoreFailure(err)
        } else {
            Self::Store(err)
        }
    }
}

impl From<CatalogError> for ProgressError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::ModuleNotFound(id) => Self::NotFound {
                entity: "module",
                id: id.to_string(),
            },
            other => Self::Catalog(other),
        }
    }
}
