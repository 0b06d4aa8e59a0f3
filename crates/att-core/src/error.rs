//! Errors surfaced by the engine and report operations.

use thiserror::Error;

use crate::store::StoreError;
use crate::types::ValidationError;

/// Hard failures. Expected user mistakes are reported as
/// [`Rejection`](crate::engine::Rejection) values instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The store failed while performing `operation`.
    #[error("failed to {operation}")]
    Persistence {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Attaches the failed operation to a store error.
pub(crate) trait StoreResultExt<T> {
    fn during(self, operation: &'static str) -> Result<T, EngineError>;
}

impl<T> StoreResultExt<T> for Result<T, StoreError> {
    fn during(self, operation: &'static str) -> Result<T, EngineError> {
        self.map_err(|source| EngineError::Persistence { operation, source })
    }
}
