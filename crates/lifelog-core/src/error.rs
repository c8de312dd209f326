use thiserror::Error;
use uuid::Uuid;

/// Failures reported by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(String),
    #[error("Record not found: {0}")]
    NotFound(Uuid),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Failed to {operation}: {source}")]
    ReadFailed {
        operation: &'static str,
        source: StoreError,
    },
    #[error("Failed to {operation}: {source}")]
    WriteFailed {
        operation: &'static str,
        source: StoreError,
    },
    #[error("Category not found: {0}")]
    CategoryNotFound(Uuid),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(Uuid),
    #[error("Goal not found: {0}")]
    GoalNotFound(Uuid),
    #[error("Category `{0}` already exists")]
    DuplicateCategory(String),
    #[error("No reconciliation pending for `{0}`")]
    NoPendingReconciliation(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Operation cancelled")]
    Cancelled,
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Adapter for `map_err` on storage reads.
    pub fn read(operation: &'static str) -> impl FnOnce(StoreError) -> CoreError {
        move |source| {
            tracing::warn!(operation, error = %source, "storage read failed");
            CoreError::ReadFailed { operation, source }
        }
    }

    /// Adapter for `map_err` on storage writes.
    pub fn write(operation: &'static str) -> impl FnOnce(StoreError) -> CoreError {
        move |source| {
            tracing::warn!(operation, error = %source, "storage write failed");
            CoreError::WriteFailed { operation, source }
        }
    }

    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            CoreError::ReadFailed { .. } | CoreError::WriteFailed { .. }
        )
    }
}
