use std::sync::Arc;
use thiserror::Error;
use tonic::{Code, Status};
use zipline_core::{CacheError, StorageError};

/// Result type for service operations.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// Empty or malformed URL / short key (including a key that decodes
    /// to 0).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// No record exists for the decoded ID.
    #[error("short link not found")]
    NotFound,
    /// The decoded ID exceeds the published max-ID guard.
    #[error("invalid short link")]
    InvalidShortLink,
    /// A cache-layer failure none of the protection layers could absorb.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
    /// A database failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<ServiceError> for Status {
    fn from(error: ServiceError) -> Self {
        let (code, message) = match &error {
            ServiceError::InvalidArgument(_) => (Code::InvalidArgument, "invalid argument"),
            ServiceError::NotFound => (Code::NotFound, "short link not found"),
            ServiceError::InvalidShortLink => (Code::FailedPrecondition, "invalid short link"),
            ServiceError::Cache(_) | ServiceError::Storage(_) => {
                (Code::Internal, "internal error")
            }
        };

        let mut status = Status::new(code, message);
        status.set_source(Arc::new(error));
        status
    }
}
