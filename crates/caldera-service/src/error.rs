use thiserror::Error;

/// Service layer errors - combines all error types
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Storage error: {0}")]
    StorageError(#[from] std::io::Error),

    #[error(transparent)]
    CacheError(#[from] caldera_cache::CacheError),

    #[error(transparent)]
    CoreError(#[from] caldera_core::error::CoreError),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
