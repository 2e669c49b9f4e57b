use thiserror::Error;

/// Errors surfaced by the item cache.
///
/// `Clone` because one population result is handed to every waiting caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("cannot load object {identity}: {reason}")]
    ParseFailure { identity: String, reason: String },

    #[error("cache population aborted: {0}")]
    PopulationAborted(String),

    #[error("cache directory unavailable: {0}")]
    Unavailable(String),
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;
