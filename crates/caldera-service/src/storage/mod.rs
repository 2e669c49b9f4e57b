//! Storage collaborator: raw object bytes plus a change token.

mod fs;

use std::future::Future;

pub use fs::{FsObjectStore, fingerprint};

use crate::error::ServiceResult;

/// A stored object as read from a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    /// Stable for unchanged content, different after any change.
    pub fingerprint: String,
}

/// Read access to one collection's stored objects.
pub trait ObjectStore: Send + Sync {
    /// ## Summary
    /// Reads the raw bytes and fingerprint of `identity`.
    ///
    /// ## Errors
    /// Returns `ServiceError::NotFound` if the object does not exist and
    /// `ServiceError::StorageError` for any other I/O failure.
    fn read_object(&self, identity: &str) -> impl Future<Output = ServiceResult<StoredObject>> + Send;

    /// ## Summary
    /// Lists every identity in the collection, sorted.
    ///
    /// ## Errors
    /// Returns `ServiceError::StorageError` if the collection cannot be listed.
    fn list_identities(&self) -> impl Future<Output = ServiceResult<Vec<String>>> + Send;
}
