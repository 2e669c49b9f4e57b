//! Persistent, cross-process cache of parsed calendar objects.
//!
//! Records live under `<root>/<hash(collection)>/item/<hash(identity)>` and
//! are keyed by the object's content fingerprint. Readers never take a
//! lock; writers serialize on a per-identity lock file and publish by
//! renaming a fully written temporary into place.

mod cache;
pub mod error;
mod key;
mod record;
mod store;

pub use cache::ItemCache;
pub use error::{CacheError, CacheResult};
pub use key::hash_key;
pub use record::{CachedObject, Lookup};
pub use store::{DiskStore, Published};
