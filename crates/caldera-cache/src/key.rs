use sha2::{Digest, Sha256};

/// ## Summary
/// Hex SHA-256 of `value`, used for collection folders and record file
/// names so arbitrary identities map to portable file names.
#[must_use]
pub fn hash_key(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}
