use std::io;
use std::path::{Component, Path, PathBuf};

use caldera_core::constants::OBJECT_FILE_EXTENSION;
use sha2::{Digest, Sha256};

use super::{ObjectStore, StoredObject};
use crate::error::{ServiceError, ServiceResult};

/// ## Summary
/// Content fingerprint of stored bytes: hex SHA-256.
#[must_use]
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Collection stored as one `.ics` file per identity under
/// `<collection_root>/<collection>/`.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    dir: PathBuf,
}

impl FsObjectStore {
    /// ## Summary
    /// Opens an existing collection directory.
    ///
    /// ## Errors
    /// Returns `ServiceError::NotFound` if the collection name escapes the
    /// root or the directory does not exist.
    pub async fn open(collection_root: &Path, collection: &str) -> ServiceResult<Self> {
        let relative = Path::new(collection);
        let contained = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if collection.is_empty() || !contained {
            return Err(ServiceError::NotFound(format!("collection {collection}")));
        }

        let dir = collection_root.join(relative);
        match tokio::fs::metadata(&dir).await {
            Ok(metadata) if metadata.is_dir() => Ok(Self { dir }),
            Ok(_) => Err(ServiceError::NotFound(format!("collection {collection}"))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(ServiceError::NotFound(format!("collection {collection}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Identities are plain file names inside the collection.
    fn object_path(&self, identity: &str) -> Option<PathBuf> {
        let mut components = Path::new(identity).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Some(self.dir.join(name)),
            _ => None,
        }
    }
}

impl ObjectStore for FsObjectStore {
    async fn read_object(&self, identity: &str) -> ServiceResult<StoredObject> {
        let Some(path) = self.object_path(identity) else {
            return Err(ServiceError::NotFound(identity.to_string()));
        };
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let fingerprint = fingerprint(&bytes);
                Ok(StoredObject { bytes, fingerprint })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(ServiceError::NotFound(identity.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_identities(&self) -> ServiceResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut identities = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let is_object = Path::new(&name)
                .extension()
                .is_some_and(|extension| extension.eq_ignore_ascii_case(OBJECT_FILE_EXTENSION));
            if is_object {
                identities.push(name);
            }
        }
        identities.sort();
        Ok(identities)
    }
}
