use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use caldera_core::constants::{ITEM_CACHE_DIR, LOCK_FILE_EXTENSION, TEMP_FILE_EXTENSION};
use fd_lock::RwLock;

use crate::key::hash_key;
use crate::record::{self, CachedObject, Lookup};

/// Outcome of [`DiskStore::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Published {
    Written,
    /// Another writer stored the same fingerprint first.
    AlreadyCurrent,
}

/// Blocking access to one collection's item records.
///
/// Every method does synchronous file IO; async callers run them on the
/// blocking pool.
#[derive(Debug, Clone)]
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    /// ## Summary
    /// Opens (creating if needed) the record folder for `collection` under `root`.
    ///
    /// ## Errors
    /// Returns the IO error if the folder cannot be created.
    pub fn open(root: &Path, collection: &str) -> io::Result<Self> {
        let dir = root.join(hash_key(collection)).join(ITEM_CACHE_DIR);
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, hash: &str) -> PathBuf {
        self.dir.join(hash)
    }

    fn lock_path(&self, hash: &str) -> PathBuf {
        self.dir.join(format!("{hash}.{LOCK_FILE_EXTENSION}"))
    }

    /// ## Summary
    /// Reads the record for `identity` without locking.
    ///
    /// Records are only ever replaced by rename, so a reader sees either the
    /// previous complete record or the new one.
    #[must_use]
    pub fn load(&self, identity: &str, fingerprint: &str) -> Lookup {
        match fs::read(self.record_path(&hash_key(identity))) {
            Ok(bytes) => record::decode(&bytes, identity, fingerprint),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Lookup::Miss,
            Err(e) => Lookup::Corrupt(format!("unreadable record: {e}")),
        }
    }

    /// ## Summary
    /// Stores `entry` as the record for `identity` at `fingerprint`.
    ///
    /// ## Side Effects
    /// Holds the identity's advisory lock file while writing. The record is
    /// written to a uniquely named temporary, synced, then renamed over the
    /// previous record. If a record for the same fingerprint is already in
    /// place once the lock is held, nothing is written.
    ///
    /// ## Errors
    /// Returns the IO error from locking, writing or renaming. A failed
    /// rename removes the temporary.
    pub fn publish(
        &self,
        identity: &str,
        fingerprint: &str,
        entry: &CachedObject,
    ) -> io::Result<Published> {
        let hash = hash_key(identity);
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(self.lock_path(&hash))?;
        let mut lock = RwLock::new(lock_file);
        let _guard = lock.write()?;

        let target = self.record_path(&hash);
        if let Ok(bytes) = fs::read(&target)
            && record::stored_fingerprint(&bytes).as_deref() == Some(fingerprint)
        {
            return Ok(Published::AlreadyCurrent);
        }

        let bytes = record::encode(identity, fingerprint, entry)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let temp = self.dir.join(format!(
            ".{hash}.{}.{TEMP_FILE_EXTENSION}",
            uuid::Uuid::new_v4().simple()
        ));
        let written = write_synced(&temp, &bytes).and_then(|()| fs::rename(&temp, &target));
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&temp) {
                tracing::debug!(path = %temp.display(), error = %cleanup, "Temporary record already gone");
            }
            return Err(e);
        }
        Ok(Published::Written)
    }

    /// ## Summary
    /// Deletes the record for `identity`, if any.
    ///
    /// ## Errors
    /// Returns IO errors other than the record being absent.
    pub fn remove(&self, identity: &str) -> io::Result<()> {
        match fs::remove_file(self.record_path(&hash_key(identity))) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// ## Summary
    /// Deletes records, lock files and leftover temporaries belonging to
    /// identities not in `live`. Returns the number of records removed.
    ///
    /// Temporaries of live identities are left alone since another process
    /// may still be writing them.
    ///
    /// ## Errors
    /// Returns the IO error if the folder cannot be listed or a file cannot
    /// be removed.
    pub fn prune(&self, live: &HashSet<String>) -> io::Result<usize> {
        let live: HashSet<String> = live.iter().map(|identity| hash_key(identity)).collect();
        let mut removed = 0;

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let (hash, is_record) = classify(name);
            if live.contains(hash) {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    if is_record {
                        removed += 1;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }
}

/// Splits a file name into the identity hash it belongs to and whether it
/// is a record (as opposed to a lock file or temporary).
fn classify(name: &str) -> (&str, bool) {
    if let Some(rest) = name.strip_prefix('.') {
        return (rest.split('.').next().unwrap_or(rest), false);
    }
    match name.split_once('.') {
        Some((hash, _extension)) => (hash, false),
        None => (name, true),
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes)?;
    writer.flush()?;
    writer.get_ref().sync_all()
}
