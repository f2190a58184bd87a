//! JSON documents on disk with serialized read-modify-write.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use fs2::FileExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{GateError, Result};

/// Suffix of the sidecar file holding the cross-process write lock.
const LOCK_SUFFIX: &str = ".lock";

/// Whether a mutation should be written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Commit {
    /// Persist the document.
    Write,
    /// Leave the file untouched.
    Skip,
}

/// Exclusive advisory lock on a document's sidecar file, released on drop.
struct DocumentLock {
    file: File,
}

impl Drop for DocumentLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// A JSON document guarded by a store-scoped mutex and a file lock.
///
/// Writers take the in-process mutex first and then an exclusive lock on
/// `<path>.lock`, so stores in other threads, other store instances and other
/// processes all serialize on the same file. Every mutation re-reads the
/// document under both locks and replaces it through a temporary file in the
/// same directory, so no update is lost and readers never see a partial
/// document.
pub(crate) struct JsonDocument<T> {
    path: PathBuf,
    lock: Mutex<()>,
    #[cfg(test)]
    fail_writes: std::sync::atomic::AtomicBool,
    _doc: PhantomData<fn() -> T>,
}

impl<T> JsonDocument<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            #[cfg(test)]
            fail_writes: std::sync::atomic::AtomicBool::new(false),
            _doc: PhantomData,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock.lock().map_err(|_| GateError::LockPoisoned(self.path.display().to_string()))
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(LOCK_SUFFIX);
        PathBuf::from(name)
    }

    /// Blocks until this process holds the document's file lock.
    fn lock_file(&self) -> Result<DocumentLock> {
        let dir = self.dir();
        fs::create_dir_all(&dir).map_err(|e| GateError::persistence(&dir, e))?;

        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| GateError::persistence(&lock_path, e))?;
        FileExt::lock_exclusive(&file).map_err(|e| GateError::persistence(&lock_path, e))?;
        Ok(DocumentLock { file })
    }

    fn dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Reads the document. A missing file reads as the default document.
    ///
    /// Writes replace the file atomically, so reads take only the mutex.
    pub(crate) fn read(&self) -> Result<T> {
        let _guard = self.guard()?;
        self.read_unlocked()
    }

    /// Returns true if the file exists.
    #[cfg(test)]
    pub(crate) fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Applies `mutate` to a fresh copy of the document and persists it when
    /// the closure returns [`Commit::Write`].
    pub(crate) fn mutate<R, F>(&self, mutate: F) -> Result<R>
    where
        F: FnOnce(&mut T) -> Result<(R, Commit)>,
    {
        let _guard = self.guard()?;
        let _file_lock = self.lock_file()?;
        let mut doc = self.read_unlocked()?;
        let (value, commit) = mutate(&mut doc)?;
        if commit == Commit::Write {
            self.write_unlocked(&doc)?;
        }
        Ok(value)
    }

    /// Writes `init()` unless the file already exists. The existence check
    /// runs under both locks. Returns true if written.
    pub(crate) fn create_if_absent(&self, init: impl FnOnce() -> T) -> Result<bool> {
        let _guard = self.guard()?;
        let _file_lock = self.lock_file()?;
        if self.path.exists() {
            return Ok(false);
        }
        self.write_unlocked(&init())?;
        Ok(true)
    }

    /// Makes every later write fail with a persistence error.
    #[cfg(test)]
    pub(crate) fn fail_writes(&self) {
        self.fail_writes.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    fn read_unlocked(&self) -> Result<T> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(err) => Err(GateError::persistence(&self.path, err)),
        }
    }

    fn write_unlocked(&self, doc: &T) -> Result<()> {
        #[cfg(test)]
        if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(GateError::persistence(&self.path, std::io::Error::other("writes disabled")));
        }

        let dir = self.dir();
        fs::create_dir_all(&dir).map_err(|e| GateError::persistence(&dir, e))?;

        let json = serde_json::to_string_pretty(doc)?;
        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| GateError::persistence(&dir, e))?;
        tmp.write_all(json.as_bytes()).map_err(|e| GateError::persistence(tmp.path(), e))?;
        tmp.as_file().sync_all().map_err(|e| GateError::persistence(tmp.path(), e))?;
        tmp.persist(&self.path).map_err(|e| GateError::persistence(&self.path, e.error))?;

        debug!(path = %self.path.display(), bytes = json.len(), "Wrote document");
        Ok(())
    }
}
