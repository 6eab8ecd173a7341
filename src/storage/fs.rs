use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::NamedTempFile;

use super::{validate_key, ObjectStore, StorageError, UrlSigner};

/// Filesystem object store: key `a/b/c.pdf` lives at `{root}/a/b/c.pdf`.
///
/// Write strategy:
/// - Temp file in the destination directory, then persist (atomic rename).
/// - Parent directories are created on demand.
///
/// Delete strategy:
/// - Missing keys are not an error.
/// - Directories emptied by a delete are pruned up to (not including) the root.
///
/// Content types are not persisted; readers infer them from the key.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    signer: UrlSigner,
}

impl FsObjectStore {
    /// Open (or create) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>, signer: UrlSigner) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| StorageError::io(&root.to_string_lossy(), e))?;
        Ok(Self { root, signer })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        let mut path = self.root.clone();
        for segment in key.split('/') {
            path.push(segment);
        }
        Ok(path)
    }

    /// Write `bytes` to `target` through a temp file in the same directory.
    fn write_atomic(&self, key: &str, target: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        let dir = target
            .parent()
            .ok_or_else(|| StorageError::InvalidKey(key.to_string()))?;
        std::fs::create_dir_all(dir).map_err(|e| StorageError::io(key, e))?;

        let mut temp = NamedTempFile::new_in(dir).map_err(|e| StorageError::io(key, e))?;
        temp.write_all(bytes).map_err(|e| StorageError::io(key, e))?;
        temp.as_file().sync_all().map_err(|e| StorageError::io(key, e))?;
        temp.persist(target)
            .map_err(|e| StorageError::io(key, e.error))?;
        Ok(())
    }

    /// Remove now-empty directories between `start` and the store root.
    fn prune_empty_dirs(&self, start: Option<&Path>) {
        let mut current = start;
        while let Some(dir) = current {
            if dir == self.root || !dir.starts_with(&self.root) {
                break;
            }
            // remove_dir fails on non-empty directories, which ends the walk.
            if std::fs::remove_dir(dir).is_err() {
                break;
            }
            current = dir.parent();
        }
    }
}

impl ObjectStore for FsObjectStore {
    fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        self.write_atomic(path, &target, bytes)?;
        tracing::debug!(key = %path, size = bytes.len(), content_type, "Object written");
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let target = self.resolve(path)?;
        std::fs::read(&target).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(path.to_string())
            } else {
                StorageError::io(path, e)
            }
        })
    }

    fn delete(&self, path: &str) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        match std::fs::remove_file(&target) {
            Ok(()) => {
                self.prune_empty_dirs(target.parent());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let target = self.resolve(path)?;
        match std::fs::metadata(&target) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    fn copy(&self, src: &str, dst: &str) -> Result<(), StorageError> {
        let bytes = self.get(src)?;
        let target = self.resolve(dst)?;
        self.write_atomic(dst, &target, &bytes)
    }

    fn signed_read_url(&self, path: &str, ttl: Duration) -> Result<String, StorageError> {
        if !self.exists(path)? {
            return Err(StorageError::NotFound(path.to_string()));
        }
        Ok(self.signer.sign(path, ttl))
    }
}
