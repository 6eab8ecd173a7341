use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::Duration;

use super::{validate_key, ObjectStore, StorageError, UrlSigner};

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

/// In-process object store backed by a sorted map.
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    signer: UrlSigner,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::with_signer(UrlSigner::with_random_secret("memory://store", "archive"))
    }

    pub fn with_signer(signer: UrlSigner) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            signer,
        }
    }

    /// All keys currently stored, in lexical order.
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn content_type(&self, path: &str) -> Option<String> {
        self.objects
            .read()
            .ok()
            .and_then(|map| map.get(path).map(|o| o.content_type.clone()))
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError> {
        validate_key(path)?;
        let mut map = self.objects.write().map_err(|_| StorageError::LockPoisoned)?;
        map.insert(
            path.to_string(),
            StoredObject {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        validate_key(path)?;
        let map = self.objects.read().map_err(|_| StorageError::LockPoisoned)?;
        map.get(path)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    fn delete(&self, path: &str) -> Result<(), StorageError> {
        validate_key(path)?;
        let mut map = self.objects.write().map_err(|_| StorageError::LockPoisoned)?;
        map.remove(path);
        Ok(())
    }

    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        validate_key(path)?;
        let map = self.objects.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(map.contains_key(path))
    }

    fn copy(&self, src: &str, dst: &str) -> Result<(), StorageError> {
        validate_key(src)?;
        validate_key(dst)?;
        let mut map = self.objects.write().map_err(|_| StorageError::LockPoisoned)?;
        let object = map
            .get(src)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(src.to_string()))?;
        map.insert(dst.to_string(), object);
        Ok(())
    }

    fn signed_read_url(&self, path: &str, ttl: Duration) -> Result<String, StorageError> {
        validate_key(path)?;
        if !self.exists(path)? {
            return Err(StorageError::NotFound(path.to_string()));
        }
        Ok(self.signer.sign(path, ttl))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete() {
        let store = MemoryObjectStore::new();
        store.put("a/b.pdf", b"%PDF-1.4", "application/pdf").unwrap();
        assert!(store.exists("a/b.pdf").unwrap());
        assert_eq!(store.get("a/b.pdf").unwrap(), b"%PDF-1.4");
        assert_eq!(store.content_type("a/b.pdf").as_deref(), Some("application/pdf"));

        store.delete("a/b.pdf").unwrap();
        assert!(!store.exists("a/b.pdf").unwrap());
        assert!(matches!(store.get("a/b.pdf"), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn delete_missing_is_ok() {
        let store = MemoryObjectStore::new();
        assert!(store.delete("nothing.pdf").is_ok());
    }

    #[test]
    fn copy_keeps_source_and_content_type() {
        let store = MemoryObjectStore::new();
        store.put("src.pdf", b"data", "application/pdf").unwrap();
        store.copy("src.pdf", "x/dst.pdf").unwrap();
        assert_eq!(store.keys(), vec!["src.pdf".to_string(), "x/dst.pdf".to_string()]);
        assert_eq!(store.content_type("x/dst.pdf").as_deref(), Some("application/pdf"));
    }

    #[test]
    fn copy_missing_source_fails() {
        let store = MemoryObjectStore::new();
        assert!(matches!(
            store.copy("missing.pdf", "dst.pdf"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn signed_url_requires_existing_object() {
        let store = MemoryObjectStore::new();
        assert!(store
            .signed_read_url("a.pdf", Duration::from_secs(60))
            .is_err());
        store.put("a.pdf", b"x", "application/pdf").unwrap();
        let url = store.signed_read_url("a.pdf", Duration::from_secs(60)).unwrap();
        assert!(url.contains("/archive/a.pdf?expires="));
    }

    #[test]
    fn invalid_keys_rejected() {
        let store = MemoryObjectStore::new();
        assert!(matches!(
            store.put("/abs.pdf", b"x", "application/pdf"),
            Err(StorageError::InvalidKey(_))
        ));
    }
}
