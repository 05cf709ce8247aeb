//! Single-file JSON document store.
//!
//! The whole store is one JSON object on disk. Every mutation takes an
//! exclusive lock on a sibling `<file>.lock`, re-reads the file, applies the
//! change, writes the result to a temp file in the same directory, syncs,
//! and renames it over the old file. Preconditions are therefore checked
//! against what is on disk, so several stores (or processes) sharing one
//! path still see exactly one winner per create-if-absent key. A crash or
//! I/O error leaves the previous file intact.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use fs2::FileExt;
use tracing::{debug, info};

use crate::batch::{Collections, Document, DocumentKey, WriteBatch};
use crate::error::{StoreError, StoreResult};
use crate::traits::DocumentStore;

/// A [`DocumentStore`] persisted as a single JSON file.
///
/// Suitable for command-line use and small deployments. Every operation
/// reloads the file under an advisory lock (shared for reads, exclusive for
/// writes); the in-memory copy is only a cache of the last load. Locking
/// blocks the calling thread.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock_path: PathBuf,
    docs: RwLock<Collections>,
}

/// Held advisory lock; released when the file handle closes.
struct FileLock(File);

impl FileLock {
    fn acquire(path: &Path, exclusive: bool) -> StoreResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        if exclusive {
            FileExt::lock_exclusive(&file)?;
        } else {
            FileExt::lock_shared(&file)?;
        }
        Ok(Self(file))
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut lock_name = path.as_os_str().to_owned();
        lock_name.push(".lock");
        let lock_path = PathBuf::from(lock_name);

        let docs = {
            let _lock = FileLock::acquire(&lock_path, false)?;
            load(&path)?
        };
        info!(path = %path.display(), documents = docs.len(), "document store opened");
        Ok(Self {
            path,
            lock_path,
            docs: RwLock::new(docs),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of documents as of the last load.
    pub fn len(&self) -> usize {
        self.docs.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().expect("lock poisoned").is_empty()
    }

    fn persist(&self, docs: &Collections) -> StoreResult<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        let json = serde_json::to_vec_pretty(docs)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        debug!(path = %self.path.display(), bytes = json.len(), "store file replaced");
        Ok(())
    }

    /// Reload the file under a shared lock and cache it.
    fn refresh(&self) -> StoreResult<Collections> {
        let current = {
            let _lock = FileLock::acquire(&self.lock_path, false)?;
            load(&self.path)?
        };
        *self.docs.write().expect("lock poisoned") = current.clone();
        Ok(current)
    }

    /// Under the exclusive file lock: reload, apply `mutate` to the fresh
    /// state, persist it, then cache it. A failing `mutate` writes nothing.
    fn mutate<T>(&self, mutate: impl FnOnce(&mut Collections) -> StoreResult<T>) -> StoreResult<T> {
        let mut docs = self.docs.write().expect("lock poisoned");
        let _lock = FileLock::acquire(&self.lock_path, true)?;
        *docs = load(&self.path)?;
        let mut next = docs.clone();
        let out = mutate(&mut next)?;
        self.persist(&next)?;
        *docs = next;
        Ok(out)
    }
}

fn load(path: &Path) -> StoreResult<Collections> {
    if !path.exists() {
        return Ok(Collections::new());
    }
    let bytes = fs::read(path)?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Collections::new());
    }
    serde_json::from_slice(&bytes)
        .map_err(|e| StoreError::Serialization(format!("{}: {e}", path.display())))
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn get(&self, key: &DocumentKey) -> StoreResult<Option<Document>> {
        Ok(self.refresh()?.get(key).cloned())
    }

    async fn put(&self, key: &DocumentKey, document: Document) -> StoreResult<()> {
        self.mutate(|docs| {
            docs.put(key, document);
            Ok(())
        })
    }

    async fn delete(&self, key: &DocumentKey) -> StoreResult<bool> {
        self.mutate(|docs| Ok(docs.delete(key)))
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        self.mutate(|docs| docs.apply(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(k: &str) -> DocumentKey {
        DocumentKey::new("handles", k)
    }

    #[tokio::test]
    async fn open_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("store.json")).unwrap();
        assert!(store.is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn writes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        {
            let store = JsonFileStore::open(&path).unwrap();
            store.put(&key("alice"), json!({"ownerId": "u1"})).await.unwrap();
            store
                .commit(WriteBatch::new().create(key("bob"), json!({"ownerId": "u2"})))
                .await
                .unwrap();
        }

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(
            store.get(&key("bob")).await.unwrap(),
            Some(json!({"ownerId": "u2"}))
        );
    }

    #[tokio::test]
    async fn failed_commit_leaves_file_and_memory_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.put(&key("taken"), json!(1)).await.unwrap();
        let before = fs::read(&path).unwrap();

        let batch = WriteBatch::new()
            .put(DocumentKey::new("users", "u1"), json!({}))
            .create(key("taken"), json!(2));
        assert!(store.commit(batch).await.is_err());

        assert_eq!(fs::read(&path).unwrap(), before);
        assert!(store
            .get(&DocumentKey::new("users", "u1"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn delete_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.put(&key("a"), json!(1)).await.unwrap();
        assert!(store.delete(&key("a")).await.unwrap());

        let reopened = JsonFileStore::open(&path).unwrap();
        assert!(reopened.is_empty());
    }

    #[tokio::test]
    async fn second_store_on_same_path_loses_create() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let first = JsonFileStore::open(&path).unwrap();
        let second = JsonFileStore::open(&path).unwrap();

        first
            .commit(
                WriteBatch::new()
                    .create(key("alice"), json!({"ownerId": "u1"}))
                    .create(DocumentKey::new("users", "u1"), json!({"id": "u1"})),
            )
            .await
            .unwrap();

        // `second` loaded the file before `first` wrote to it.
        let err = second
            .commit(
                WriteBatch::new()
                    .create(key("alice"), json!({"ownerId": "u2"}))
                    .create(DocumentKey::new("users", "u2"), json!({"id": "u2"})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PreconditionFailed { .. }));

        let on_disk = JsonFileStore::open(&path).unwrap();
        assert_eq!(
            on_disk.get(&key("alice")).await.unwrap(),
            Some(json!({"ownerId": "u1"}))
        );
        assert!(on_disk
            .get(&DocumentKey::new("users", "u1"))
            .await
            .unwrap()
            .is_some());
        assert!(on_disk
            .get(&DocumentKey::new("users", "u2"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn writes_from_one_store_are_visible_to_another() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let a = JsonFileStore::open(&path).unwrap();
        let b = JsonFileStore::open(&path).unwrap();

        a.put(&key("carol"), json!(1)).await.unwrap();
        assert_eq!(b.get(&key("carol")).await.unwrap(), Some(json!(1)));
        b.put(&key("dave"), json!(2)).await.unwrap();
        assert_eq!(a.get(&key("carol")).await.unwrap(), Some(json!(1)));
        assert_eq!(a.get(&key("dave")).await.unwrap(), Some(json!(2)));
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn corrupt_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path),
            Err(StoreError::Serialization(_))
        ));
    }
}
