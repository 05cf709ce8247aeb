use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use tracing::debug;

use crate::batch::{Collections, Document, DocumentKey, WriteBatch};
use crate::error::{StoreError, StoreResult};
use crate::traits::DocumentStore;

type CommitHook = Box<dyn FnOnce(&mut Collections) + Send>;

/// Snapshot of the calls an [`InMemoryDocumentStore`] has served.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Point reads (`get` and `exists`).
    pub reads: u64,
    /// Unconditional point writes.
    pub writes: u64,
    /// Point deletes.
    pub deletes: u64,
    /// Batch commits attempted, successful or not.
    pub commits: u64,
}

impl StoreStats {
    /// Total number of calls of any kind.
    pub fn total(&self) -> u64 {
        self.reads + self.writes + self.deletes + self.commits
    }

    /// Calls that could have mutated the store.
    pub fn mutations(&self) -> u64 {
        self.writes + self.deletes + self.commits
    }
}

#[derive(Default)]
struct Counters {
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    commits: AtomicU64,
}

/// In-memory, map-based document store.
///
/// Intended for tests and embedding. Documents live behind a `RwLock`; a
/// batch is checked and applied under one write lock, so readers see either
/// none or all of it.
///
/// Besides the [`DocumentStore`] contract it counts calls ([`stats`]) and can
/// simulate faults: an offline backend, failing commits, and a hook that runs
/// inside the next commit's critical section (to stage a racing writer).
///
/// [`stats`]: InMemoryDocumentStore::stats
pub struct InMemoryDocumentStore {
    docs: RwLock<Collections>,
    counters: Counters,
    offline: AtomicBool,
    failing_commits: AtomicUsize,
    commit_hook: Mutex<Option<CommitHook>>,
}

impl InMemoryDocumentStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::with_documents(Collections::new())
    }

    /// Create a store pre-populated with `docs`.
    pub fn with_documents(docs: Collections) -> Self {
        Self {
            docs: RwLock::new(docs),
            counters: Counters::default(),
            offline: AtomicBool::new(false),
            failing_commits: AtomicUsize::new(0),
            commit_hook: Mutex::new(None),
        }
    }

    /// Number of documents currently stored.
    pub fn len(&self) -> usize {
        self.docs.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.docs.read().expect("lock poisoned").is_empty()
    }

    /// Number of documents in one collection.
    pub fn count(&self, collection: &str) -> usize {
        self.docs.read().expect("lock poisoned").count(collection)
    }

    /// A copy of every stored document.
    pub fn snapshot(&self) -> Collections {
        self.docs.read().expect("lock poisoned").clone()
    }

    /// Calls served so far.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            reads: self.counters.reads.load(Ordering::SeqCst),
            writes: self.counters.writes.load(Ordering::SeqCst),
            deletes: self.counters.deletes.load(Ordering::SeqCst),
            commits: self.counters.commits.load(Ordering::SeqCst),
        }
    }

    /// Reset all call counters to zero.
    pub fn reset_stats(&self) {
        self.counters.reads.store(0, Ordering::SeqCst);
        self.counters.writes.store(0, Ordering::SeqCst);
        self.counters.deletes.store(0, Ordering::SeqCst);
        self.counters.commits.store(0, Ordering::SeqCst);
    }

    /// While offline, every call fails with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make the next `n` commits fail with [`StoreError::Unavailable`] after
    /// their preconditions pass but before anything is applied.
    pub fn fail_next_commits(&self, n: usize) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }

    /// Run `hook` inside the next commit, under the write lock, before the
    /// batch preconditions are checked.
    pub fn on_next_commit(&self, hook: impl FnOnce(&mut Collections) + Send + 'static) {
        *self.commit_hook.lock().expect("lock poisoned") = Some(Box::new(hook));
    }

    fn ensure_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".into()));
        }
        Ok(())
    }

    fn take_commit_failure(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, key: &DocumentKey) -> StoreResult<Option<Document>> {
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;
        let docs = self.docs.read().expect("lock poisoned");
        Ok(docs.get(key).cloned())
    }

    async fn put(&self, key: &DocumentKey, document: Document) -> StoreResult<()> {
        self.counters.writes.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;
        self.docs.write().expect("lock poisoned").put(key, document);
        Ok(())
    }

    async fn delete(&self, key: &DocumentKey) -> StoreResult<bool> {
        self.counters.deletes.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;
        Ok(self.docs.write().expect("lock poisoned").delete(key))
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        self.counters.commits.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;

        let hook = self.commit_hook.lock().expect("lock poisoned").take();
        let mut docs = self.docs.write().expect("lock poisoned");
        if let Some(hook) = hook {
            hook(&mut docs);
        }

        docs.check(&batch)?;
        if self.take_commit_failure() {
            return Err(StoreError::Unavailable("injected commit failure".into()));
        }
        let ops = batch.len();
        docs.apply(batch)?;
        debug!(ops, "batch committed");
        Ok(())
    }

    async fn exists(&self, key: &DocumentKey) -> StoreResult<bool> {
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;
        let docs = self.docs.read().expect("lock poisoned");
        Ok(docs.get(key).is_some())
    }
}

impl std::fmt::Debug for InMemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDocumentStore")
            .field("document_count", &self.len())
            .field("stats", &self.stats())
            .finish()
    }
}
