//! Registry operations over a [`DocumentStore`].
//!
//! Every mutation is one batch. Pre-reads only build the batch payload and
//! fail fast on the common conflicts; the batch's own preconditions
//! (create-only handle record, compare-and-swap owner document) are what
//! make a lost race fail instead of overwriting the winner.

use std::sync::Arc;

use tracing::{debug, info, warn};

use hreg_store::{Document, DocumentStore, StoreError, WriteBatch};
use hreg_types::{
    Clock, Handle, HandleHistoryEntry, HandleRecord, Owner, OwnerId, OwnerRecord, SystemClock,
};

use crate::config::RegistryConfig;
use crate::error::{RegistryError, RegistryResult};
use crate::generator::HandleGenerator;
use crate::schema::{decode, encode, handle_key, owner_key, HANDLES};

/// Result of a successful [`HandleRegistry::rename`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenameOutcome {
    /// The owner already held the handle. Nothing was written.
    Unchanged,
    /// The owner moved to `current`, vacating `previous` if it had one.
    Renamed {
        previous: Option<Handle>,
        current: Handle,
    },
}

/// The handle registry.
///
/// Stateless apart from its collaborators: any number of registries may
/// share one store.
pub struct HandleRegistry<S: ?Sized = dyn DocumentStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    generator: HandleGenerator,
    config: RegistryConfig,
}

impl<S: DocumentStore + ?Sized> HandleRegistry<S> {
    /// A registry with default configuration and the system clock.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            generator: HandleGenerator::default(),
            config: RegistryConfig::default(),
        }
    }

    /// A registry with explicit configuration.
    pub fn with_config(store: Arc<S>, config: RegistryConfig) -> RegistryResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            clock: Arc::new(SystemClock),
            generator: HandleGenerator::new(config.generator.clone())?,
            config,
        })
    }

    /// Replace the clock used to stamp records.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // ---- Writes ----

    /// Reserve `handle` for a new owner.
    ///
    /// Writes the handle record and the provisioned owner document in one
    /// batch. An owner document that exists but is unprovisioned keeps its
    /// `created_at`.
    pub async fn create_and_reserve(
        &self,
        handle: &str,
        owner: OwnerId,
        is_generated: bool,
    ) -> RegistryResult<Handle> {
        let handle = Handle::parse(handle)?;
        let hkey = handle_key(&handle);
        if self.store.exists(&hkey).await? {
            return Err(RegistryError::HandleTaken {
                handle: handle.into_string(),
            });
        }

        let existing = self.read_owner(&owner).await?;
        let now = self.clock.now();
        let created_at = match &existing {
            Some((record, _)) if record.identity.is_provisioned() => {
                return Err(RegistryError::AlreadyProvisioned { owner });
            }
            Some((record, _)) => record.created_at,
            None => now,
        };

        let index = HandleRecord {
            owner_id: owner,
            created_at: now,
            is_generated,
        };
        let owner_doc = OwnerRecord {
            id: owner,
            created_at,
            identity: Owner::provisioned(handle.clone(), now),
        };

        let okey = owner_key(&owner);
        let batch = WriteBatch::new().create(hkey, encode(&index)?);
        let batch = match existing {
            Some((_, raw)) => batch.update(okey, raw, encode(&owner_doc)?),
            None => batch.create(okey, encode(&owner_doc)?),
        };
        self.commit(batch, &handle, owner).await?;

        info!(%owner, handle = %handle, is_generated, "handle reserved");
        Ok(handle)
    }

    /// Generate a free handle and reserve it for `owner`.
    ///
    /// A generated handle can still be taken between generation and commit;
    /// that case regenerates, up to `reserve_attempts` times. If every
    /// attempt loses its race, the last `HandleTaken` is returned.
    /// `GenerationExhausted` only comes from the generator itself.
    pub async fn reserve_generated(&self, owner: OwnerId) -> RegistryResult<Handle> {
        let attempts = self.config.reserve_attempts;
        let mut last_err = None;
        for attempt in 1..=attempts {
            let candidate = self.generate().await?;
            match self.create_and_reserve(candidate.as_str(), owner, true).await {
                Ok(handle) => return Ok(handle),
                Err(RegistryError::HandleTaken { handle }) => {
                    warn!(%owner, %handle, attempt, "generated handle lost a race, regenerating");
                    last_err = Some(RegistryError::HandleTaken { handle });
                }
                Err(err) => return Err(err),
            }
        }
        warn!(%owner, attempts, "every generated handle lost its race");
        Err(last_err.unwrap_or_else(|| {
            RegistryError::Config("reserve_attempts must be positive".into())
        }))
    }

    /// Move `owner` to `new_handle`.
    ///
    /// In one batch: create the new handle record, update the owner document
    /// (closing the active history entry and appending a new open one), and
    /// delete the old handle record. Renaming to the current handle is a
    /// no-op that writes nothing.
    pub async fn rename(&self, owner: OwnerId, new_handle: &str) -> RegistryResult<RenameOutcome> {
        let new_handle = Handle::parse(new_handle)?;
        let hkey = handle_key(&new_handle);

        if let Some(doc) = self.store.get(&hkey).await? {
            let index: HandleRecord = decode(&hkey, doc)?;
            if index.owner_id != owner {
                return Err(RegistryError::HandleTaken {
                    handle: new_handle.into_string(),
                });
            }
            let (record, _) = self
                .read_owner(&owner)
                .await?
                .ok_or(RegistryError::OwnerNotFound { owner })?;
            if record.handle() == Some(&new_handle) {
                debug!(%owner, handle = %new_handle, "rename to current handle is a no-op");
                return Ok(RenameOutcome::Unchanged);
            }
            warn!(%owner, handle = %new_handle, "stale index record points at owner");
            return Err(RegistryError::HandleTaken {
                handle: new_handle.into_string(),
            });
        }

        let (record, raw) = self
            .read_owner(&owner)
            .await?
            .ok_or(RegistryError::OwnerNotFound { owner })?;
        if record.handle() == Some(&new_handle) {
            warn!(%owner, handle = %new_handle, "current handle has no index record");
            return Ok(RenameOutcome::Unchanged);
        }

        let now = self.clock.now();
        let previous = record.handle().cloned();
        let updated = OwnerRecord {
            identity: record.identity.with_handle(new_handle.clone(), now),
            ..record
        };
        let index = HandleRecord {
            owner_id: owner,
            created_at: now,
            is_generated: false,
        };

        let mut batch = WriteBatch::new()
            .create(hkey, encode(&index)?)
            .update(owner_key(&owner), raw, encode(&updated)?);
        if let Some(old) = &previous {
            batch = batch.delete(handle_key(old));
        }
        self.commit(batch, &new_handle, owner).await?;

        info!(
            %owner,
            from = previous.as_ref().map(Handle::as_str).unwrap_or("-"),
            to = %new_handle,
            "handle renamed"
        );
        Ok(RenameOutcome::Renamed {
            previous,
            current: new_handle,
        })
    }

    // ---- Reads ----

    /// Resolve `handle` to its owner's id.
    ///
    /// Returns `Ok(None)` for malformed handles (without touching the store),
    /// unknown handles, and handles whose owner document is missing.
    pub async fn lookup_by_handle(&self, handle: &str) -> RegistryResult<Option<OwnerId>> {
        Ok(self.lookup_owner(handle).await?.map(|record| record.id))
    }

    /// Resolve `handle` to its owner's document. Same "not found" rules as
    /// [`lookup_by_handle`](Self::lookup_by_handle).
    pub async fn lookup_owner(&self, handle: &str) -> RegistryResult<Option<OwnerRecord>> {
        let Ok(handle) = Handle::parse(handle) else {
            return Ok(None);
        };
        let hkey = handle_key(&handle);
        let Some(doc) = self.store.get(&hkey).await? else {
            debug!(handle = %handle, "lookup: no such handle");
            return Ok(None);
        };
        let index: HandleRecord = decode(&hkey, doc)?;

        match self.read_owner(&index.owner_id).await? {
            Some((record, _)) => Ok(Some(record)),
            None => {
                warn!(handle = %handle, owner = %index.owner_id, "handle points at missing owner");
                Ok(None)
            }
        }
    }

    /// Read an owner document by id.
    pub async fn owner(&self, owner: OwnerId) -> RegistryResult<Option<OwnerRecord>> {
        Ok(self.read_owner(&owner).await?.map(|(record, _)| record))
    }

    /// The owner's handle history, oldest first.
    pub async fn history(&self, owner: OwnerId) -> RegistryResult<Vec<HandleHistoryEntry>> {
        let record = self
            .owner(owner)
            .await?
            .ok_or(RegistryError::OwnerNotFound { owner })?;
        Ok(record.history().to_vec())
    }

    /// `true` if `handle` is well-formed and unreserved.
    pub async fn is_available(&self, handle: &str) -> RegistryResult<bool> {
        let Ok(handle) = Handle::parse(handle) else {
            return Ok(false);
        };
        Ok(!self.store.exists(&handle_key(&handle)).await?)
    }

    /// Find an unreserved handle. Does not reserve it.
    pub async fn generate(&self) -> RegistryResult<Handle> {
        self.generator.generate(self.store.as_ref()).await
    }

    // ---- Internals ----

    async fn read_owner(&self, owner: &OwnerId) -> RegistryResult<Option<(OwnerRecord, Document)>> {
        let okey = owner_key(owner);
        match self.store.get(&okey).await? {
            Some(raw) => {
                let record: OwnerRecord = decode(&okey, raw.clone())?;
                record
                    .identity
                    .check_history()
                    .map_err(|e| RegistryError::Corrupt(format!("{okey}: {e}")))?;
                Ok(Some((record, raw)))
            }
            None => Ok(None),
        }
    }

    async fn commit(&self, batch: WriteBatch, handle: &Handle, owner: OwnerId) -> RegistryResult<()> {
        match self.store.commit(batch).await {
            Ok(()) => Ok(()),
            Err(StoreError::PreconditionFailed { key, .. }) if key.collection == HANDLES => {
                warn!(%owner, handle = %handle, "lost race for handle at commit");
                Err(RegistryError::HandleTaken {
                    handle: handle.as_str().to_string(),
                })
            }
            Err(StoreError::PreconditionFailed { .. }) => {
                warn!(%owner, "owner document changed before commit");
                Err(RegistryError::ConcurrentModification { owner })
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl<S: ?Sized> std::fmt::Debug for HandleRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
