//! Main CapsuleVault engine - the primary entry point
//!
//! CapsuleVault coordinates per-owner stores, policy evaluation, and
//! persistence:
//! - Per-owner sharded stores, lazily created on first write
//! - Chunked payload assembly under a fixed per-chunk bound
//! - The ordered unlock policy (completeness, authorization, secret, time,
//!   geo) with an append-only unlock-event log
//!
//! Every operation takes the caller identity explicitly; the surrounding
//! execution environment owns authentication and imposes a total order over
//! calls. Checks always precede mutation, so a failed operation leaves no
//! trace.
//!
//! # Example
//!
//! ```
//! use capsulevault_core::{CapsuleKind, CapsuleParams, CapsuleVault, VaultConfig};
//!
//! let mut vault = CapsuleVault::in_memory(VaultConfig::default());
//!
//! let mut params = CapsuleParams::new(CapsuleKind::FileLocker, "text/plain");
//! params.secret = vec![0xAB];
//! let id = vault.create_capsule("did:vault:alice", params).unwrap();
//!
//! vault
//!     .upload_chunk("did:vault:alice", "did:vault:alice", id, 0, b"hello".to_vec(), true)
//!     .unwrap();
//! vault
//!     .request_unlock("did:vault:alice", "did:vault:alice", id, &[0xAB])
//!     .unwrap();
//!
//! let bytes = vault
//!     .file_chunk("did:vault:alice", "did:vault:alice", id, 0)
//!     .unwrap();
//! assert_eq!(bytes, b"hello");
//! ```

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::capsule::Capsule;
use crate::clock::{Clock, SystemClock};
use crate::config::VaultConfig;
use crate::error::{VaultError, VaultResult};
use crate::policy;
use crate::storage::Storage;
use crate::store::OwnerStore;
use crate::types::{CapsuleId, CapsuleInfo, CapsuleParams, FileInfo, UnlockEvent};

/// Capsule-based conditional-release storage engine
///
/// Owns the per-owner stores and applies every operation as one atomic unit:
/// all preconditions are checked before the first mutation, and the store is
/// written back to disk only after the operation succeeded.
pub struct CapsuleVault {
    /// Engine-wide limits and the trusted oracle identity
    config: VaultConfig,
    /// Time source for the unlock time gate
    clock: Box<dyn Clock>,
    /// Durable backing, absent when running purely in memory
    storage: Option<Storage>,
    /// Owner identity → store, loaded lazily from storage on first touch
    stores: HashMap<String, OwnerStore>,
    /// Data directory path (in-memory engines have none)
    data_dir: Option<PathBuf>,
}

impl CapsuleVault {
    /// Open a vault backed by a redb database under `data_dir`.
    ///
    /// The directory is created if missing. Owner stores are loaded lazily
    /// as they are touched.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::Io` if the directory cannot be created and
    /// `VaultError::Database` if the database cannot be opened.
    pub fn open(data_dir: impl AsRef<Path>, config: VaultConfig) -> VaultResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        info!(?data_dir, "Opening CapsuleVault");

        std::fs::create_dir_all(&data_dir)?;

        let db_path = data_dir.join("capsulevault.redb");
        let storage = Storage::new(&db_path)?;

        Ok(Self {
            config,
            clock: Box::new(SystemClock),
            storage: Some(storage),
            stores: HashMap::new(),
            data_dir: Some(data_dir),
        })
    }

    /// Create a vault with no durable backing.
    pub fn in_memory(config: VaultConfig) -> Self {
        Self {
            config,
            clock: Box::new(SystemClock),
            storage: None,
            stores: HashMap::new(),
            data_dir: None,
        }
    }

    /// Replace the time source. Used by tests and simulations to drive the
    /// time gate deterministically.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Engine configuration
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Data directory path, if this vault is durably backed
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Store Plumbing
    // ═══════════════════════════════════════════════════════════════════════

    /// Get the owner's store, creating it if this is the owner's first write.
    fn ensure_store<'a>(
        stores: &'a mut HashMap<String, OwnerStore>,
        storage: &Option<Storage>,
        owner: &str,
    ) -> VaultResult<&'a mut OwnerStore> {
        match stores.entry(owner.to_string()) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => {
                let loaded = match storage {
                    Some(s) => s.load_store(owner)?,
                    None => None,
                };
                Ok(e.insert(loaded.unwrap_or_default()))
            }
        }
    }

    /// Get the owner's store, failing `NotFound` if it was never created.
    fn lookup_store<'a>(
        stores: &'a mut HashMap<String, OwnerStore>,
        storage: &Option<Storage>,
        owner: &str,
    ) -> VaultResult<&'a mut OwnerStore> {
        match stores.entry(owner.to_string()) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => {
                let loaded = match storage {
                    Some(s) => s.load_store(owner)?,
                    None => None,
                };
                match loaded {
                    Some(store) => Ok(e.insert(store)),
                    None => Err(VaultError::StoreNotFound(owner.to_string())),
                }
            }
        }
    }

    /// Run a read-only closure against the owner's store without touching
    /// the in-memory cache. Returns `None` if the owner has no store.
    fn with_store<T>(
        &self,
        owner: &str,
        f: impl FnOnce(&OwnerStore) -> T,
    ) -> VaultResult<Option<T>> {
        if let Some(store) = self.stores.get(owner) {
            return Ok(Some(f(store)));
        }
        let loaded = match &self.storage {
            Some(s) => s.load_store(owner)?,
            None => None,
        };
        Ok(loaded.as_ref().map(f))
    }

    /// Run a read-only closure against one capsule.
    fn read_capsule<T>(
        &self,
        owner: &str,
        id: CapsuleId,
        f: impl FnOnce(&Capsule) -> T,
    ) -> VaultResult<T> {
        match self.with_store(owner, |s| s.get(id).map(f))? {
            Some(Some(value)) => Ok(value),
            Some(None) => Err(VaultError::CapsuleNotFound(id)),
            None => Err(VaultError::StoreNotFound(owner.to_string())),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Write Operations
    // ═══════════════════════════════════════════════════════════════════════

    /// Ensure `owner` has a store. Idempotent; a no-op if already present.
    pub fn init_store(&mut self, owner: &str) -> VaultResult<()> {
        let store = Self::ensure_store(&mut self.stores, &self.storage, owner)?;
        if let Some(s) = &self.storage {
            s.save_store(owner, store)?;
        }
        debug!(owner, "Owner store ready");
        Ok(())
    }

    /// Create a capsule in `owner`'s store and return its id.
    ///
    /// The store is created idempotently if this is the owner's first write.
    /// The capsule starts locked and incomplete, with the owner seeded into
    /// its access list and the geo gate pre-verified when the radius is 0.
    pub fn create_capsule(
        &mut self,
        owner: &str,
        params: CapsuleParams,
    ) -> VaultResult<CapsuleId> {
        let store = Self::ensure_store(&mut self.stores, &self.storage, owner)?;
        let id = store.allocate_id();
        let kind = params.kind;
        store.insert(Capsule::new(id, owner, params));

        if let Some(s) = &self.storage {
            s.save_store(owner, store)?;
        }
        info!(%id, owner, %kind, "Created capsule");
        Ok(id)
    }

    /// Write one payload chunk. Owner only.
    ///
    /// Existing indices are overwritten (last write wins) and gaps are legal;
    /// they surface as `NotFound` on read, never at write time. Marking a
    /// chunk final sets `complete`, which never reverts.
    ///
    /// # Errors
    ///
    /// `NotOwner` when `caller != owner`, `ChunkTooLarge` past the configured
    /// per-chunk bound, `NotFound` for a missing store or capsule.
    pub fn upload_chunk(
        &mut self,
        caller: &str,
        owner: &str,
        id: CapsuleId,
        index: u32,
        bytes: Vec<u8>,
        is_final: bool,
    ) -> VaultResult<()> {
        if caller != owner {
            return Err(VaultError::NotOwner(caller.to_string()));
        }
        if bytes.len() > self.config.max_chunk_bytes {
            return Err(VaultError::ChunkTooLarge {
                size: bytes.len(),
                max: self.config.max_chunk_bytes,
            });
        }

        let store = Self::lookup_store(&mut self.stores, &self.storage, owner)?;
        let capsule = store.get_mut(id).ok_or(VaultError::CapsuleNotFound(id))?;
        let size = bytes.len();
        capsule.put_chunk(index, bytes, is_final);

        if let Some(s) = &self.storage {
            s.save_store(owner, store)?;
        }
        debug!(%id, owner, index, size, is_final, "Stored chunk");
        Ok(())
    }

    /// Attach a contributor payload to a Collaborative capsule.
    ///
    /// The caller takes one contributor slot and is granted access in the
    /// same step (idempotent grant).
    ///
    /// # Errors
    ///
    /// `NotFound` for a missing store or capsule, `WrongKind` unless the
    /// capsule is Collaborative, `ContributorLimit` once the cap is reached,
    /// `DuplicateContributor` on a second payload from the same identity.
    pub fn add_contributor_file(
        &mut self,
        caller: &str,
        owner: &str,
        id: CapsuleId,
        bytes: Vec<u8>,
    ) -> VaultResult<()> {
        let store = Self::lookup_store(&mut self.stores, &self.storage, owner)?;
        let capsule = store.get_mut(id).ok_or(VaultError::CapsuleNotFound(id))?;
        capsule.add_contribution(caller, bytes)?;

        if let Some(s) = &self.storage {
            s.save_store(owner, store)?;
        }
        info!(%id, owner, contributor = caller, "Contributor file attached");
        Ok(())
    }

    /// Grant `grantee` access to a FileLocker capsule. Owner only; upsert is
    /// idempotent.
    pub fn grant_access(
        &mut self,
        caller: &str,
        owner: &str,
        id: CapsuleId,
        grantee: &str,
    ) -> VaultResult<()> {
        if caller != owner {
            return Err(VaultError::NotOwner(caller.to_string()));
        }

        let store = Self::lookup_store(&mut self.stores, &self.storage, owner)?;
        let capsule = store.get_mut(id).ok_or(VaultError::CapsuleNotFound(id))?;
        capsule.grant(grantee)?;

        if let Some(s) = &self.storage {
            s.save_store(owner, store)?;
        }
        info!(%id, owner, grantee, "Access granted");
        Ok(())
    }

    /// Remove `revokee` from a capsule's access list. Owner only.
    ///
    /// Revoking the owner fails `SelfRevoke`; revoking an absent entry is a
    /// silent no-op.
    pub fn revoke_access(
        &mut self,
        caller: &str,
        owner: &str,
        id: CapsuleId,
        revokee: &str,
    ) -> VaultResult<()> {
        if caller != owner {
            return Err(VaultError::NotOwner(caller.to_string()));
        }

        let store = Self::lookup_store(&mut self.stores, &self.storage, owner)?;
        let capsule = store.get_mut(id).ok_or(VaultError::CapsuleNotFound(id))?;
        capsule.revoke(revokee)?;

        if let Some(s) = &self.storage {
            s.save_store(owner, store)?;
        }
        info!(%id, owner, revokee, "Access revoked");
        Ok(())
    }

    /// Apply an oracle-verified proximity result. Oracle identity only.
    ///
    /// A no-op when the capsule's geo gate is disabled or the reported
    /// coordinate falls outside the radius; within the radius (inclusive)
    /// the capsule becomes geo-verified, a one-way transition. The distance
    /// here is a coarse sanity re-check; the oracle's own location proof is
    /// authoritative.
    pub fn oracle_geo_callback(
        &mut self,
        caller: &str,
        owner: &str,
        id: CapsuleId,
        lat_micro: i64,
        long_micro: i64,
    ) -> VaultResult<()> {
        if caller != self.config.oracle_id {
            return Err(VaultError::NotOracle(caller.to_string()));
        }

        let store = Self::lookup_store(&mut self.stores, &self.storage, owner)?;
        let capsule = store.get_mut(id).ok_or(VaultError::CapsuleNotFound(id))?;

        if !capsule.geo().is_enabled() {
            debug!(%id, owner, "Geo gate disabled, callback ignored");
            return Ok(());
        }
        if !policy::within_radius(capsule.geo(), lat_micro, long_micro) {
            debug!(%id, owner, "Reported coordinate outside radius");
            return Ok(());
        }

        capsule.mark_geo_verified();
        if let Some(s) = &self.storage {
            s.save_store(owner, store)?;
        }
        info!(%id, owner, "Geo proximity verified");
        Ok(())
    }

    /// Attempt to unlock a capsule.
    ///
    /// Gates run strictly in order (existence, completeness, authorization,
    /// secret, time, geo) and the first failure aborts with no state
    /// change. A full pass sets `unlocked` (idempotently) and appends an
    /// [`UnlockEvent`] to the owner store's log.
    pub fn request_unlock(
        &mut self,
        requester: &str,
        owner: &str,
        id: CapsuleId,
        provided_secret: &[u8],
    ) -> VaultResult<()> {
        let now = self.clock.now();

        let store = Self::lookup_store(&mut self.stores, &self.storage, owner)?;
        let capsule = store.get_mut(id).ok_or(VaultError::CapsuleNotFound(id))?;
        policy::evaluate_unlock(capsule, requester, provided_secret, now)?;
        capsule.mark_unlocked();

        store.record_unlock(UnlockEvent {
            capsule_id: id,
            unlocker: requester.to_string(),
            timestamp: now,
        });

        if let Some(s) = &self.storage {
            s.save_store(owner, store)?;
        }
        info!(%id, owner, unlocker = requester, "Capsule unlocked");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Query Layer (read-only)
    // ═══════════════════════════════════════════════════════════════════════

    /// Policy and state snapshot of a capsule.
    pub fn capsule_info(&self, owner: &str, id: CapsuleId) -> VaultResult<CapsuleInfo> {
        self.read_capsule(owner, id, Capsule::info)
    }

    /// Payload metadata snapshot of a capsule.
    pub fn file_info(&self, owner: &str, id: CapsuleId) -> VaultResult<FileInfo> {
        self.read_capsule(owner, id, Capsule::file_info)
    }

    /// Number of contributor slots taken.
    pub fn contributor_count(&self, owner: &str, id: CapsuleId) -> VaultResult<u32> {
        self.read_capsule(owner, id, Capsule::contributor_count)
    }

    /// Contributor identities in attachment order.
    pub fn contributors(&self, owner: &str, id: CapsuleId) -> VaultResult<Vec<String>> {
        self.read_capsule(owner, id, |c| c.contributors().to_vec())
    }

    /// Whether `who` holds access to the capsule.
    ///
    /// Unknown owner, capsule, or identity all answer `false`, never an
    /// error.
    pub fn has_access(&self, owner: &str, id: CapsuleId, who: &str) -> bool {
        matches!(
            self.with_store(owner, |s| s.get(id).map(|c| c.has_access(who))),
            Ok(Some(Some(true)))
        )
    }

    /// Read one payload chunk.
    ///
    /// # Errors
    ///
    /// `CapsuleLocked` while the capsule has not been unlocked,
    /// `NotAuthorized` for a requester outside the access list, and
    /// `ChunkNotFound` for an index that was never written (a gap).
    pub fn file_chunk(
        &self,
        requester: &str,
        owner: &str,
        id: CapsuleId,
        index: u32,
    ) -> VaultResult<Vec<u8>> {
        self.read_capsule(owner, id, |c| {
            if !c.is_unlocked() {
                return Err(VaultError::CapsuleLocked(id));
            }
            if !c.has_access(requester) {
                return Err(VaultError::NotAuthorized {
                    requester: requester.to_string(),
                    capsule: id,
                });
            }
            match c.chunk(index) {
                Some(bytes) => Ok(bytes.to_vec()),
                None => Err(VaultError::ChunkNotFound { capsule: id, index }),
            }
        })?
    }

    /// Most recently allocated capsule id for `owner`.
    ///
    /// # Errors
    ///
    /// `NotFound` while the owner has no store or the id counter is zero.
    pub fn latest_capsule_id(&self, owner: &str) -> VaultResult<CapsuleId> {
        match self.with_store(owner, OwnerStore::latest_id)? {
            Some(Some(id)) => Ok(id),
            Some(None) => Err(VaultError::NoCapsules(owner.to_string())),
            None => Err(VaultError::StoreNotFound(owner.to_string())),
        }
    }

    /// The owner's unlock-event log, oldest first.
    ///
    /// Observer-style read: an unknown owner yields an empty list.
    pub fn unlock_events(&self, owner: &str) -> VaultResult<Vec<UnlockEvent>> {
        Ok(self
            .with_store(owner, |s| s.events().to_vec())?
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::ErrorKind;
    use crate::types::{CapsuleKind, GeoTarget};

    const ALICE: &str = "did:vault:alice";
    const BOB: &str = "did:vault:bob";
    const ORACLE: &str = "did:vault:oracle";

    fn vault() -> CapsuleVault {
        CapsuleVault::in_memory(VaultConfig::default())
    }

    fn vault_at(now: i64) -> (CapsuleVault, ManualClock) {
        let clock = ManualClock::new(now);
        let vault = CapsuleVault::in_memory(VaultConfig::default()).with_clock(clock.clone());
        (vault, clock)
    }

    fn simple_params(kind: CapsuleKind) -> CapsuleParams {
        let mut params = CapsuleParams::new(kind, "application/octet-stream");
        params.secret = vec![0xAB, 0xCD];
        params
    }

    #[test]
    fn test_init_store_is_idempotent() {
        let mut v = vault();
        v.init_store(ALICE).unwrap();
        v.init_store(ALICE).unwrap();

        // A created-but-empty store still answers NotFound for latest id
        let err = v.latest_capsule_id(ALICE).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_create_allocates_increasing_ids() {
        let mut v = vault();
        let a = v
            .create_capsule(ALICE, simple_params(CapsuleKind::TimeLock))
            .unwrap();
        let b = v
            .create_capsule(ALICE, simple_params(CapsuleKind::GeoLock))
            .unwrap();
        assert_eq!(a.as_u64(), 1);
        assert_eq!(b.as_u64(), 2);
        assert_eq!(v.latest_capsule_id(ALICE).unwrap(), b);
    }

    #[test]
    fn test_id_counters_are_per_owner() {
        let mut v = vault();
        let a = v
            .create_capsule(ALICE, simple_params(CapsuleKind::TimeLock))
            .unwrap();
        let b = v
            .create_capsule(BOB, simple_params(CapsuleKind::TimeLock))
            .unwrap();
        assert_eq!(a.as_u64(), 1);
        assert_eq!(b.as_u64(), 1);
    }

    #[test]
    fn test_owner_has_access_after_create() {
        let mut v = vault();
        let id = v
            .create_capsule(ALICE, simple_params(CapsuleKind::TimeLock))
            .unwrap();
        assert!(v.has_access(ALICE, id, ALICE));
        assert!(!v.has_access(ALICE, id, BOB));
    }

    #[test]
    fn test_upload_rejects_non_owner() {
        let mut v = vault();
        let id = v
            .create_capsule(ALICE, simple_params(CapsuleKind::TimeLock))
            .unwrap();
        let err = v
            .upload_chunk(BOB, ALICE, id, 0, vec![1], false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_upload_rejects_oversize_chunk() {
        let config = VaultConfig {
            max_chunk_bytes: 4,
            ..VaultConfig::default()
        };
        let mut v = CapsuleVault::in_memory(config);
        let id = v
            .create_capsule(ALICE, simple_params(CapsuleKind::TimeLock))
            .unwrap();

        v.upload_chunk(ALICE, ALICE, id, 0, vec![0; 4], false)
            .unwrap();
        let err = v
            .upload_chunk(ALICE, ALICE, id, 1, vec![0; 5], false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExceeded);
    }

    #[test]
    fn test_upload_out_of_order_and_final_marker() {
        let mut v = vault();
        let id = v
            .create_capsule(ALICE, simple_params(CapsuleKind::TimeLock))
            .unwrap();

        v.upload_chunk(ALICE, ALICE, id, 2, vec![2], false).unwrap();
        v.upload_chunk(ALICE, ALICE, id, 0, vec![0], false).unwrap();
        v.upload_chunk(ALICE, ALICE, id, 1, vec![1], true).unwrap();

        let info = v.file_info(ALICE, id).unwrap();
        assert!(info.complete);
        assert_eq!(info.total_chunks, 3);
        assert_eq!(info.stored_chunks, 3);
    }

    #[test]
    fn test_reupload_overwrites_without_changing_total() {
        let mut v = vault();
        let id = v
            .create_capsule(ALICE, simple_params(CapsuleKind::TimeLock))
            .unwrap();

        v.upload_chunk(ALICE, ALICE, id, 0, vec![1], false).unwrap();
        v.upload_chunk(ALICE, ALICE, id, 1, vec![2], true).unwrap();
        v.upload_chunk(ALICE, ALICE, id, 0, vec![9, 9], false)
            .unwrap();

        let info = v.file_info(ALICE, id).unwrap();
        assert_eq!(info.total_chunks, 2);
        assert!(info.complete);
    }

    #[test]
    fn test_upload_to_unknown_capsule() {
        let mut v = vault();
        v.create_capsule(ALICE, simple_params(CapsuleKind::TimeLock))
            .unwrap();
        let err = v
            .upload_chunk(ALICE, ALICE, CapsuleId::from_u64(99), 0, vec![1], false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_contributor_flow() {
        let mut v = vault();
        let mut params = simple_params(CapsuleKind::Collaborative);
        params.max_contributors = 2;
        let id = v.create_capsule(ALICE, params).unwrap();

        v.add_contributor_file(BOB, ALICE, id, vec![1]).unwrap();
        v.add_contributor_file("did:vault:carol", ALICE, id, vec![2])
            .unwrap();
        assert_eq!(v.contributor_count(ALICE, id).unwrap(), 2);
        assert!(v.has_access(ALICE, id, BOB));

        let err = v
            .add_contributor_file("did:vault:dave", ALICE, id, vec![3])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExceeded);

        // Failed attach takes no slot and grants no access
        assert_eq!(v.contributor_count(ALICE, id).unwrap(), 2);
        assert!(!v.has_access(ALICE, id, "did:vault:dave"));
    }

    #[test]
    fn test_duplicate_contributor_rejected() {
        let mut v = vault();
        let mut params = simple_params(CapsuleKind::Collaborative);
        params.max_contributors = 5;
        let id = v.create_capsule(ALICE, params).unwrap();

        v.add_contributor_file(BOB, ALICE, id, vec![1]).unwrap();
        let err = v.add_contributor_file(BOB, ALICE, id, vec![2]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_grant_requires_file_locker() {
        let mut v = vault();
        let id = v
            .create_capsule(ALICE, simple_params(CapsuleKind::TimeLock))
            .unwrap();
        let err = v.grant_access(ALICE, ALICE, id, BOB).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_grant_and_revoke() {
        let mut v = vault();
        let id = v
            .create_capsule(ALICE, simple_params(CapsuleKind::FileLocker))
            .unwrap();

        let err = v.grant_access(BOB, ALICE, id, BOB).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);

        v.grant_access(ALICE, ALICE, id, BOB).unwrap();
        assert!(v.has_access(ALICE, id, BOB));

        v.revoke_access(ALICE, ALICE, id, BOB).unwrap();
        assert!(!v.has_access(ALICE, id, BOB));

        // Absent entry revokes silently; the owner never can be revoked
        v.revoke_access(ALICE, ALICE, id, "did:vault:nobody").unwrap();
        let err = v.revoke_access(ALICE, ALICE, id, ALICE).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_unlock_gate_order() {
        let (mut v, _clock) = vault_at(100);
        let mut params = simple_params(CapsuleKind::TimeLock);
        params.unlock_time = 1_000;
        let id = v.create_capsule(ALICE, params).unwrap();

        // Incomplete beats every later gate
        let err = v.request_unlock(ALICE, ALICE, id, &[0xAB, 0xCD]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        v.upload_chunk(ALICE, ALICE, id, 0, vec![1], true).unwrap();

        // Unauthorized requester
        let err = v.request_unlock(BOB, ALICE, id, &[0xAB, 0xCD]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert!(matches!(err, VaultError::NotAuthorized { .. }));

        // Wrong secret
        let err = v.request_unlock(ALICE, ALICE, id, &[0xFF]).unwrap_err();
        assert!(matches!(err, VaultError::WrongSecret));

        // Time gate still closed
        let err = v.request_unlock(ALICE, ALICE, id, &[0xAB, 0xCD]).unwrap_err();
        assert!(matches!(err, VaultError::TimeLocked { .. }));
        assert!(!v.capsule_info(ALICE, id).unwrap().unlocked);
    }

    #[test]
    fn test_unlock_unknown_capsule() {
        let mut v = vault();
        v.init_store(ALICE).unwrap();
        let err = v
            .request_unlock(ALICE, ALICE, CapsuleId::from_u64(5), &[])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_timelock_end_to_end() {
        let (mut v, clock) = vault_at(1_000);
        let mut params = simple_params(CapsuleKind::TimeLock);
        params.unlock_time = 1_000 + 3_600;
        let id = v.create_capsule(ALICE, params).unwrap();

        v.upload_chunk(ALICE, ALICE, id, 0, vec![1, 2], false).unwrap();
        v.upload_chunk(ALICE, ALICE, id, 1, vec![3, 4], true).unwrap();

        let info = v.file_info(ALICE, id).unwrap();
        assert!(info.complete);
        assert_eq!(info.total_chunks, 2);

        let err = v.request_unlock(ALICE, ALICE, id, &[0xAB, 0xCD]).unwrap_err();
        assert!(matches!(err, VaultError::TimeLocked { .. }));
        assert!(v.unlock_events(ALICE).unwrap().is_empty());

        clock.advance(3_600);
        v.request_unlock(ALICE, ALICE, id, &[0xAB, 0xCD]).unwrap();
        assert!(v.capsule_info(ALICE, id).unwrap().unlocked);

        let events = v.unlock_events(ALICE).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].capsule_id, id);
        assert_eq!(events[0].unlocker, ALICE);
        assert_eq!(events[0].timestamp, 4_600);
    }

    #[test]
    fn test_geo_callback_gates() {
        let mut v = vault();
        let mut params = simple_params(CapsuleKind::GeoLock);
        params.geo = GeoTarget::new(47_600_000, -122_300_000, 100);
        let id = v.create_capsule(ALICE, params).unwrap();
        v.upload_chunk(ALICE, ALICE, id, 0, vec![1], true).unwrap();

        // Only the configured oracle may report
        let err = v
            .oracle_geo_callback(BOB, ALICE, id, 47_600_000, -122_300_000)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);

        // Outside the radius: silent no-op
        v.oracle_geo_callback(ORACLE, ALICE, id, 48_600_000, -122_300_000)
            .unwrap();
        assert!(!v.capsule_info(ALICE, id).unwrap().geo_verified);
        let err = v.request_unlock(ALICE, ALICE, id, &[0xAB, 0xCD]).unwrap_err();
        assert!(matches!(err, VaultError::GeoUnverified(_)));

        // Exactly at the boundary: inclusive
        v.oracle_geo_callback(ORACLE, ALICE, id, 47_600_900, -122_300_000)
            .unwrap();
        assert!(v.capsule_info(ALICE, id).unwrap().geo_verified);
        v.request_unlock(ALICE, ALICE, id, &[0xAB, 0xCD]).unwrap();
    }

    #[test]
    fn test_geo_callback_ignored_when_disabled() {
        let mut v = vault();
        let id = v
            .create_capsule(ALICE, simple_params(CapsuleKind::TimeLock))
            .unwrap();
        // Radius 0: created pre-verified, callback is a no-op
        assert!(v.capsule_info(ALICE, id).unwrap().geo_verified);
        v.oracle_geo_callback(ORACLE, ALICE, id, 0, 0).unwrap();
        assert!(v.capsule_info(ALICE, id).unwrap().geo_verified);
    }

    #[test]
    fn test_unlock_is_idempotent_and_logs_each_pass() {
        let mut v = vault();
        let id = v
            .create_capsule(ALICE, simple_params(CapsuleKind::FileLocker))
            .unwrap();
        v.upload_chunk(ALICE, ALICE, id, 0, vec![1], true).unwrap();

        v.request_unlock(ALICE, ALICE, id, &[0xAB, 0xCD]).unwrap();
        v.request_unlock(ALICE, ALICE, id, &[0xAB, 0xCD]).unwrap();

        assert!(v.capsule_info(ALICE, id).unwrap().unlocked);
        assert_eq!(v.unlock_events(ALICE).unwrap().len(), 2);
    }

    #[test]
    fn test_chunk_read_requires_unlock() {
        let mut v = vault();
        let id = v
            .create_capsule(ALICE, simple_params(CapsuleKind::FileLocker))
            .unwrap();
        v.upload_chunk(ALICE, ALICE, id, 0, vec![7], true).unwrap();

        // Authorized but still locked
        let err = v.file_chunk(ALICE, ALICE, id, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);

        v.request_unlock(ALICE, ALICE, id, &[0xAB, 0xCD]).unwrap();
        assert_eq!(v.file_chunk(ALICE, ALICE, id, 0).unwrap(), vec![7]);

        // Unlocked but unauthorized
        let err = v.file_chunk(BOB, ALICE, id, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);

        // Gap in the index space
        let err = v.file_chunk(ALICE, ALICE, id, 5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_has_access_never_errors() {
        let v = vault();
        assert!(!v.has_access("did:vault:nobody", CapsuleId::from_u64(1), ALICE));

        let mut v = vault();
        v.init_store(ALICE).unwrap();
        assert!(!v.has_access(ALICE, CapsuleId::from_u64(1), ALICE));
    }

    #[test]
    fn test_queries_fail_not_found() {
        let v = vault();
        assert_eq!(
            v.capsule_info(ALICE, CapsuleId::from_u64(1)).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            v.file_info(ALICE, CapsuleId::from_u64(1)).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            v.contributor_count(ALICE, CapsuleId::from_u64(1))
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(v.latest_capsule_id(ALICE).unwrap_err().kind(), ErrorKind::NotFound);
        assert!(v.unlock_events(ALICE).unwrap().is_empty());
    }

    #[test]
    fn test_failed_unlock_mutates_nothing() {
        let (mut v, _clock) = vault_at(0);
        let mut params = simple_params(CapsuleKind::TimeLock);
        params.unlock_time = 10_000;
        let id = v.create_capsule(ALICE, params).unwrap();
        v.upload_chunk(ALICE, ALICE, id, 0, vec![1], true).unwrap();

        let before = v.capsule_info(ALICE, id).unwrap();
        let _ = v.request_unlock(ALICE, ALICE, id, &[0xAB, 0xCD]).unwrap_err();
        let after = v.capsule_info(ALICE, id).unwrap();

        assert_eq!(before, after);
        assert!(v.unlock_events(ALICE).unwrap().is_empty());
    }
}
