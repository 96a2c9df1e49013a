//! Capsule entity: release policy, metadata, access list, and chunk map
//!
//! A capsule holds one opaque payload assembled from bounded-size chunks and
//! the policy deciding when that payload is released. The entity enforces the
//! local invariants (monotonic flags, contributor cap, owner access); the
//! cross-capsule rules live in [`crate::engine`].

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};
use crate::types::{CapsuleId, CapsuleInfo, CapsuleKind, CapsuleParams, FileInfo, GeoTarget};

/// One conditional-release capsule
///
/// Mutations go through the methods below so the invariants hold at every
/// commit point: `unlocked`, `geo_verified`, and `complete` only ever go
/// false→true, the owner always stays in the access list, and the
/// contributor list never exceeds its cap or repeats an identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capsule {
    id: CapsuleId,
    kind: CapsuleKind,
    owner: String,
    unlock_time: i64,
    geo: GeoTarget,
    max_contributors: u32,
    geo_verified: bool,
    unlocked: bool,
    complete: bool,
    contributors: Vec<String>,
    contributions: HashMap<String, Vec<u8>>,
    access: HashMap<String, bool>,
    chunks: BTreeMap<u32, Vec<u8>>,
    total_chunks: u32,
    declared_size: u64,
    secret: Vec<u8>,
    mime: String,
}

impl Capsule {
    /// Create a capsule from validated params.
    ///
    /// The geo gate starts pre-verified when the radius is 0 (disabled), and
    /// the owner is seeded into the access list with `true`.
    pub(crate) fn new(id: CapsuleId, owner: &str, params: CapsuleParams) -> Self {
        let mut access = HashMap::new();
        access.insert(owner.to_string(), true);

        Self {
            id,
            kind: params.kind,
            owner: owner.to_string(),
            unlock_time: params.unlock_time,
            geo_verified: !params.geo.is_enabled(),
            geo: params.geo,
            max_contributors: params.max_contributors,
            unlocked: false,
            complete: false,
            contributors: Vec::new(),
            contributions: HashMap::new(),
            access,
            chunks: BTreeMap::new(),
            total_chunks: 0,
            declared_size: params.declared_size,
            secret: params.secret,
            mime: params.mime,
        }
    }

    /// Capsule id
    pub fn id(&self) -> CapsuleId {
        self.id
    }

    /// Release-policy family (immutable after creation)
    pub fn kind(&self) -> CapsuleKind {
        self.kind
    }

    /// Owner identity
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Unix timestamp the capsule opens at (0 = time gate disabled)
    pub fn unlock_time(&self) -> i64 {
        self.unlock_time
    }

    /// Geo-proximity target
    pub fn geo(&self) -> &GeoTarget {
        &self.geo
    }

    /// Whether the oracle has attested proximity
    pub fn is_geo_verified(&self) -> bool {
        self.geo_verified
    }

    /// Whether all release conditions have been satisfied
    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    /// Whether the final chunk marker has been set
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub(crate) fn secret(&self) -> &[u8] {
        &self.secret
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Chunk Map
    // ═══════════════════════════════════════════════════════════════════════

    /// Write a chunk at `index`, overwriting any previous bytes there.
    ///
    /// `total_chunks` tracks 1 + the highest index seen. Indices need not be
    /// contiguous; holes surface as `NotFound` on read, never at write time.
    /// A final marker sets `complete`, which never reverts.
    pub(crate) fn put_chunk(&mut self, index: u32, bytes: Vec<u8>, is_final: bool) {
        self.chunks.insert(index, bytes);
        self.total_chunks = self.total_chunks.max(index + 1);
        if is_final {
            self.complete = true;
        }
    }

    /// Read the chunk at `index`, if that index was ever written
    pub fn chunk(&self, index: u32) -> Option<&[u8]> {
        self.chunks.get(&index).map(Vec::as_slice)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Contributors
    // ═══════════════════════════════════════════════════════════════════════

    /// Attach a contributor payload and grant the contributor access.
    ///
    /// # Errors
    ///
    /// `WrongKind` unless the capsule is Collaborative, `ContributorLimit`
    /// once the cap is reached, `DuplicateContributor` if the identity
    /// already holds a slot. Nothing mutates on failure.
    pub(crate) fn add_contribution(&mut self, contributor: &str, bytes: Vec<u8>) -> VaultResult<()> {
        if self.kind != CapsuleKind::Collaborative {
            return Err(VaultError::WrongKind {
                expected: CapsuleKind::Collaborative,
                actual: self.kind,
            });
        }
        if self.contributors.len() as u32 >= self.max_contributors {
            return Err(VaultError::ContributorLimit(self.max_contributors));
        }
        if self.contributions.contains_key(contributor) {
            return Err(VaultError::DuplicateContributor(contributor.to_string()));
        }

        self.contributors.push(contributor.to_string());
        self.contributions.insert(contributor.to_string(), bytes);
        self.access.insert(contributor.to_string(), true);
        Ok(())
    }

    /// Contributor identities in attachment order
    pub fn contributors(&self) -> &[String] {
        &self.contributors
    }

    /// Number of contributor slots taken
    pub fn contributor_count(&self) -> u32 {
        self.contributors.len() as u32
    }

    /// Payload attached by `contributor`, if any
    pub fn contribution(&self, contributor: &str) -> Option<&[u8]> {
        self.contributions.get(contributor).map(Vec::as_slice)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Access List
    // ═══════════════════════════════════════════════════════════════════════

    /// Grant `grantee` access. FileLocker capsules only; upsert is idempotent.
    pub(crate) fn grant(&mut self, grantee: &str) -> VaultResult<()> {
        if self.kind != CapsuleKind::FileLocker {
            return Err(VaultError::WrongKind {
                expected: CapsuleKind::FileLocker,
                actual: self.kind,
            });
        }
        self.access.insert(grantee.to_string(), true);
        Ok(())
    }

    /// Remove `revokee` from the access list.
    ///
    /// Revoking the owner fails `SelfRevoke`; removing an absent entry is a
    /// silent no-op.
    pub(crate) fn revoke(&mut self, revokee: &str) -> VaultResult<()> {
        if revokee == self.owner {
            return Err(VaultError::SelfRevoke);
        }
        self.access.remove(revokee);
        Ok(())
    }

    /// Whether `who` currently holds access
    pub fn has_access(&self, who: &str) -> bool {
        self.access.get(who).copied().unwrap_or(false)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // State Transitions
    // ═══════════════════════════════════════════════════════════════════════

    /// One-way transition set by the oracle callback
    pub(crate) fn mark_geo_verified(&mut self) {
        self.geo_verified = true;
    }

    /// One-way transition set once the full policy passes
    pub(crate) fn mark_unlocked(&mut self) {
        self.unlocked = true;
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Snapshots
    // ═══════════════════════════════════════════════════════════════════════

    /// Policy and state snapshot (no secret, no payload bytes)
    pub fn info(&self) -> CapsuleInfo {
        CapsuleInfo {
            id: self.id,
            kind: self.kind,
            owner: self.owner.clone(),
            unlock_time: self.unlock_time,
            geo: self.geo,
            max_contributors: self.max_contributors,
            contributor_count: self.contributor_count(),
            geo_verified: self.geo_verified,
            unlocked: self.unlocked,
            complete: self.complete,
        }
    }

    /// Payload metadata snapshot
    pub fn file_info(&self) -> FileInfo {
        FileInfo {
            mime: self.mime.clone(),
            declared_size: self.declared_size,
            total_chunks: self.total_chunks,
            stored_chunks: self.chunks.len() as u32,
            complete: self.complete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "did:vault:alice";

    fn capsule(kind: CapsuleKind) -> Capsule {
        let mut params = CapsuleParams::new(kind, "application/octet-stream");
        params.max_contributors = 2;
        Capsule::new(CapsuleId::from_u64(1), OWNER, params)
    }

    #[test]
    fn test_owner_seeded_into_access_list() {
        let c = capsule(CapsuleKind::TimeLock);
        assert!(c.has_access(OWNER));
        assert!(!c.has_access("did:vault:bob"));
    }

    #[test]
    fn test_geo_gate_starts_verified_when_disabled() {
        let c = capsule(CapsuleKind::TimeLock);
        assert!(c.is_geo_verified());

        let mut params = CapsuleParams::new(CapsuleKind::GeoLock, "image/png");
        params.geo = GeoTarget::new(47_600_000, -122_300_000, 100);
        let c = Capsule::new(CapsuleId::from_u64(2), OWNER, params);
        assert!(!c.is_geo_verified());
    }

    #[test]
    fn test_put_chunk_tracks_total() {
        let mut c = capsule(CapsuleKind::FileLocker);
        c.put_chunk(0, vec![1], false);
        c.put_chunk(4, vec![2], false);
        assert_eq!(c.file_info().total_chunks, 5);
        assert_eq!(c.file_info().stored_chunks, 2);

        // Re-upload of a lower index never shrinks total_chunks
        c.put_chunk(1, vec![3], false);
        assert_eq!(c.file_info().total_chunks, 5);
    }

    #[test]
    fn test_put_chunk_overwrites() {
        let mut c = capsule(CapsuleKind::FileLocker);
        c.put_chunk(0, vec![1, 2, 3], false);
        c.put_chunk(0, vec![9], false);
        assert_eq!(c.chunk(0), Some(&[9u8][..]));
        assert_eq!(c.file_info().total_chunks, 1);
    }

    #[test]
    fn test_complete_is_monotonic() {
        let mut c = capsule(CapsuleKind::FileLocker);
        c.put_chunk(0, vec![1], true);
        assert!(c.is_complete());

        // A later non-final write must not revert completeness
        c.put_chunk(1, vec![2], false);
        assert!(c.is_complete());
    }

    #[test]
    fn test_chunk_holes_read_as_none() {
        let mut c = capsule(CapsuleKind::FileLocker);
        c.put_chunk(3, vec![1], false);
        assert!(c.chunk(0).is_none());
        assert!(c.chunk(2).is_none());
        assert!(c.chunk(3).is_some());
    }

    #[test]
    fn test_contribution_cap_and_duplicates() {
        let mut c = capsule(CapsuleKind::Collaborative);
        c.add_contribution("did:vault:bob", vec![1]).unwrap();
        c.add_contribution("did:vault:carol", vec![2]).unwrap();

        let err = c.add_contribution("did:vault:dave", vec![3]).unwrap_err();
        assert!(matches!(err, VaultError::ContributorLimit(2)));

        // Cap check precedes the duplicate check once the list is full
        let err = c.add_contribution("did:vault:bob", vec![4]).unwrap_err();
        assert!(matches!(err, VaultError::ContributorLimit(_)));
    }

    #[test]
    fn test_duplicate_contributor_before_cap() {
        let mut c = capsule(CapsuleKind::Collaborative);
        c.add_contribution("did:vault:bob", vec![1]).unwrap();
        let err = c.add_contribution("did:vault:bob", vec![2]).unwrap_err();
        assert!(matches!(err, VaultError::DuplicateContributor(_)));
        assert_eq!(c.contributor_count(), 1);
    }

    #[test]
    fn test_contribution_grants_access() {
        let mut c = capsule(CapsuleKind::Collaborative);
        assert!(!c.has_access("did:vault:bob"));
        c.add_contribution("did:vault:bob", vec![1]).unwrap();
        assert!(c.has_access("did:vault:bob"));
        assert_eq!(c.contribution("did:vault:bob"), Some(&[1u8][..]));
        assert_eq!(c.contributors(), ["did:vault:bob".to_string()]);
    }

    #[test]
    fn test_contribution_rejected_on_wrong_kind() {
        let mut c = capsule(CapsuleKind::TimeLock);
        let err = c.add_contribution("did:vault:bob", vec![1]).unwrap_err();
        assert!(matches!(err, VaultError::WrongKind { .. }));
    }

    #[test]
    fn test_grant_only_on_file_locker() {
        let mut c = capsule(CapsuleKind::FileLocker);
        c.grant("did:vault:bob").unwrap();
        assert!(c.has_access("did:vault:bob"));

        // Granting twice stays idempotent
        c.grant("did:vault:bob").unwrap();
        assert!(c.has_access("did:vault:bob"));

        let mut c = capsule(CapsuleKind::TimeLock);
        let err = c.grant("did:vault:bob").unwrap_err();
        assert!(matches!(err, VaultError::WrongKind { .. }));
    }

    #[test]
    fn test_revoke_semantics() {
        let mut c = capsule(CapsuleKind::FileLocker);
        c.grant("did:vault:bob").unwrap();
        c.revoke("did:vault:bob").unwrap();
        assert!(!c.has_access("did:vault:bob"));

        // Absent entry: silent no-op
        c.revoke("did:vault:nobody").unwrap();

        // Owner entry: rejected
        let err = c.revoke(OWNER).unwrap_err();
        assert!(matches!(err, VaultError::SelfRevoke));
        assert!(c.has_access(OWNER));
    }

    #[test]
    fn test_one_way_transitions() {
        let mut c = capsule(CapsuleKind::GeoLock);
        assert!(!c.is_unlocked());
        c.mark_geo_verified();
        c.mark_unlocked();
        assert!(c.is_geo_verified());
        assert!(c.is_unlocked());
    }

    #[test]
    fn test_info_snapshot() {
        let mut c = capsule(CapsuleKind::Collaborative);
        c.add_contribution("did:vault:bob", vec![1]).unwrap();
        let info = c.info();
        assert_eq!(info.kind, CapsuleKind::Collaborative);
        assert_eq!(info.owner, OWNER);
        assert_eq!(info.contributor_count, 1);
        assert!(!info.unlocked);
    }
}
