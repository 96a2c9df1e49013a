//! Per-owner capsule store: id allocation, capsule map, unlock-event log

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::capsule::Capsule;
use crate::types::{CapsuleId, UnlockEvent};

/// All capsule state belonging to one owner identity
///
/// Stores are sharded per owner, created idempotently on the owner's first
/// write, and never torn down. The id counter is exclusive to the shard and
/// strictly increasing; the event log is append-only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OwnerStore {
    capsules: BTreeMap<CapsuleId, Capsule>,
    id_counter: u64,
    events: Vec<UnlockEvent>,
}

impl OwnerStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next capsule id, consuming it.
    ///
    /// The counter never decrements and ids are never reused; the first
    /// allocation returns id 1.
    pub(crate) fn allocate_id(&mut self) -> CapsuleId {
        self.id_counter += 1;
        CapsuleId::from_u64(self.id_counter)
    }

    /// Insert a freshly created capsule under its allocated id
    pub(crate) fn insert(&mut self, capsule: Capsule) {
        self.capsules.insert(capsule.id(), capsule);
    }

    /// Look up a capsule by id
    pub fn get(&self, id: CapsuleId) -> Option<&Capsule> {
        self.capsules.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: CapsuleId) -> Option<&mut Capsule> {
        self.capsules.get_mut(&id)
    }

    /// Most recently allocated id, or `None` while the counter is zero
    pub fn latest_id(&self) -> Option<CapsuleId> {
        if self.id_counter == 0 {
            None
        } else {
            Some(CapsuleId::from_u64(self.id_counter))
        }
    }

    /// Number of capsules in this store
    pub fn len(&self) -> usize {
        self.capsules.len()
    }

    /// Whether this store holds no capsules
    pub fn is_empty(&self) -> bool {
        self.capsules.is_empty()
    }

    /// Append an unlock record to the log
    pub(crate) fn record_unlock(&mut self, event: UnlockEvent) {
        self.events.push(event);
    }

    /// The append-only unlock-event log, oldest first
    pub fn events(&self) -> &[UnlockEvent] {
        &self.events
    }
}
