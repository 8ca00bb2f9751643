//! Slot-keyed registry of worker handles.
//!
//! The supervisor is the only writer, so the registry carries no locking.
//! Entries are kept in slot order so snapshots list workers deterministically.

use std::collections::BTreeMap;

use crate::models::worker::{SlotId, WorkerHandle};

/// In-memory mapping from slot id to the slot's current worker handle.
#[derive(Debug, Default, Clone)]
pub struct WorkerRegistry {
    slots: BTreeMap<SlotId, WorkerHandle>,
}

impl WorkerRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the handle for its slot, returning the previous
    /// occupant.
    pub fn insert(&mut self, handle: WorkerHandle) -> Option<WorkerHandle> {
        self.slots.insert(handle.slot, handle)
    }

    /// Handle currently occupying `slot`.
    #[must_use]
    pub fn get(&self, slot: SlotId) -> Option<&WorkerHandle> {
        self.slots.get(&slot)
    }

    /// Mutate the handle for `slot` in place.
    ///
    /// Returns `false` when the slot is unknown.
    pub fn update<F>(&mut self, slot: SlotId, apply: F) -> bool
    where
        F: FnOnce(&mut WorkerHandle),
    {
        match self.slots.get_mut(&slot) {
            Some(handle) => {
                apply(handle);
                true
            }
            None => false,
        }
    }

    /// Permanently retire a slot. Ordinary exits keep their entry.
    pub fn remove(&mut self, slot: SlotId) -> Option<WorkerHandle> {
        self.slots.remove(&slot)
    }

    /// Handles in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &WorkerHandle> {
        self.slots.values()
    }

    /// Handles whose process may still be running.
    pub fn live(&self) -> impl Iterator<Item = &WorkerHandle> {
        self.iter().filter(|h| h.status.is_live())
    }

    /// Number of registered slots, exited ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
