//! Per-run identifier blacklist.

use std::collections::HashSet;

use crate::core::invariants::{InvariantKind, InvariantViolation};
use crate::core::types::ItemId;

/// In-memory set of every identifier observed this run.
///
/// Once observed, an identifier is permanently blacklisted for the run; the
/// same identifier must never re-enter the decide/execute path. Lives only
/// for the run's lifetime, never persisted.
#[derive(Debug, Default)]
pub struct Blacklist {
    seen: HashSet<ItemId>,
}

impl Blacklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.seen.contains(id)
    }

    /// Record an identifier as observed.
    ///
    /// The caller must have checked [`contains`](Self::contains) first; an
    /// insert of an already-present identifier means the controller
    /// double-processed an item and is a run-halting fault.
    pub fn observe(&mut self, id: ItemId) -> Result<(), InvariantViolation> {
        if !self.seen.insert(id.clone()) {
            return Err(InvariantViolation::new(
                InvariantKind::DuplicateObservation,
                format!("identifier {id} inserted twice"),
            ));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
