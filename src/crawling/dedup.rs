//! Run-scoped duplicate ledger
//!
//! Owned by the orchestrator for a single run and lent mutably to each
//! category walk, so a title+price pair seen under one category is also a
//! duplicate under the next.

use std::collections::HashSet;

use crate::domain::product::Fingerprint;

#[derive(Debug, Default)]
pub struct DedupLedger {
    seen: HashSet<Fingerprint>,
}

impl DedupLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn seen(&self, fingerprint: &Fingerprint) -> bool {
        self.seen.contains(fingerprint)
    }

    /// Record a fingerprint. Returns `true` when it was not already present.
    pub fn mark(&mut self, fingerprint: Fingerprint) -> bool {
        self.seen.insert(fingerprint)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
