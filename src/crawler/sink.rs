//! Per-run accumulator of newly created lead ids

use std::collections::HashSet;

use uuid::Uuid;

/// Collects lead ids created during one campaign run.
///
/// Keeps insertion order and ignores repeats. It also remembers every
/// external identifier seen in the run so an identifier repeated on a later
/// page is skipped without a store round trip.
#[derive(Debug, Default)]
pub struct ResultSink {
    ids: Vec<Uuid>,
    id_set: HashSet<Uuid>,
    seen: HashSet<String>,
}

impl ResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a lead id. Returns false if it was already present.
    pub fn push(&mut self, id: Uuid) -> bool {
        if !self.id_set.insert(id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Mark an external identifier as seen in this run.
    /// Returns false if it had been seen before.
    pub fn mark_seen(&mut self, external_id: &str) -> bool {
        if self.seen.contains(external_id) {
            return false;
        }
        self.seen.insert(external_id.to_string())
    }

    pub fn ids(&self) -> &[Uuid] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Take the accumulated ids, leaving the sink empty
    pub fn drain(&mut self) -> Vec<Uuid> {
        self.id_set.clear();
        std::mem::take(&mut self.ids)
    }
}
