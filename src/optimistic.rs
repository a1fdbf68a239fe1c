//! Local optimistic overlay on top of the authoritative record set.
//!
//! A write is applied locally before the store acknowledges it. Each apply
//! gets a version; only the latest version for a record may confirm or
//! revert it, so a late completion of an older write never clobbers a newer
//! local change.

use std::collections::HashMap;

use crate::models::CalendarRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Confirmed,
    Reverted,
    /// A newer write for the same record is pending; nothing changed.
    Stale,
}

#[derive(Debug, Clone)]
struct Pending<R> {
    version: u64,
    previous: Option<R>,
    /// `None` marks a local deletion.
    current: Option<R>,
}

#[derive(Debug, Clone)]
pub struct OptimisticLedger<R> {
    pending: HashMap<String, Pending<R>>,
    next_version: u64,
}

impl<R> Default for OptimisticLedger<R> {
    fn default() -> Self {
        OptimisticLedger {
            pending: HashMap::new(),
            next_version: 1,
        }
    }
}

impl<R: CalendarRecord> OptimisticLedger<R> {
    pub fn new() -> Self {
        OptimisticLedger::default()
    }

    /// Record a local change to `id` and return its version.
    pub fn apply(&mut self, id: &str, previous: Option<R>, current: Option<R>) -> u64 {
        let version = self.next_version;
        self.next_version += 1;
        self.pending.insert(
            id.to_string(),
            Pending {
                version,
                previous,
                current,
            },
        );
        version
    }

    /// Drop the local change once the store has accepted it.
    pub fn confirm(&mut self, id: &str, version: u64) -> Completion {
        if !self.is_current(id, version) {
            return Completion::Stale;
        }
        self.pending.remove(id);
        Completion::Confirmed
    }

    /// Drop the local change so the authoritative record shows again.
    ///
    /// Returns the value the record had before the change.
    pub fn revert(&mut self, id: &str, version: u64) -> (Completion, Option<R>) {
        if !self.is_current(id, version) {
            return (Completion::Stale, None);
        }
        let previous = self.pending.remove(id).and_then(|p| p.previous);
        (Completion::Reverted, previous)
    }

    /// Whether `version` is the newest pending change for `id`.
    pub fn is_current(&self, id: &str, version: u64) -> bool {
        self.pending.get(id).map(|p| p.version) == Some(version)
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Overlay pending changes on `records`.
    pub fn project(&self, records: &[R]) -> Vec<R> {
        let mut projected: Vec<R> = records
            .iter()
            .filter_map(|record| match self.pending.get(record.id()) {
                Some(pending) => pending.current.clone(),
                None => Some(record.clone()),
            })
            .collect();

        let mut created: Vec<(&u64, &R)> = self
            .pending
            .values()
            .filter_map(|p| p.current.as_ref().map(|current| (&p.version, current)))
            .filter(|(_, current)| records.iter().all(|r| r.id() != current.id()))
            .collect();
        created.sort_by_key(|(version, _)| **version);
        projected.extend(created.into_iter().map(|(_, current)| current.clone()));

        projected
    }
}
