//! Change detection between the stored snapshot and a fresh extraction.
//!
//! A record is new when its key is absent from the previous snapshot.
//! Against an empty snapshot (first run, or an unreadable file) every
//! current record is new, so the first cycle for a source sends one burst
//! covering everything on the page.

use std::collections::HashSet;

use crate::models::{Record, Snapshot};

/// Records found now but absent before, plus the keys that went away.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffResult {
    /// New records, in extraction order
    pub added: Vec<Record>,
    /// Keys present in the snapshot but missing from the page
    pub removed: Vec<String>,
}

impl DiffResult {
    pub fn has_new(&self) -> bool {
        !self.added.is_empty()
    }
}

/// The ordered subsequence of `current` whose keys are not in `previous`.
///
/// Duplicate keys in `current` are reported once, at their first position.
pub fn detect_new(current: &[Record], previous: &Snapshot) -> Vec<Record> {
    let known = previous.keys();
    let mut reported: HashSet<&str> = HashSet::new();
    let mut added = Vec::new();

    for record in current {
        let key = record.key.as_str();
        if !known.contains(key) && reported.insert(key) {
            added.push(record.clone());
        }
    }
    added
}

/// Convenience function computing both directions of the diff.
pub fn calculate_diff(previous: &Snapshot, current: &[Record]) -> DiffResult {
    let current_keys: HashSet<&str> = current.iter().map(|r| r.key.as_str()).collect();
    let removed = previous
        .records
        .iter()
        .filter(|r| !current_keys.contains(r.key.as_str()))
        .map(|r| r.key.clone())
        .collect();

    DiffResult {
        added: detect_new(current, previous),
        removed,
    }
}
