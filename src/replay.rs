//! Replay/live reconciliation for backends that multiplex historical state
//! and fresh events on one channel.
//!
//! A cold watch subscription against such a backend first replays the entire
//! current state before emitting live updates. Without extra bookkeeping
//! every watcher restart would misreport that replay as a burst of fresh
//! changes. The fix is a per-key revision cache: a drain phase seeds it with
//! the current revision of every key, after which an event is only trusted
//! as novel when its revision advances past the cached one.
//!
//! This is a recurring pattern for any broker with cold-replay semantics, so
//! it lives here as a reusable routine instead of inside one adapter.

use dashmap::DashMap;

/// Per-key revision cache distinguishing replayed state from real changes.
///
/// Owned by exactly one adapter instance and persists across watch calls on
/// it, so a second watch on the same adapter does not re-report changes the
/// first one already consumed. Access is synchronized; an adapter shared
/// across concurrently-running watch calls stays correct.
#[derive(Debug, Default)]
pub struct RevisionSync {
    revisions: DashMap<String, u64>,
}

impl RevisionSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain phase: record a key's current revision without treating it as a
    /// caller-visible change.
    pub fn seed(
        &self,
        key: impl Into<String>,
        revision: u64,
    ) {
        self.revisions.insert(key.into(), revision);
    }

    /// Live phase: returns true iff `revision` advances past the cached
    /// revision for `key` - i.e. the event is a real change rather than a
    /// replay of known state. The cache is updated either way; a key never
    /// seen before counts as a change.
    pub fn observe(
        &self,
        key: &str,
        revision: u64,
    ) -> bool {
        match self.revisions.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                if revision > *entry.get() {
                    entry.insert(revision);
                    true
                } else {
                    false
                }
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(revision);
                true
            }
        }
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }
}
