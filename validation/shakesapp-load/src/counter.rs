//! Per-term usage counter shared by all virtual users.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counts how often each vocabulary term was requested.
///
/// The key set is fixed at construction, so increments only touch an
/// `AtomicU64` and never take a lock.
#[derive(Debug)]
pub struct UsageCounter {
    counts: HashMap<String, AtomicU64>,
    unknown: AtomicU64,
}

impl UsageCounter {
    /// Create a counter with a zeroed slot for every term.
    pub fn new<S: AsRef<str>>(terms: &[S]) -> Self {
        let counts = terms
            .iter()
            .map(|t| (t.as_ref().to_string(), AtomicU64::new(0)))
            .collect();
        Self {
            counts,
            unknown: AtomicU64::new(0),
        }
    }

    /// Record one request for `term`.
    ///
    /// Terms outside the vocabulary are tallied separately and return `false`.
    pub fn increment(&self, term: &str) -> bool {
        match self.counts.get(term) {
            Some(slot) => {
                slot.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => {
                self.unknown.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn get(&self, term: &str) -> u64 {
        self.counts
            .get(term)
            .map(|slot| slot.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Sum of all per-term counts.
    pub fn total(&self) -> u64 {
        self.counts
            .values()
            .map(|slot| slot.load(Ordering::Relaxed))
            .sum()
    }

    /// Increments for terms that were not in the vocabulary.
    pub fn unknown(&self) -> u64 {
        self.unknown.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every count, ordered by term.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counts
            .iter()
            .map(|(term, slot)| (term.clone(), slot.load(Ordering::Relaxed)))
            .collect()
    }
}
