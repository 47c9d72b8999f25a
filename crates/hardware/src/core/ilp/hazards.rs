//! Memory Hazard Tracker.
//!
//! Keeps the multiset of memory ranges claimed by in-flight instructions, ordered by
//! start address. A candidate conflicts with a tracked range when the two share a byte
//! and at least one of them writes. Adjacent ranges never conflict.
//!
//! Only the scheduling thread touches the tracker, so it needs no synchronization.

use std::collections::BTreeMap;

use crate::common::range::MemoryRange;

/// Multiset of claimed memory ranges.
#[derive(Debug, Default, Clone)]
pub struct MemoryHazardTracker {
    by_start: BTreeMap<u64, Vec<MemoryRange>>,
    len: usize,
}

impl MemoryHazardTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `range`. Identical ranges may be claimed more than once.
    pub fn add_range(&mut self, range: MemoryRange) {
        self.by_start.entry(range.address).or_default().push(range);
        self.len += 1;
    }

    /// Releases one claim equal to `range`.
    ///
    /// # Returns
    ///
    /// `false` if no such claim was held.
    pub fn remove_range(&mut self, range: &MemoryRange) -> bool {
        let Some(list) = self.by_start.get_mut(&range.address) else {
            return false;
        };
        let Some(pos) = list.iter().position(|held| held == range) else {
            return false;
        };
        let _ = list.swap_remove(pos);
        if list.is_empty() {
            let _ = self.by_start.remove(&range.address);
        }
        self.len -= 1;
        true
    }

    /// True if `range` conflicts with any claimed range.
    pub fn overlaps(&self, range: &MemoryRange) -> bool {
        if range.size == 0 {
            return false;
        }
        // Only claims starting before the candidate's end can intersect it.
        self.by_start
            .range(..range.end())
            .flat_map(|(_, list)| list.iter())
            .any(|held| held.conflicts_with(range))
    }

    /// True if any of `ranges` conflicts with a claimed range.
    pub fn overlaps_any(&self, ranges: &[MemoryRange]) -> bool {
        ranges.iter().any(|range| self.overlaps(range))
    }

    /// Number of claims held.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True when nothing is claimed.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}
