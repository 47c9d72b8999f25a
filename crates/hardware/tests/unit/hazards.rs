//! # Memory Hazard Tracker Tests
//!
//! The tracker is a multiset: identical claims stack, and releasing one leaves the rest.

use proptest::prelude::*;
use scmsim_core::common::{MemoryRange, RangeAccess};
use scmsim_core::core::ilp::MemoryHazardTracker;

#[test]
fn adjacent_ranges_are_not_conflicts() {
    let mut tracker = MemoryHazardTracker::new();
    tracker.add_range(MemoryRange::write(64, 64));
    assert!(!tracker.overlaps(&MemoryRange::write(0, 64)));
    assert!(!tracker.overlaps(&MemoryRange::write(128, 64)));
    assert!(tracker.overlaps(&MemoryRange::read(127, 1)));
    assert!(tracker.overlaps(&MemoryRange::read(0, 65)));
}

#[test]
fn contained_and_containing_ranges_conflict() {
    let mut tracker = MemoryHazardTracker::new();
    tracker.add_range(MemoryRange::write(100, 10));
    assert!(tracker.overlaps(&MemoryRange::read(102, 2)));
    assert!(tracker.overlaps(&MemoryRange::read(50, 200)));
}

#[test]
fn readers_do_not_conflict_with_readers() {
    let mut tracker = MemoryHazardTracker::new();
    tracker.add_range(MemoryRange::read(0, 64));
    assert!(!tracker.overlaps(&MemoryRange::read(32, 64)));
    assert!(tracker.overlaps(&MemoryRange::write(32, 64)));
}

#[test]
fn duplicate_claims_are_counted() {
    let mut tracker = MemoryHazardTracker::new();
    let range = MemoryRange::read(8, 8);
    tracker.add_range(range);
    tracker.add_range(range);
    assert_eq!(tracker.len(), 2);

    assert!(tracker.remove_range(&range));
    assert!(tracker.overlaps(&MemoryRange::write(8, 1)));
    assert!(tracker.remove_range(&range));
    assert!(tracker.is_empty());
    assert!(!tracker.remove_range(&range));
}

#[test]
fn empty_range_never_conflicts() {
    let mut tracker = MemoryHazardTracker::new();
    tracker.add_range(MemoryRange::write(0, 1024));
    assert!(!tracker.overlaps(&MemoryRange::write(10, 0)));
}

fn range() -> impl Strategy<Value = MemoryRange> {
    (0u64..512, 0u64..128, any::<bool>()).prop_map(|(address, size, write)| {
        if write {
            MemoryRange::write(address, size)
        } else {
            MemoryRange::read(address, size)
        }
    })
}

proptest! {
    #[test]
    fn overlap_matches_a_byte_scan(claims in prop::collection::vec(range(), 0..12), candidate in range()) {
        let mut tracker = MemoryHazardTracker::new();
        for claim in &claims {
            tracker.add_range(*claim);
        }
        let shares_byte = |a: &MemoryRange, b: &MemoryRange| {
            (a.address..a.end()).any(|byte| byte >= b.address && byte < b.end())
        };
        let expected = claims.iter().any(|claim| {
            shares_byte(claim, &candidate) && (claim.access == RangeAccess::Write || candidate.access == RangeAccess::Write)
        });
        prop_assert_eq!(tracker.overlaps(&candidate), expected);
    }

    #[test]
    fn releasing_every_claim_empties_the_tracker(claims in prop::collection::vec(range(), 0..12)) {
        let mut tracker = MemoryHazardTracker::new();
        for claim in &claims {
            tracker.add_range(*claim);
        }
        for claim in claims.iter().rev() {
            prop_assert!(tracker.remove_range(claim));
        }
        prop_assert!(tracker.is_empty());
    }
}
