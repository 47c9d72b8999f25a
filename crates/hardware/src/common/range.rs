//! Memory location ranges.

use std::fmt;

/// Direction of a claimed memory range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RangeAccess {
    /// The instruction only reads the range.
    Read,
    /// The instruction writes (part of) the range.
    Write,
}

/// Half-open byte interval `[address, address + size)` claimed by one instruction.
///
/// Ordering compares the start address first so ranges can key an ordered set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryRange {
    /// First byte of the range.
    pub address: u64,
    /// Length in bytes.
    pub size: u64,
    /// Read or write claim.
    pub access: RangeAccess,
}

impl MemoryRange {
    /// Creates a read claim.
    pub const fn read(address: u64, size: u64) -> Self {
        Self {
            address,
            size,
            access: RangeAccess::Read,
        }
    }

    /// Creates a write claim.
    pub const fn write(address: u64, size: u64) -> Self {
        Self {
            address,
            size,
            access: RangeAccess::Write,
        }
    }

    /// One past the last byte.
    pub const fn end(&self) -> u64 {
        self.address.saturating_add(self.size)
    }

    /// True if the two intervals share at least one byte.
    ///
    /// Adjacent ranges do not overlap, and empty ranges overlap nothing.
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.size > 0 && other.size > 0 && self.address < other.end() && other.address < self.end()
    }

    /// True if the two claims may not be held at the same time.
    pub fn conflicts_with(&self, other: &Self) -> bool {
        self.overlaps(other)
            && (self.access == RangeAccess::Write || other.access == RangeAccess::Write)
    }
}

impl fmt::Display for MemoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.access {
            RangeAccess::Read => "R",
            RangeAccess::Write => "W",
        };
        write!(f, "{tag}[{:#x}, {:#x})", self.address, self.end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjacent_ranges_do_not_overlap() {
        let a = MemoryRange::write(0, 64);
        let b = MemoryRange::write(64, 64);
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn test_identical_and_contained_ranges_overlap() {
        let a = MemoryRange::write(128, 64);
        assert!(a.overlaps(&a));
        assert!(a.overlaps(&MemoryRange::read(130, 2)));
        assert!(MemoryRange::read(0, 1024).overlaps(&a));
    }

    #[test]
    fn test_read_read_never_conflicts() {
        let a = MemoryRange::read(0, 64);
        let b = MemoryRange::read(32, 64);
        assert!(a.overlaps(&b));
        assert!(!a.conflicts_with(&b));
        assert!(a.conflicts_with(&MemoryRange::write(32, 64)));
    }
}
