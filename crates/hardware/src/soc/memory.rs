//! Flat Shared Memory.
//!
//! This module implements the machine's single address space. It provides:
//! 1. **Storage:** Zero-initialized, lock-free byte storage shared by every execution unit.
//! 2. **Bounds Checking:** Every access is validated and reported as `MemoryOutOfBounds`.
//! 3. **Host Access:** Loading and inspecting contents before and after a run.
//!
//! Concurrent accesses are never conflicting: the ILP controller only admits instructions
//! whose claimed ranges are disjoint unless both only read.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::common::error::{SimError, SimResult};

/// Byte-addressed memory starting at address zero.
#[derive(Debug)]
pub struct Memory {
    bytes: Box<[AtomicU8]>,
}

impl Memory {
    /// Allocates `size` zeroed bytes.
    pub fn new(size: usize) -> Self {
        Self {
            bytes: (0..size).map(|_| AtomicU8::new(0)).collect(),
        }
    }

    /// Size of the address space in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True for a zero-sized address space.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn span(&self, addr: u64, len: usize) -> SimResult<&[AtomicU8]> {
        let out_of_bounds = || SimError::MemoryOutOfBounds {
            addr,
            len,
            size: self.bytes.len(),
        };
        let start = usize::try_from(addr).map_err(|_| out_of_bounds())?;
        let end = start.checked_add(len).ok_or_else(out_of_bounds)?;
        self.bytes.get(start..end).ok_or_else(out_of_bounds)
    }

    /// Reads `len` bytes starting at `addr`.
    pub fn read(&self, addr: u64, len: usize) -> SimResult<Vec<u8>> {
        Ok(self
            .span(addr, len)?
            .iter()
            .map(|byte| byte.load(Ordering::Relaxed))
            .collect())
    }

    /// Writes `data` starting at `addr`.
    pub fn write(&self, addr: u64, data: &[u8]) -> SimResult<()> {
        for (byte, value) in self.span(addr, data.len())?.iter().zip(data) {
            byte.store(*value, Ordering::Relaxed);
        }
        Ok(())
    }
}
