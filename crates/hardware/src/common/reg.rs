//! Register Identities and the Register File.
//!
//! This module provides the storage the scheduler reasons about. It provides:
//! 1. **Size Classes:** The eight register widths, from one 8-byte word to 2048 cache lines.
//! 2. **Identities:** `RegId`, an opaque (pool, class, ordinal) handle compared by slot.
//! 3. **Pools:** The architectural file plus two disjoint hidden pools for renaming and
//!    duplication.
//! 4. **Storage:** Lock-free byte storage shared by the scheduler and every execution unit.
//!
//! Byte contents are accessed with relaxed atomics. Ordering between a producer and a
//! consumer is established by the acquire/release handoff of the execution slots, and
//! exclusivity of writers is guaranteed by the ILP controller never admitting two
//! conflicting instructions at once.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use super::constants::CACHE_LINE_SIZE;
use super::error::{SimError, SimResult};
use crate::config::RegisterFileConfig;

/// Width class of a register.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SizeClass {
    /// One 8-byte word.
    #[serde(rename = "64B")]
    B64,
    /// One cache line.
    #[serde(rename = "1L")]
    L1,
    /// 8 cache lines.
    #[serde(rename = "8L")]
    L8,
    /// 16 cache lines.
    #[serde(rename = "16L")]
    L16,
    /// 256 cache lines.
    #[serde(rename = "256L")]
    L256,
    /// 512 cache lines.
    #[serde(rename = "512L")]
    L512,
    /// 1024 cache lines.
    #[serde(rename = "1024L")]
    L1024,
    /// 2048 cache lines.
    #[serde(rename = "2048L")]
    L2048,
}

impl SizeClass {
    /// Every size class, smallest first.
    pub const ALL: [Self; 8] = [
        Self::B64,
        Self::L1,
        Self::L8,
        Self::L16,
        Self::L256,
        Self::L512,
        Self::L1024,
        Self::L2048,
    ];

    /// Width of one register of this class in bytes.
    pub const fn bytes(self) -> usize {
        match self {
            Self::B64 => 8,
            Self::L1 => CACHE_LINE_SIZE,
            Self::L8 => 8 * CACHE_LINE_SIZE,
            Self::L16 => 16 * CACHE_LINE_SIZE,
            Self::L256 => 256 * CACHE_LINE_SIZE,
            Self::L512 => 512 * CACHE_LINE_SIZE,
            Self::L1024 => 1024 * CACHE_LINE_SIZE,
            Self::L2048 => 2048 * CACHE_LINE_SIZE,
        }
    }

    /// Assembly label of the class (`64B`, `1L`, `8L`, ...).
    pub const fn label(self) -> &'static str {
        match self {
            Self::B64 => "64B",
            Self::L1 => "1L",
            Self::L8 => "8L",
            Self::L16 => "16L",
            Self::L256 => "256L",
            Self::L512 => "512L",
            Self::L1024 => "1024L",
            Self::L2048 => "2048L",
        }
    }

    /// Parses an assembly label back into a class.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.label() == label)
    }

    const fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Storage pool a register belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegPool {
    /// Registers named by programs.
    Architectural,
    /// Hidden registers handed out by the out-of-order renamer.
    Rename,
    /// Hidden registers handed out to duplicated codelets.
    Duplicate,
}

impl RegPool {
    const ALL: [Self; 3] = [Self::Architectural, Self::Rename, Self::Duplicate];

    const fn slot(self) -> usize {
        self as usize
    }
}

/// Opaque handle to one register slot.
///
/// Two handles are equal exactly when they name the same storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegId {
    pool: RegPool,
    class: SizeClass,
    index: u32,
}

impl RegId {
    /// Creates a handle in an arbitrary pool.
    pub const fn new(pool: RegPool, class: SizeClass, index: u32) -> Self {
        Self { pool, class, index }
    }

    /// Creates a handle to an architectural register.
    pub const fn arch(class: SizeClass, index: u32) -> Self {
        Self::new(RegPool::Architectural, class, index)
    }

    /// Pool the register lives in.
    pub const fn pool(self) -> RegPool {
        self.pool
    }

    /// Width class of the register.
    pub const fn class(self) -> SizeClass {
        self.class
    }

    /// Ordinal within its pool and class.
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Width of the register in bytes.
    pub const fn byte_size(self) -> usize {
        self.class.bytes()
    }

    /// True for registers outside the architectural file.
    pub fn is_hidden(self) -> bool {
        self.pool != RegPool::Architectural
    }
}

impl fmt::Display for RegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pool {
            RegPool::Architectural => write!(f, "R_{}_{}", self.class, self.index),
            RegPool::Rename => write!(f, "R_ren_{}_{}", self.class, self.index),
            RegPool::Duplicate => write!(f, "R_dup_{}_{}", self.class, self.index),
        }
    }
}

#[derive(Debug)]
struct Bank {
    width: usize,
    count: usize,
    bytes: Box<[AtomicU8]>,
}

impl Bank {
    fn new(class: SizeClass, count: usize) -> Self {
        let width = class.bytes();
        let bytes = (0..width * count).map(|_| AtomicU8::new(0)).collect();
        Self {
            width,
            count,
            bytes,
        }
    }
}

/// Register storage for every pool and size class.
#[derive(Debug)]
pub struct RegisterFile {
    banks: Vec<Bank>,
}

impl RegisterFile {
    /// Allocates zeroed storage for the configured pools.
    ///
    /// # Arguments
    ///
    /// * `config` - Register counts per pool and size class.
    pub fn new(config: &RegisterFileConfig) -> Self {
        let mut banks = Vec::with_capacity(RegPool::ALL.len() * SizeClass::ALL.len());
        for pool in RegPool::ALL {
            let counts = config.pool(pool);
            for class in SizeClass::ALL {
                banks.push(Bank::new(class, counts.count(class)));
            }
        }
        Self { banks }
    }

    fn bank(&self, pool: RegPool, class: SizeClass) -> &Bank {
        &self.banks[pool.slot() * SizeClass::ALL.len() + class.slot()]
    }

    fn slot(&self, id: RegId) -> SimResult<&[AtomicU8]> {
        let bank = self.bank(id.pool, id.class);
        let index = id.index as usize;
        if index >= bank.count {
            return Err(SimError::InvalidRegister(id));
        }
        Ok(&bank.bytes[index * bank.width..(index + 1) * bank.width])
    }

    /// Resolves an architectural register reference to its identity.
    ///
    /// # Arguments
    ///
    /// * `class` - Size class of the reference.
    /// * `ordinal` - Register number within the class.
    ///
    /// # Returns
    ///
    /// The identity, or `InvalidRegister` if the ordinal is out of range.
    pub fn resolve(&self, class: SizeClass, ordinal: u32) -> SimResult<RegId> {
        let id = RegId::arch(class, ordinal);
        if self.contains(id) {
            Ok(id)
        } else {
            Err(SimError::InvalidRegister(id))
        }
    }

    /// Width in bytes of a register of the given class.
    pub const fn byte_size(&self, class: SizeClass) -> usize {
        class.bytes()
    }

    /// Number of registers of `class` in `pool`.
    pub fn pool_size(&self, pool: RegPool, class: SizeClass) -> usize {
        self.bank(pool, class).count
    }

    /// True if the identity names existing storage.
    pub fn contains(&self, id: RegId) -> bool {
        (id.index as usize) < self.bank(id.pool, id.class).count
    }

    /// Returns the register under `cursor` and advances the cursor, wrapping around.
    ///
    /// Callers iterate at most `pool_size` times to visit every register once.
    /// Returns `None` when the pool has no registers of that class.
    pub fn next_free(&self, pool: RegPool, class: SizeClass, cursor: &mut usize) -> Option<RegId> {
        let count = self.pool_size(pool, class);
        if count == 0 {
            return None;
        }
        let index = *cursor % count;
        *cursor = (index + 1) % count;
        Some(RegId::new(pool, class, index as u32))
    }

    /// Reads the full contents of a register.
    pub fn read(&self, id: RegId) -> SimResult<Vec<u8>> {
        Ok(self
            .slot(id)?
            .iter()
            .map(|byte| byte.load(Ordering::Relaxed))
            .collect())
    }

    /// Writes `data` into the front of a register and zero-fills the remainder.
    ///
    /// Bytes beyond the register width are dropped.
    pub fn write(&self, id: RegId, data: &[u8]) -> SimResult<()> {
        let slot = self.slot(id)?;
        for (i, byte) in slot.iter().enumerate() {
            byte.store(data.get(i).copied().unwrap_or(0), Ordering::Relaxed);
        }
        Ok(())
    }

    /// Copies the contents of `src` into `dst`.
    pub fn copy(&self, src: RegId, dst: RegId) -> SimResult<()> {
        if src == dst {
            return Ok(());
        }
        let data = self.read(src)?;
        self.write(dst, &data)
    }

    /// Reads the last (up to) eight bytes of a register as a big-endian integer.
    ///
    /// The last byte of the register is the least significant one.
    pub fn read_u64(&self, id: RegId) -> SimResult<u64> {
        let slot = self.slot(id)?;
        let tail = &slot[slot.len().saturating_sub(8)..];
        Ok(tail
            .iter()
            .fold(0u64, |acc, byte| (acc << 8) | u64::from(byte.load(Ordering::Relaxed))))
    }

    /// Stores `value` big-endian in the last (up to) eight bytes, zeroing the rest.
    pub fn write_u64(&self, id: RegId, value: u64) -> SimResult<()> {
        let slot = self.slot(id)?;
        let mut data = vec![0u8; slot.len()];
        let be = value.to_be_bytes();
        let take = data.len().min(8);
        let start = data.len() - take;
        data[start..].copy_from_slice(&be[8 - take..]);
        self.write(id, &data)
    }

    /// Overwrites every byte of a register with the output of `f(i, old)`.
    pub fn update(&self, id: RegId, mut f: impl FnMut(usize, u8) -> u8) -> SimResult<()> {
        for (i, byte) in self.slot(id)?.iter().enumerate() {
            byte.store(f(i, byte.load(Ordering::Relaxed)), Ordering::Relaxed);
        }
        Ok(())
    }
}
