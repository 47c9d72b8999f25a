//! Global Machine Constants.
//!
//! This module defines machine-wide constants used across the simulator. It includes:
//! 1. **Instruction Constants:** Operand count and the read/write intent bits.
//! 2. **Window Constants:** Instruction buffer capacity and fetch width defaults.
//! 3. **Register Constants:** Cache line width that scales every register size class.
//! 4. **Resiliency Constants:** Group size limits and fault model defaults.

/// Maximum number of operands an instruction may carry.
pub const MAX_NUM_OPERANDS: usize = 3;

/// Default capacity of the instruction buffer (window).
pub const INSTRUCTION_BUFFER_SIZE: usize = 128;

/// Default number of lines fetched per scheduler tick.
pub const INSTRUCTION_FETCH_WINDOW: usize = 2;

/// Default number of execution units.
pub const DEFAULT_EXECUTION_UNITS: usize = 8;

/// Width in bytes of one cache line; every `L` register class is a multiple of it.
pub const CACHE_LINE_SIZE: usize = 64;

/// Upper bound on the number of copies (original included) of a duplicated codelet.
pub const MAX_DUPLICATED_CODELETS: usize = 10;

/// Default rate parameter of the fault injection models.
pub const DEFAULT_FAULT_LAMBDA: f64 = 0.005;

/// Default shape parameter of the Weibull fault model.
pub const DEFAULT_WEIBULL_BETA: f64 = 0.5;

/// Seed used by the execution units' pseudo-random generators.
pub const DEFAULT_FAULT_SEED: u64 = 123_456_789;

/// Default size of the flat shared memory in bytes (4 MiB).
pub const DEFAULT_MEMORY_SIZE: usize = 4 * 1024 * 1024;

/// Number of idle spins before the backoff poll strategy starts yielding.
pub const BACKOFF_SPIN_LIMIT: u32 = 64;
