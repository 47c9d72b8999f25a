//! Common utilities and types used throughout the SCM machine simulator.
//!
//! This module provides fundamental building blocks that are shared across all components
//! of the simulator. It includes:
//! 1. **Constants:** Machine-wide limits for operands, windows, and resiliency.
//! 2. **Error Handling:** The `SimError` type every fatal condition is reported through.
//! 3. **Register Management:** Register identities, size classes, and pooled storage.
//! 4. **Memory Ranges:** Half-open intervals claimed by memory-affecting instructions.

/// Common constants used throughout the simulator.
pub mod constants;

/// Error types for fatal machine conditions.
pub mod error;

/// Memory location ranges.
pub mod range;

/// Register identities and the register file.
pub mod reg;

pub use constants::MAX_NUM_OPERANDS;
pub use error::{SimError, SimResult};
pub use range::{MemoryRange, RangeAccess};
pub use reg::{RegId, RegPool, RegisterFile, SizeClass};
