//! Memory side of the machine.
//!
//! The accelerator has a single flat address space shared by every execution unit;
//! there are no devices, buses, or caches to model.

/// Flat shared memory.
pub mod memory;

pub use memory::Memory;
