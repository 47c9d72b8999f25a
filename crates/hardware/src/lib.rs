//! SCM machine simulator library.
//!
//! This crate implements a cycle-level model of the SCM accelerator's scheduling engine:
//! 1. **Core:** Instruction buffer, ILP controllers with renaming, control store, and
//!    execution units running on their own threads.
//! 2. **Resiliency:** Duplication groups with majority voting and fault injection.
//! 3. **ISA:** Opcodes, decoded instructions, the decoder, and the codelet registry.
//! 4. **Storage:** Pooled register file and flat shared memory.
//! 5. **Simulation:** Programs, the `Machine`, configuration, and statistics.

/// Common types and constants (errors, registers, memory ranges).
pub mod common;
/// Simulator configuration (defaults, enums, nested config sections, env overrides).
pub mod config;
/// Scheduling engine (buffer, ILP, control store, units, duplication, driver).
pub mod core;
/// Instruction set (opcodes, instructions, codelets, decoder).
pub mod isa;
/// Programs and the machine top level.
pub mod sim;
/// Flat shared memory.
pub mod soc;
/// Simulation statistics collection and reporting.
pub mod stats;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// Error type and result alias shared by the whole crate.
pub use crate::common::error::{SimError, SimResult};
/// The machine; construct with `Machine::new` and call `run`.
pub use crate::sim::{Machine, Program};
/// Counters collected during a run.
pub use crate::stats::SimStats;
