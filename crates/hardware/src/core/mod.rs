//! Scheduling and hazard-resolution engine.
//!
//! This module contains everything between a decoded instruction and its retirement:
//! 1. **Instruction Buffer:** The window of in-flight instructions and their lifecycle.
//! 2. **ILP Controllers:** Sequential, superscalar, and out-of-order hazard policies.
//! 3. **Control Store:** Lock-free execution slots, the only handoff to the units.
//! 4. **Execution Units:** Threads that run arithmetic, memory moves, and codelets.
//! 5. **Fault Models:** Stochastic fault injection queried by the units.
//! 6. **Duplication:** Redundant execution of codelets and majority voting.
//! 7. **Fetch-Decode Driver:** The single scheduling thread tying it all together.

/// Instruction window.
pub mod buffer;

/// Execution slots.
pub mod control_store;

/// Duplication groups and voting.
pub mod duplication;

/// Execution unit state machine.
pub mod executor;

/// Fault injection policies.
pub mod fault;

/// The scheduling loop.
pub mod fetch_decode;

/// ILP policies and the memory hazard tracker.
pub mod ilp;

pub use self::buffer::{InstState, InstTag, InstructionBuffer};
pub use self::control_store::ControlStore;
pub use self::fetch_decode::{FetchDecode, TickOutcome};
