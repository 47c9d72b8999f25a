//! Simulation top level.
//!
//! Provides the program representation handed to the machine and the `Machine` itself,
//! which wires storage, execution units, and the scheduler together for one run.

/// Machine construction and the run loop.
pub mod machine;

/// Programs and the program builder.
pub mod program;

pub use machine::{FaultModelFactory, Machine};
pub use program::{Program, ProgramBuilder};
