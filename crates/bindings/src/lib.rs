//! Python bindings for the SCM machine simulator.
//!
//! This crate exposes the simulator to Python via PyO3. It provides:
//! 1. **Programs:** `PyProgram` and `PyRegister` for building instruction streams.
//! 2. **Machine:** `PyMachine` for configuring, seeding, running, and inspecting a run.
//! 3. **Statistics:** `PyStats` for scheduler and resiliency counters.
//! 4. **Utilities:** Version string, logging setup, and Python↔Rust conversions.

use pyo3::prelude::*;

/// Python ↔ Rust conversions and error mapping.
pub mod conversion;
/// Machine binding (`PyMachine`).
pub mod machine;
/// Program and register bindings (`PyProgram`, `PyRegister`).
pub mod program;
/// Statistics binding (`PyStats`).
pub mod stats;
/// Utility functions (version, logging).
pub mod utils;

/// Registers all simulator classes and functions onto the given Python module.
///
/// # Arguments
///
/// * `m` - The Python module to register types and functions on.
///
/// # Returns
///
/// `Ok(())` on success, or a `PyErr` if registration fails.
pub fn register_simulator_module(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<program::PyRegister>()?;
    m.add_class::<program::PyProgram>()?;
    m.add_class::<machine::PyMachine>()?;
    m.add_class::<stats::PyStats>()?;

    m.add_function(wrap_pyfunction!(utils::version, m)?)?;
    m.add_function(wrap_pyfunction!(utils::init_logging, m)?)?;

    Ok(())
}

#[pymodule]
fn scmsim(m: &Bound<'_, PyModule>) -> PyResult<()> {
    register_simulator_module(m)
}
