//! Utility functions exposed to Python.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use tracing_subscriber::EnvFilter;

/// Returns the simulator version string.
#[pyfunction]
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Installs a stderr log subscriber.
///
/// # Arguments
///
/// * `filter` - An `EnvFilter` directive such as `"scmsim_core=debug"`. Defaults to
///   `RUST_LOG`, then `warn`.
///
/// # Returns
///
/// `False` if a subscriber was already installed.
#[pyfunction]
#[pyo3(signature = (filter=None))]
pub fn init_logging(filter: Option<&str>) -> PyResult<bool> {
    let filter = match filter {
        Some(directive) => EnvFilter::try_new(directive)
            .map_err(|e| PyValueError::new_err(format!("invalid log filter: {e}")))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    Ok(tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok())
}
