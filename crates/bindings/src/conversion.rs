//! Python↔Rust conversion.
//!
//! Configuration dicts go through JSON so Python and `Config::from_json_file` share one
//! schema. Simulator errors map to `ValueError` when the caller supplied something
//! unusable and to `RuntimeError` when the run itself failed.

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use scmsim_core::config::Config;
use scmsim_core::isa::Operand;
use scmsim_core::SimError;

use crate::program::PyRegister;

/// Converts a Python dict to a simulator `Config`.
///
/// # Arguments
///
/// * `py` - Python interpreter handle.
/// * `dict` - A dict shaped like the JSON configuration file.
///
/// # Returns
///
/// The validated `Config`, or a `ValueError` if the dict is invalid.
pub fn py_dict_to_config(py: Python<'_>, dict: &Bound<'_, PyAny>) -> PyResult<Config> {
    let json = py.import("json")?;
    let text: String = json.getattr("dumps")?.call1((dict,))?.extract()?;
    Config::from_json(&text).map_err(to_py_err)
}

/// Maps a simulator error onto a Python exception.
pub fn to_py_err(err: SimError) -> PyErr {
    match err {
        SimError::Config(_)
        | SimError::ConfigParse(_)
        | SimError::InvalidRegister(_)
        | SimError::InvalidOperand { .. } => PyValueError::new_err(err.to_string()),
        other => PyRuntimeError::new_err(other.to_string()),
    }
}

/// Converts one Python operand: a `Register`, an int immediate, or a str label.
pub fn py_to_operand(value: &Bound<'_, PyAny>) -> PyResult<Operand> {
    if let Ok(reg) = value.extract::<PyRegister>() {
        return Ok(reg.id.into());
    }
    if let Ok(imm) = value.extract::<u64>() {
        return Ok(Operand::imm(imm));
    }
    if let Ok(imm) = value.extract::<i64>() {
        return Ok(Operand::signed(imm));
    }
    if let Ok(label) = value.extract::<String>() {
        return Ok(Operand::label(label));
    }
    Err(PyValueError::new_err(format!(
        "operand must be a Register, an int, or a label string, got {}",
        value.get_type().name()?
    )))
}

/// Converts a Python operand list.
pub fn py_to_operands(values: &[Bound<'_, PyAny>]) -> PyResult<Vec<Operand>> {
    values.iter().map(py_to_operand).collect()
}
