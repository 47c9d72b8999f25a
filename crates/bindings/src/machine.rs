//! Machine Python binding.
//!
//! Exposes the simulator to Python: create from a program and config dict, seed registers
//! and memory, run to COMMIT, and read results and statistics back.

use pyo3::prelude::*;
use scmsim_core::config::Config;
use scmsim_core::Machine;

use crate::conversion::{py_dict_to_config, to_py_err};
use crate::program::{PyProgram, PyRegister};
use crate::stats::PyStats;

/// Python-exposed machine: one configured run of one program.
#[pyclass(name = "Machine")]
#[derive(Debug)]
pub struct PyMachine {
    inner: Machine,
}

#[pymethods]
impl PyMachine {
    /// Creates a machine.
    ///
    /// # Arguments
    /// * `program` - Program to load; copied, so it can be reused.
    /// * `config_dict` - Optional dict shaped like the JSON configuration file.
    /// * `use_env` - Apply the `SCM_*` environment overrides on top of the dict.
    ///
    /// # Errors
    /// Returns a `ValueError` for an invalid configuration or a program that names
    /// registers the configured file does not have.
    #[new]
    #[pyo3(signature = (program, config_dict=None, use_env=true))]
    fn new(
        py: Python<'_>,
        program: &PyProgram,
        config_dict: Option<&Bound<'_, PyAny>>,
        use_env: bool,
    ) -> PyResult<Self> {
        let mut config = match config_dict {
            Some(dict) => py_dict_to_config(py, dict)?,
            None => Config::default(),
        };
        if use_env {
            config.apply_process_env().map_err(to_py_err)?;
        }
        let inner = Machine::new(config, program.build()).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Runs the program to COMMIT with the GIL released.
    ///
    /// # Errors
    /// Returns a `RuntimeError` naming the offending instruction when the run halts on a
    /// fatal condition, or when the machine already ran.
    fn run(&mut self, py: Python<'_>) -> PyResult<()> {
        let machine = &mut self.inner;
        py.allow_threads(|| machine.run()).map_err(to_py_err)
    }

    /// True once `run` returned.
    #[getter]
    fn halted(&self) -> bool {
        self.inner.is_halted()
    }

    /// Bytes of the newest value of `reg`.
    fn read_register(&self, reg: PyRegister) -> PyResult<Vec<u8>> {
        self.inner.read_register(reg.id).map_err(to_py_err)
    }

    /// Low 64 bits of `reg` as an unsigned integer.
    fn read_u64(&self, reg: PyRegister) -> PyResult<u64> {
        self.inner.read_u64(reg.id).map_err(to_py_err)
    }

    /// Seeds `reg` with raw bytes (zero-padded to the register width).
    fn write_register(&self, reg: PyRegister, data: Vec<u8>) -> PyResult<()> {
        self.inner.write_register(reg.id, &data).map_err(to_py_err)
    }

    /// Seeds `reg` with an unsigned integer.
    fn write_u64(&self, reg: PyRegister, value: u64) -> PyResult<()> {
        self.inner.write_u64(reg.id, value).map_err(to_py_err)
    }

    /// Reads `length` bytes of memory at `addr`.
    fn read_memory(&self, addr: u64, length: usize) -> PyResult<Vec<u8>> {
        self.inner.read_memory(addr, length).map_err(to_py_err)
    }

    /// Writes bytes into memory at `addr`.
    fn write_memory(&self, addr: u64, data: Vec<u8>) -> PyResult<()> {
        self.inner.write_memory(addr, &data).map_err(to_py_err)
    }

    /// Returns a snapshot of the run's statistics.
    fn stats(&self) -> PyStats {
        PyStats::from(self.inner.stats().clone())
    }
}
