//! Statistics Python binding.
//!
//! Exposes run statistics to Python: getters for the headline counters, `summary` /
//! `print` for the text report, and `to_dict` for JSON-friendly export.

use pyo3::prelude::*;
use pyo3::types::PyDict;
use scmsim_core::SimStats;

/// Python-exposed statistics: wraps `SimStats` for reading from Python.
#[pyclass(name = "Stats")]
#[derive(Clone, Debug)]
pub struct PyStats {
    /// Wrapped counters.
    pub inner: SimStats,
}

#[pymethods]
impl PyStats {
    #[getter]
    fn ticks(&self) -> u64 {
        self.inner.ticks
    }
    #[getter]
    fn retired(&self) -> u64 {
        self.inner.retired
    }
    #[getter]
    fn dispatched(&self) -> u64 {
        self.inner.dispatched
    }
    #[getter]
    fn stalls(&self) -> u64 {
        self.inner.stalls
    }
    #[getter]
    fn renames(&self) -> u64 {
        self.inner.renames
    }
    #[getter]
    fn duplicates_spawned(&self) -> u64 {
        self.inner.duplicates_spawned
    }
    #[getter]
    fn overrides(&self) -> u64 {
        self.inner.overrides
    }
    #[getter]
    fn faults_injected(&self) -> u64 {
        self.inner.faults_injected
    }
    #[getter]
    fn max_in_flight(&self) -> u64 {
        self.inner.max_in_flight
    }

    /// Text report of every counter.
    fn summary(&self) -> String {
        self.inner.summary()
    }

    /// Prints the text report.
    fn print(&self) {
        print!("{}", self.inner.summary());
    }

    /// Export all counters as a Python dict.
    fn to_dict<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let d = PyDict::new(py);
        let s = &self.inner;
        d.set_item("ticks", s.ticks)?;
        d.set_item("fetched", s.fetched)?;
        d.set_item("dispatched", s.dispatched)?;
        d.set_item("retired", s.retired)?;
        d.set_item("control_resolved", s.control_resolved)?;
        d.set_item("stalls", s.stalls)?;
        d.set_item("structural_hazards", s.structural_hazards)?;
        d.set_item("renames", s.renames)?;
        d.set_item("broadcasts", s.broadcasts)?;
        d.set_item("duplicates_spawned", s.duplicates_spawned)?;
        d.set_item("votes", s.votes)?;
        d.set_item("overrides", s.overrides)?;
        d.set_item("faults_injected", s.faults_injected)?;
        d.set_item("max_in_flight", s.max_in_flight)?;
        d.set_item("retired_per_tick", s.retired_per_tick())?;
        Ok(d)
    }

    fn __str__(&self) -> String {
        self.inner.summary()
    }
}

impl From<SimStats> for PyStats {
    fn from(inner: SimStats) -> Self {
        Self { inner }
    }
}
