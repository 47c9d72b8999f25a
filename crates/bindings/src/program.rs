//! Program and register Python bindings.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use scmsim_core::common::{RegId, SizeClass};
use scmsim_core::isa::ProgramLine;
use scmsim_core::Program;

use crate::conversion::py_to_operands;

/// An architectural register, e.g. `Register("64B", 3)` for `R_64B_3`.
#[pyclass(name = "Register", frozen, eq, hash)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PyRegister {
    /// Handle of the register.
    pub id: RegId,
}

#[pymethods]
impl PyRegister {
    #[new]
    fn new(class: &str, index: u32) -> PyResult<Self> {
        let class = SizeClass::from_label(class)
            .ok_or_else(|| PyValueError::new_err(format!("unknown size class `{class}`")))?;
        Ok(Self {
            id: RegId::arch(class, index),
        })
    }

    /// Size class label (`64B`, `1L`, ...).
    #[getter]
    fn class(&self) -> &'static str {
        self.id.class().label()
    }

    #[getter]
    fn index(&self) -> u32 {
        self.id.index()
    }

    /// Width in bytes.
    #[getter]
    fn size(&self) -> usize {
        self.id.byte_size()
    }

    fn __repr__(&self) -> String {
        format!("Register(\"{}\", {})", self.id.class(), self.id.index())
    }

    fn __str__(&self) -> String {
        self.id.to_string()
    }
}

/// A program under construction. Handed to `Machine` by value.
#[pyclass(name = "Program")]
#[derive(Debug, Default, Clone)]
pub struct PyProgram {
    lines: Vec<ProgramLine>,
}

impl PyProgram {
    /// Builds the immutable core program.
    pub fn build(&self) -> Program {
        Program::new(self.lines.clone())
    }
}

#[pymethods]
impl PyProgram {
    #[new]
    fn new() -> Self {
        Self::default()
    }

    /// Appends a fixed operation, e.g. `instruction("ADD", [dst, a, 5])`.
    #[pyo3(signature = (mnemonic, operands=Vec::new()))]
    fn instruction(&mut self, mnemonic: &str, operands: Vec<Bound<'_, PyAny>>) -> PyResult<()> {
        self.lines.push(ProgramLine::Instruction {
            mnemonic: mnemonic.to_ascii_uppercase(),
            operands: py_to_operands(&operands)?,
        });
        Ok(())
    }

    /// Appends `COD name operands...`.
    #[pyo3(signature = (name, operands=Vec::new()))]
    fn codelet(&mut self, name: &str, operands: Vec<Bound<'_, PyAny>>) -> PyResult<()> {
        self.lines.push(ProgramLine::Codelet {
            name: name.to_string(),
            operands: py_to_operands(&operands)?,
        });
        Ok(())
    }

    /// Appends a label line.
    fn label(&mut self, name: &str) {
        self.lines.push(ProgramLine::Label(name.to_string()));
    }

    /// Appends `COMMIT`.
    fn commit(&mut self) {
        self.lines.push(ProgramLine::Instruction {
            mnemonic: "COMMIT".to_string(),
            operands: Vec::new(),
        });
    }

    fn __len__(&self) -> usize {
        self.lines.len()
    }

    fn __str__(&self) -> String {
        self.lines
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
