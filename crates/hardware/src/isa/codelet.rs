//! Codelet capability interface.
//!
//! Codelets are the opaque compute kernels a `COD` instruction dispatches. This module
//! provides:
//! 1. **Capability Trait:** `Codelet`, what the scheduler needs to know about a kernel.
//! 2. **Execution Context:** The explicit handle a running codelet receives (unit, operands,
//!    registers, memory) in place of a stored back-reference to its executor.
//! 3. **Registry:** An explicit name-to-factory table built once at startup and shared.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::common::constants::MAX_NUM_OPERANDS;
use crate::common::error::{SimError, SimResult};
use crate::common::range::MemoryRange;
use crate::common::reg::{RegId, RegisterFile};
use crate::isa::builtin;
use crate::isa::instruction::Operand;
use crate::isa::opcodes::OpIo;
use crate::soc::Memory;

/// A compute kernel invocable from the instruction stream.
pub trait Codelet: Send + Sync + fmt::Debug {
    /// Registry name.
    fn name(&self) -> &str;

    /// Read/write intent of each operand.
    fn io_mask(&self) -> OpIo;

    /// True if the kernel reads or writes memory and must claim ranges.
    fn is_memory_codelet(&self) -> bool {
        false
    }

    /// True if operand `index` feeds the address computation.
    fn is_address_operand(&self, _index: usize) -> bool {
        false
    }

    /// Memory ranges the kernel touches for the given operands.
    ///
    /// Only called for memory codelets, once every address operand is ready.
    fn memory_ranges(
        &self,
        _operands: &[Operand; MAX_NUM_OPERANDS],
        _registers: &RegisterFile,
    ) -> SimResult<Vec<MemoryRange>> {
        Ok(Vec::new())
    }

    /// Runs the kernel.
    fn run(&self, ctx: &ExecutionContext<'_>) -> SimResult<()>;
}

/// Everything a running codelet may touch.
#[derive(Debug)]
pub struct ExecutionContext<'a> {
    unit: usize,
    name: &'a str,
    operands: &'a [Operand; MAX_NUM_OPERANDS],
    registers: &'a RegisterFile,
    memory: &'a Memory,
}

impl<'a> ExecutionContext<'a> {
    /// Creates a context for one execution.
    pub const fn new(
        unit: usize,
        name: &'a str,
        operands: &'a [Operand; MAX_NUM_OPERANDS],
        registers: &'a RegisterFile,
        memory: &'a Memory,
    ) -> Self {
        Self {
            unit,
            name,
            operands,
            registers,
            memory,
        }
    }

    /// Index of the executing unit.
    pub const fn unit(&self) -> usize {
        self.unit
    }

    /// Operand `index`.
    pub fn operand(&self, index: usize) -> &Operand {
        const UNSET: &Operand = &Operand::Unset;
        self.operands.get(index).unwrap_or(UNSET)
    }

    /// Register storage.
    pub const fn registers(&self) -> &RegisterFile {
        self.registers
    }

    /// Shared memory.
    pub const fn memory(&self) -> &Memory {
        self.memory
    }

    /// Register behind operand `index`.
    pub fn register(&self, index: usize) -> SimResult<RegId> {
        self.operand(index)
            .register()
            .ok_or_else(|| self.invalid(index, "a register"))
    }

    /// Full contents of the register behind operand `index`.
    pub fn read(&self, index: usize) -> SimResult<Vec<u8>> {
        self.registers.read(self.register(index)?)
    }

    /// Overwrites the register behind operand `index`.
    pub fn write(&self, index: usize, data: &[u8]) -> SimResult<()> {
        self.registers.write(self.register(index)?, data)
    }

    /// Numeric value of operand `index` (immediate or register).
    pub fn value(&self, index: usize) -> SimResult<u64> {
        self.operand(index)
            .read_value(self.registers)?
            .ok_or_else(|| self.invalid(index, "a value"))
    }

    /// Error naming this codelet.
    pub fn fail(&self, reason: impl Into<String>) -> SimError {
        SimError::Codelet {
            name: self.name.to_string(),
            reason: reason.into(),
        }
    }

    fn invalid(&self, index: usize, expected: &'static str) -> SimError {
        SimError::InvalidOperand {
            instruction: format!("COD {}", self.name),
            index,
            expected,
        }
    }
}

type Factory = Box<dyn Fn() -> Arc<dyn Codelet> + Send + Sync>;

/// Name-to-factory table used by the decoder.
pub struct CodeletRegistry {
    factories: HashMap<String, Factory>,
}

impl CodeletRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Creates a registry holding the built-in codelets.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_builtins(&mut registry);
        registry
    }

    /// Registers (or replaces) a codelet factory under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Codelet> + Send + Sync + 'static,
    {
        let _ = self.factories.insert(name.into(), Box::new(factory));
    }

    /// Instantiates the codelet registered under `name`.
    pub fn create(&self, name: &str) -> Option<Arc<dyn Codelet>> {
        self.factories.get(name).map(|factory| factory())
    }

    /// True if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for CodeletRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for CodeletRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeletRegistry")
            .field("codelets", &self.names())
            .finish()
    }
}
