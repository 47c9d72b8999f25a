//! Decoded instructions and their operands.
//!
//! A `DecodedInstruction` is created once per fetched line and then mutated in place by
//! the scheduler: the out-of-order controller rewrites register operands when it renames
//! them, and every policy flips operand ready flags as producers complete.

use std::fmt;
use std::sync::Arc;

use crate::common::constants::MAX_NUM_OPERANDS;
use crate::common::error::{SimError, SimResult};
use crate::common::range::MemoryRange;
use crate::common::reg::{RegId, RegisterFile};
use crate::isa::codelet::Codelet;
use crate::isa::opcodes::{InstKind, OpIo, Opcode};

/// Effective direction of a register across all operands of one instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegDir {
    /// Only read.
    Read,
    /// Only written.
    Write,
    /// Read and written, possibly through different operands.
    ReadWrite,
}

impl RegDir {
    fn from_flags(read: bool, write: bool) -> Self {
        match (read, write) {
            (true, true) => Self::ReadWrite,
            (false, true) => Self::Write,
            _ => Self::Read,
        }
    }

    /// True for `Read` and `ReadWrite`.
    pub const fn reads(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    /// True for `Write` and `ReadWrite`.
    pub const fn writes(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }

    fn merge(self, other: Self) -> Self {
        Self::from_flags(self.reads() || other.reads(), self.writes() || other.writes())
    }
}

/// A register operand with its intent and full/empty flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegOperand {
    /// Storage the operand currently refers to (rewritten by renaming).
    pub id: RegId,
    /// The instruction reads this operand.
    pub read: bool,
    /// The instruction writes this operand.
    pub write: bool,
    /// Producer satisfied; the value may be consumed.
    pub ready: bool,
}

/// One instruction operand.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Operand {
    /// Not present.
    #[default]
    Unset,
    /// A register.
    Register(RegOperand),
    /// An immediate value (addresses, offsets, constants).
    Immediate(u64),
    /// A label name.
    Label(String),
}

impl Operand {
    /// Register operand; intent is filled in by the decoder.
    pub const fn reg(id: RegId) -> Self {
        Self::Register(RegOperand {
            id,
            read: false,
            write: false,
            ready: false,
        })
    }

    /// Unsigned immediate.
    pub const fn imm(value: u64) -> Self {
        Self::Immediate(value)
    }

    /// Signed immediate, stored two's complement (branch offsets).
    pub const fn signed(value: i64) -> Self {
        Self::Immediate(value as u64)
    }

    /// Label reference.
    pub fn label(name: impl Into<String>) -> Self {
        Self::Label(name.into())
    }

    /// Register identity, if this is a register operand.
    pub const fn register(&self) -> Option<RegId> {
        match self {
            Self::Register(op) => Some(op.id),
            _ => None,
        }
    }

    /// Ready flag; non-register operands are always ready.
    pub const fn is_ready(&self) -> bool {
        match self {
            Self::Register(op) => op.ready,
            _ => true,
        }
    }

    /// Numeric value of an immediate or a register (read as a big-endian u64).
    ///
    /// Returns `Ok(None)` for unset and label operands.
    pub fn read_value(&self, regs: &RegisterFile) -> SimResult<Option<u64>> {
        match self {
            Self::Immediate(value) => Ok(Some(*value)),
            Self::Register(op) => regs.read_u64(op.id).map(Some),
            Self::Unset | Self::Label(_) => Ok(None),
        }
    }
}

impl From<RegId> for Operand {
    fn from(id: RegId) -> Self {
        Self::reg(id)
    }
}

impl From<u64> for Operand {
    fn from(value: u64) -> Self {
        Self::imm(value)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => f.write_str("_"),
            Self::Register(op) => write!(f, "{}", op.id),
            Self::Immediate(value) => write!(f, "{}", *value as i64),
            Self::Label(name) => f.write_str(name),
        }
    }
}

/// A decoded instruction as it lives in the instruction buffer.
#[derive(Clone, Debug)]
pub struct DecodedInstruction {
    kind: InstKind,
    opcode: Opcode,
    name: String,
    operands: [Operand; MAX_NUM_OPERANDS],
    io: OpIo,
    codelet: Option<Arc<dyn Codelet>>,
    memory_ranges: Option<Vec<MemoryRange>>,
    failed: bool,
    duplicate: bool,
}

impl DecodedInstruction {
    fn build(
        kind: InstKind,
        opcode: Opcode,
        name: String,
        operands: Vec<Operand>,
        io: OpIo,
        codelet: Option<Arc<dyn Codelet>>,
    ) -> Self {
        let mut slots: [Operand; MAX_NUM_OPERANDS] = Default::default();
        for (index, operand) in operands.into_iter().take(MAX_NUM_OPERANDS).enumerate() {
            slots[index] = match operand {
                Operand::Register(op) => Operand::Register(RegOperand {
                    id: op.id,
                    read: io.reads(index),
                    write: io.writes(index),
                    ready: false,
                }),
                other => other,
            };
        }
        Self {
            kind,
            opcode,
            name,
            operands: slots,
            io,
            codelet,
            memory_ranges: None,
            failed: false,
            duplicate: false,
        }
    }

    /// Builds one of the fixed operations.
    pub fn new(opcode: Opcode, operands: Vec<Operand>) -> Self {
        Self::build(
            opcode.kind(),
            opcode,
            opcode.mnemonic().to_string(),
            operands,
            opcode.io(),
            None,
        )
    }

    /// Builds a codelet invocation.
    pub fn with_codelet(codelet: Arc<dyn Codelet>, operands: Vec<Operand>) -> Self {
        let io = codelet.io_mask();
        let name = codelet.name().to_string();
        Self::build(InstKind::Execute, Opcode::Cod, name, operands, io, Some(codelet))
    }

    /// Builds a label marker.
    pub fn label(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::build(
            InstKind::Label,
            Opcode::Label,
            name.clone(),
            vec![Operand::Label(name)],
            OpIo::NONE,
            None,
        )
    }

    /// Builds the placeholder for an unrecognized line.
    pub fn unknown(text: impl Into<String>) -> Self {
        Self::build(InstKind::Unknown, Opcode::Unknown, text.into(), Vec::new(), OpIo::NONE, None)
    }

    /// Instruction kind.
    pub const fn kind(&self) -> InstKind {
        self.kind
    }

    /// Opcode.
    pub const fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Mnemonic, codelet name, label name, or the raw text of an unknown line.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read/write intent mask.
    pub const fn io(&self) -> OpIo {
        self.io
    }

    /// Bound codelet of an Execute instruction.
    pub fn codelet(&self) -> Option<&Arc<dyn Codelet>> {
        self.codelet.as_ref()
    }

    /// All operand slots.
    pub const fn operands(&self) -> &[Operand; MAX_NUM_OPERANDS] {
        &self.operands
    }

    /// Operand `index`; out-of-range indices read as unset.
    pub fn operand(&self, index: usize) -> &Operand {
        const UNSET: &Operand = &Operand::Unset;
        self.operands.get(index).unwrap_or(UNSET)
    }

    /// Register identity of operand `index`.
    pub fn register(&self, index: usize) -> Option<RegId> {
        self.operand(index).register()
    }

    /// Points register operand `index` at other storage without touching its flags.
    pub fn set_register(&mut self, index: usize, id: RegId) {
        if let Some(Operand::Register(op)) = self.operands.get_mut(index) {
            op.id = id;
        }
    }

    /// Latches the ready flag of register operand `index`.
    pub fn mark_ready(&mut self, index: usize) {
        if let Some(Operand::Register(op)) = self.operands.get_mut(index) {
            op.ready = true;
        }
    }

    /// Latches every register operand ready.
    pub fn mark_all_ready(&mut self) {
        for index in 0..MAX_NUM_OPERANDS {
            self.mark_ready(index);
        }
    }

    /// True once every operand may be consumed.
    pub fn all_operands_ready(&self) -> bool {
        self.operands.iter().all(Operand::is_ready)
    }

    /// Distinct registers with their merged direction, in operand order.
    ///
    /// Operands that alias the same storage contribute to one entry.
    pub fn register_dirs(&self) -> Vec<(RegId, RegDir)> {
        let mut dirs: Vec<(RegId, RegDir)> = Vec::with_capacity(MAX_NUM_OPERANDS);
        for operand in &self.operands {
            if let Operand::Register(op) = operand {
                let dir = RegDir::from_flags(op.read, op.write);
                match dirs.iter_mut().find(|(id, _)| *id == op.id) {
                    Some((_, existing)) => *existing = existing.merge(dir),
                    None => dirs.push((op.id, dir)),
                }
            }
        }
        dirs
    }

    /// Merged direction of one register, if the instruction references it.
    pub fn direction_of(&self, id: RegId) -> Option<RegDir> {
        self.register_dirs()
            .into_iter()
            .find_map(|(reg, dir)| (reg == id).then_some(dir))
    }

    /// Indices of operands whose register is written.
    pub fn written_operands(&self) -> Vec<usize> {
        (0..MAX_NUM_OPERANDS)
            .filter(|&index| matches!(self.operand(index), Operand::Register(op) if op.write))
            .collect()
    }

    /// True if the instruction claims memory ranges while it runs.
    pub fn touches_memory(&self) -> bool {
        match self.kind {
            InstKind::Memory => self.opcode != Opcode::Ldimm,
            InstKind::Execute => self.codelet.as_ref().is_some_and(|c| c.is_memory_codelet()),
            _ => false,
        }
    }

    /// True if operand `index` feeds an address computation.
    pub fn is_address_operand(&self, index: usize) -> bool {
        match self.kind {
            InstKind::Memory => self.opcode != Opcode::Ldimm && index > 0 && index < MAX_NUM_OPERANDS,
            InstKind::Execute => self
                .codelet
                .as_ref()
                .is_some_and(|c| c.is_memory_codelet() && c.is_address_operand(index)),
            _ => false,
        }
    }

    /// Numeric value of operand `index`; errors on labels and missing operands.
    pub fn value_of(&self, index: usize, regs: &RegisterFile) -> SimResult<u64> {
        self.operand(index)
            .read_value(regs)?
            .ok_or_else(|| self.invalid_operand(index, "a value"))
    }

    /// Error describing a badly typed operand of this instruction.
    pub fn invalid_operand(&self, index: usize, expected: &'static str) -> SimError {
        SimError::InvalidOperand {
            instruction: self.to_string(),
            index,
            expected,
        }
    }

    /// Memory ranges claimed by the instruction, computed on first use.
    ///
    /// Address registers are read here, so callers must only ask once every address
    /// operand is ready.
    pub fn memory_ranges(&mut self, regs: &RegisterFile) -> SimResult<&[MemoryRange]> {
        if self.memory_ranges.is_none() {
            let ranges = self.compute_memory_ranges(regs)?;
            self.memory_ranges = Some(ranges);
        }
        Ok(self.memory_ranges.as_deref().unwrap_or_default())
    }

    fn compute_memory_ranges(&self, regs: &RegisterFile) -> SimResult<Vec<MemoryRange>> {
        if !self.touches_memory() {
            return Ok(Vec::new());
        }
        if let Some(codelet) = &self.codelet {
            return codelet.memory_ranges(&self.operands, regs);
        }
        let size = self
            .register(0)
            .ok_or_else(|| self.invalid_operand(0, "a register"))?
            .byte_size() as u64;
        let mut address = self.value_of(1, regs)?;
        if matches!(self.opcode, Opcode::Ldoff | Opcode::Stoff) {
            address = address.wrapping_add(self.value_of(2, regs)?);
        }
        let range = if self.opcode.is_load() {
            MemoryRange::read(address, size)
        } else {
            MemoryRange::write(address, size)
        };
        Ok(vec![range])
    }

    /// Fault flag set by the execution unit.
    pub const fn failed(&self) -> bool {
        self.failed
    }

    /// Sets the fault flag.
    pub fn set_failed(&mut self, failed: bool) {
        self.failed = failed;
    }

    /// True for clones made by the duplication controller.
    pub const fn is_duplicate(&self) -> bool {
        self.duplicate
    }

    /// Structural clone used as a duplication group member.
    pub fn to_duplicate(&self) -> Self {
        let mut clone = self.clone();
        clone.duplicate = true;
        clone.failed = false;
        clone.memory_ranges = None;
        clone
    }

    /// Points every operand referencing `from` at `to` and returns the touched indices.
    pub fn rename_all(&mut self, from: RegId, to: RegId) -> Vec<usize> {
        let mut touched = Vec::new();
        for index in 0..MAX_NUM_OPERANDS {
            if self.register(index) == Some(from) {
                self.set_register(index, to);
                touched.push(index);
            }
        }
        touched
    }
}

impl fmt::Display for DecodedInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.duplicate {
            f.write_str("DUP_")?;
        }
        match self.kind {
            InstKind::Unknown => return f.write_str(&self.name),
            InstKind::Label => return write!(f, "{}:", self.name),
            InstKind::Execute => write!(f, "COD {}", self.name)?,
            _ => f.write_str(&self.name)?,
        }
        let mut first = true;
        for operand in self.operands.iter().filter(|op| !matches!(op, Operand::Unset)) {
            f.write_str(if first { " " } else { ", " })?;
            write!(f, "{operand}")?;
            first = false;
        }
        Ok(())
    }
}
