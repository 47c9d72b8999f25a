//! Program representation and builder.
//!
//! A program is the already-tokenized instruction stream the fetch stage walks. Labels
//! occupy a line of their own and are indexed when the program is built.

use std::collections::HashMap;

use crate::common::reg::RegId;
use crate::isa::decode::ProgramLine;
use crate::isa::instruction::Operand;

/// An immutable program.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Program {
    lines: Vec<ProgramLine>,
    labels: HashMap<String, usize>,
}

impl Program {
    /// Builds a program from lines, indexing its labels.
    ///
    /// A label defined twice resolves to its first definition.
    pub fn new(lines: Vec<ProgramLine>) -> Self {
        let mut labels = HashMap::new();
        for (pc, line) in lines.iter().enumerate() {
            if let ProgramLine::Label(name) = line {
                let _ = labels.entry(name.clone()).or_insert(pc);
            }
        }
        Self { lines, labels }
    }

    /// Starts a builder.
    pub fn builder() -> ProgramBuilder {
        ProgramBuilder::default()
    }

    /// Line at `pc`.
    pub fn line(&self, pc: usize) -> Option<&ProgramLine> {
        self.lines.get(pc)
    }

    /// All lines.
    pub fn lines(&self) -> &[ProgramLine] {
        &self.lines
    }

    /// Number of lines, labels included.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// True for an empty program.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Line index of `label`.
    pub fn label(&self, label: &str) -> Option<usize> {
        self.labels.get(label).copied()
    }

    /// Every register operand named by the program.
    pub fn registers(&self) -> impl Iterator<Item = RegId> + '_ {
        self.lines.iter().flat_map(|line| {
            let operands: &[Operand] = match line {
                ProgramLine::Label(_) => &[],
                ProgramLine::Instruction { operands, .. } | ProgramLine::Codelet { operands, .. } => {
                    operands
                }
            };
            operands.iter().filter_map(Operand::register)
        })
    }
}

/// Fluent program builder.
///
/// # Examples
///
/// ```
/// use scmsim_core::common::{RegId, SizeClass};
/// use scmsim_core::sim::Program;
///
/// let r0 = RegId::arch(SizeClass::B64, 0);
/// let program = Program::builder().ldimm(r0, 7).commit().build();
/// assert_eq!(program.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    lines: Vec<ProgramLine>,
}

impl ProgramBuilder {
    /// Appends a fixed operation by mnemonic.
    pub fn instruction(mut self, mnemonic: &str, operands: Vec<Operand>) -> Self {
        self.lines.push(ProgramLine::Instruction {
            mnemonic: mnemonic.to_string(),
            operands,
        });
        self
    }

    /// Appends `COD name operands...`.
    pub fn cod(mut self, name: &str, operands: Vec<Operand>) -> Self {
        self.lines.push(ProgramLine::Codelet {
            name: name.to_string(),
            operands,
        });
        self
    }

    /// Appends a label line.
    pub fn label(mut self, name: &str) -> Self {
        self.lines.push(ProgramLine::Label(name.to_string()));
        self
    }

    /// `LDIMM dst, value`
    pub fn ldimm(self, dst: RegId, value: u64) -> Self {
        self.instruction("LDIMM", vec![dst.into(), Operand::imm(value)])
    }

    /// `ADD dst, a, b`
    pub fn add(self, dst: RegId, a: RegId, b: impl Into<Operand>) -> Self {
        self.instruction("ADD", vec![dst.into(), a.into(), b.into()])
    }

    /// `SUB dst, a, b`
    pub fn sub(self, dst: RegId, a: RegId, b: impl Into<Operand>) -> Self {
        self.instruction("SUB", vec![dst.into(), a.into(), b.into()])
    }

    /// `SHFL reg, amount`
    pub fn shfl(self, reg: RegId, amount: impl Into<Operand>) -> Self {
        self.instruction("SHFL", vec![reg.into(), amount.into()])
    }

    /// `SHFR reg, amount`
    pub fn shfr(self, reg: RegId, amount: impl Into<Operand>) -> Self {
        self.instruction("SHFR", vec![reg.into(), amount.into()])
    }

    /// `LDADR dst, address`
    pub fn ldadr(self, dst: RegId, address: impl Into<Operand>) -> Self {
        self.instruction("LDADR", vec![dst.into(), address.into()])
    }

    /// `LDOFF dst, base, offset`
    pub fn ldoff(self, dst: RegId, base: impl Into<Operand>, offset: impl Into<Operand>) -> Self {
        self.instruction("LDOFF", vec![dst.into(), base.into(), offset.into()])
    }

    /// `STADR src, address`
    pub fn stadr(self, src: RegId, address: impl Into<Operand>) -> Self {
        self.instruction("STADR", vec![src.into(), address.into()])
    }

    /// `STOFF src, base, offset`
    pub fn stoff(self, src: RegId, base: impl Into<Operand>, offset: impl Into<Operand>) -> Self {
        self.instruction("STOFF", vec![src.into(), base.into(), offset.into()])
    }

    /// `JMPLBL label`
    pub fn jmplbl(self, label: &str) -> Self {
        self.instruction("JMPLBL", vec![Operand::label(label)])
    }

    /// `JMPPC offset`
    pub fn jmppc(self, offset: i64) -> Self {
        self.instruction("JMPPC", vec![Operand::signed(offset)])
    }

    fn branch(self, mnemonic: &str, a: RegId, b: RegId, offset: i64) -> Self {
        self.instruction(mnemonic, vec![a.into(), b.into(), Operand::signed(offset)])
    }

    /// `BREQ a, b, offset`
    pub fn breq(self, a: RegId, b: RegId, offset: i64) -> Self {
        self.branch("BREQ", a, b, offset)
    }

    /// `BGT a, b, offset`
    pub fn bgt(self, a: RegId, b: RegId, offset: i64) -> Self {
        self.branch("BGT", a, b, offset)
    }

    /// `BGET a, b, offset`
    pub fn bget(self, a: RegId, b: RegId, offset: i64) -> Self {
        self.branch("BGET", a, b, offset)
    }

    /// `BLT a, b, offset`
    pub fn blt(self, a: RegId, b: RegId, offset: i64) -> Self {
        self.branch("BLT", a, b, offset)
    }

    /// `BLET a, b, offset`
    pub fn blet(self, a: RegId, b: RegId, offset: i64) -> Self {
        self.branch("BLET", a, b, offset)
    }

    /// `COMMIT`
    pub fn commit(self) -> Self {
        self.instruction("COMMIT", Vec::new())
    }

    /// Finishes the program.
    pub fn build(self) -> Program {
        Program::new(self.lines)
    }
}
