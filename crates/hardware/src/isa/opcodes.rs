//! Opcode table.
//!
//! Maps every mnemonic the machine understands to its instruction kind, operand count,
//! and per-operand read/write intent.

use std::fmt;
use std::ops::BitOr;

/// Per-operand read/write intent bitmask.
///
/// Bit `2 * i` marks operand `i` as read and bit `2 * i + 1` marks it as written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct OpIo(u8);

impl OpIo {
    /// No register access.
    pub const NONE: Self = Self(0);
    /// First operand is read.
    pub const OP1_RD: Self = Self(1);
    /// First operand is written.
    pub const OP1_WR: Self = Self(2);
    /// Second operand is read.
    pub const OP2_RD: Self = Self(4);
    /// Second operand is written.
    pub const OP2_WR: Self = Self(8);
    /// Third operand is read.
    pub const OP3_RD: Self = Self(16);
    /// Third operand is written.
    pub const OP3_WR: Self = Self(32);

    /// Builds a mask from raw bits.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw bits of the mask.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True if operand `index` (0-based) is read.
    pub const fn reads(self, index: usize) -> bool {
        index < 3 && self.0 & (1 << (2 * index)) != 0
    }

    /// True if operand `index` (0-based) is written.
    pub const fn writes(self, index: usize) -> bool {
        index < 3 && self.0 & (1 << (2 * index + 1)) != 0
    }
}

impl BitOr for OpIo {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Broad category of an instruction; decides who executes it and how it is scheduled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstKind {
    /// End of program; a pipeline drain barrier.
    Commit,
    /// Jump target marker; never scheduled.
    Label,
    /// Branches and jumps, resolved by the fetch-decode driver.
    Control,
    /// Scalar register arithmetic.
    Arithmetic,
    /// Codelet invocation.
    Execute,
    /// Loads and stores between registers and memory.
    Memory,
    /// Anything the decoder did not recognize.
    Unknown,
}

/// Every operation of the instruction set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// `COMMIT`
    Commit,
    /// `LABEL name`
    Label,
    /// `JMPLBL label`
    Jmplbl,
    /// `JMPPC offset`
    Jmppc,
    /// `BREQ a, b, offset`: branch if equal.
    Breq,
    /// `BGT a, b, offset`: branch if greater.
    Bgt,
    /// `BGET a, b, offset`: branch if greater or equal.
    Bget,
    /// `BLT a, b, offset`: branch if less.
    Blt,
    /// `BLET a, b, offset`: branch if less or equal.
    Blet,
    /// `ADD d, a, b`
    Add,
    /// `SUB d, a, b`
    Sub,
    /// `SHFL r, amount`
    Shfl,
    /// `SHFR r, amount`
    Shfr,
    /// `LDIMM r, imm`
    Ldimm,
    /// `LDADR r, addr`
    Ldadr,
    /// `LDOFF r, base, offset`
    Ldoff,
    /// `STADR r, addr`
    Stadr,
    /// `STOFF r, base, offset`
    Stoff,
    /// `COD name operands...`
    Cod,
    /// Unrecognized line.
    Unknown,
}

impl Opcode {
    const TABLE: [Self; 19] = [
        Self::Commit,
        Self::Label,
        Self::Jmplbl,
        Self::Jmppc,
        Self::Breq,
        Self::Bgt,
        Self::Bget,
        Self::Blt,
        Self::Blet,
        Self::Add,
        Self::Sub,
        Self::Shfl,
        Self::Shfr,
        Self::Ldimm,
        Self::Ldadr,
        Self::Ldoff,
        Self::Stadr,
        Self::Stoff,
        Self::Cod,
    ];

    /// Looks up a mnemonic, ignoring case.
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        let upper = mnemonic.trim().to_ascii_uppercase();
        Self::TABLE.into_iter().find(|op| op.mnemonic() == upper)
    }

    /// Assembly mnemonic.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Commit => "COMMIT",
            Self::Label => "LABEL",
            Self::Jmplbl => "JMPLBL",
            Self::Jmppc => "JMPPC",
            Self::Breq => "BREQ",
            Self::Bgt => "BGT",
            Self::Bget => "BGET",
            Self::Blt => "BLT",
            Self::Blet => "BLET",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Shfl => "SHFL",
            Self::Shfr => "SHFR",
            Self::Ldimm => "LDIMM",
            Self::Ldadr => "LDADR",
            Self::Ldoff => "LDOFF",
            Self::Stadr => "STADR",
            Self::Stoff => "STOFF",
            Self::Cod => "COD",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Instruction kind.
    pub const fn kind(self) -> InstKind {
        match self {
            Self::Commit => InstKind::Commit,
            Self::Label => InstKind::Label,
            Self::Jmplbl | Self::Jmppc | Self::Breq | Self::Bgt | Self::Bget | Self::Blt | Self::Blet => {
                InstKind::Control
            }
            Self::Add | Self::Sub | Self::Shfl | Self::Shfr => InstKind::Arithmetic,
            Self::Ldimm | Self::Ldadr | Self::Ldoff | Self::Stadr | Self::Stoff => InstKind::Memory,
            Self::Cod => InstKind::Execute,
            Self::Unknown => InstKind::Unknown,
        }
    }

    /// Read/write intent of the fixed operations. Codelets supply their own mask.
    pub fn io(self) -> OpIo {
        match self {
            Self::Breq | Self::Bgt | Self::Bget | Self::Blt | Self::Blet => OpIo::OP1_RD | OpIo::OP2_RD,
            Self::Add | Self::Sub | Self::Ldoff => OpIo::OP1_WR | OpIo::OP2_RD | OpIo::OP3_RD,
            Self::Shfl | Self::Shfr => OpIo::OP1_RD | OpIo::OP1_WR | OpIo::OP2_RD,
            Self::Ldimm => OpIo::OP1_WR,
            Self::Ldadr => OpIo::OP1_WR | OpIo::OP2_RD,
            Self::Stadr => OpIo::OP1_RD | OpIo::OP2_RD,
            Self::Stoff => OpIo::OP1_RD | OpIo::OP2_RD | OpIo::OP3_RD,
            Self::Commit | Self::Label | Self::Jmplbl | Self::Jmppc | Self::Cod | Self::Unknown => OpIo::NONE,
        }
    }

    /// Number of operands the fixed operations take, or `None` for codelets.
    pub const fn operand_count(self) -> Option<usize> {
        match self {
            Self::Commit | Self::Unknown => Some(0),
            Self::Label | Self::Jmplbl | Self::Jmppc => Some(1),
            Self::Shfl | Self::Shfr | Self::Ldimm | Self::Ldadr | Self::Stadr => Some(2),
            Self::Breq
            | Self::Bgt
            | Self::Bget
            | Self::Blt
            | Self::Blet
            | Self::Add
            | Self::Sub
            | Self::Ldoff
            | Self::Stoff => Some(3),
            Self::Cod => None,
        }
    }

    /// True for loads.
    pub const fn is_load(self) -> bool {
        matches!(self, Self::Ldimm | Self::Ldadr | Self::Ldoff)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
