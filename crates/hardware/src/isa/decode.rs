//! Program line decoder.
//!
//! Turns a `ProgramLine` (the already-tokenized form of one line of assembly) into a
//! `DecodedInstruction`. Decoding never fails: anything the decoder does not recognize
//! becomes an `Unknown` instruction, and the fetch stage reports it as fatal when (and
//! only when) control flow actually reaches it.

use std::fmt;
use std::sync::Arc;

use crate::common::constants::MAX_NUM_OPERANDS;
use crate::isa::codelet::CodeletRegistry;
use crate::isa::instruction::{DecodedInstruction, Operand};
use crate::isa::opcodes::Opcode;

/// One line of a program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgramLine {
    /// A jump target.
    Label(String),
    /// A fixed operation.
    Instruction {
        /// Mnemonic, case-insensitive.
        mnemonic: String,
        /// Operands in source order.
        operands: Vec<Operand>,
    },
    /// A codelet invocation (`COD name ...`).
    Codelet {
        /// Registry name.
        name: String,
        /// Operands in source order.
        operands: Vec<Operand>,
    },
}

impl fmt::Display for ProgramLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (head, operands) = match self {
            Self::Label(name) => return write!(f, "{name}:"),
            Self::Instruction { mnemonic, operands } => (mnemonic.clone(), operands),
            Self::Codelet { name, operands } => (format!("COD {name}"), operands),
        };
        f.write_str(&head)?;
        for (i, operand) in operands.iter().enumerate() {
            f.write_str(if i == 0 { " " } else { ", " })?;
            write!(f, "{operand}")?;
        }
        Ok(())
    }
}

/// Decoder bound to a codelet registry.
#[derive(Debug, Clone)]
pub struct Decoder {
    registry: Arc<CodeletRegistry>,
}

impl Decoder {
    /// Creates a decoder that instantiates codelets from `registry`.
    pub const fn new(registry: Arc<CodeletRegistry>) -> Self {
        Self { registry }
    }

    /// Decodes one line.
    pub fn decode(&self, line: &ProgramLine) -> DecodedInstruction {
        match line {
            ProgramLine::Label(name) => DecodedInstruction::label(name.clone()),
            ProgramLine::Instruction { mnemonic, operands } => {
                match Opcode::from_mnemonic(mnemonic) {
                    Some(Opcode::Cod | Opcode::Label | Opcode::Unknown) | None => {
                        DecodedInstruction::unknown(line.to_string())
                    }
                    Some(opcode) if opcode.operand_count() != Some(operands.len()) => {
                        DecodedInstruction::unknown(line.to_string())
                    }
                    Some(opcode) => DecodedInstruction::new(opcode, operands.clone()),
                }
            }
            ProgramLine::Codelet { name, operands } => match self.registry.create(name) {
                Some(codelet) if operands.len() <= MAX_NUM_OPERANDS => {
                    DecodedInstruction::with_codelet(codelet, operands.clone())
                }
                _ => DecodedInstruction::unknown(line.to_string()),
            },
        }
    }
}
