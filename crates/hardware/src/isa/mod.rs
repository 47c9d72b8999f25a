//! Instruction Set Definitions.
//!
//! Contains the opcode table, the decoded instruction representation the scheduler
//! mutates, the codelet capability interface, and the decoder.
//!
//! # Instruction kinds
//!
//! * `Control`: branches and jumps, resolved by the fetch-decode driver.
//! * `Arithmetic`: scalar u64 operations on registers.
//! * `Memory`: loads and stores between registers and the flat memory.
//! * `Execute`: codelet invocations.
//! * `Commit`: end of program and pipeline drain barrier.

/// Built-in codelets.
pub mod builtin;

/// Codelet trait, execution context, and registry.
pub mod codelet;

/// Program line decoder.
pub mod decode;

/// Decoded instructions and operands.
pub mod instruction;

/// Opcodes, kinds, and read/write intent masks.
pub mod opcodes;

pub use codelet::{Codelet, CodeletRegistry, ExecutionContext};
pub use decode::{Decoder, ProgramLine};
pub use instruction::{DecodedInstruction, Operand, RegDir, RegOperand};
pub use opcodes::{InstKind, OpIo, Opcode};
