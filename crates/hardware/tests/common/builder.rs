//! Decoded-instruction constructors for policy-level tests.

use scmsim_core::common::RegId;
use scmsim_core::isa::{CodeletRegistry, DecodedInstruction, Opcode, Operand};

/// `LDIMM dst, value`
pub fn ldimm(dst: RegId, value: u64) -> DecodedInstruction {
    DecodedInstruction::new(Opcode::Ldimm, vec![dst.into(), Operand::imm(value)])
}

/// `ADD dst, a, b`
pub fn add(dst: RegId, a: RegId, b: RegId) -> DecodedInstruction {
    DecodedInstruction::new(Opcode::Add, vec![dst.into(), a.into(), b.into()])
}

/// `LDADR dst, address`
pub fn ldadr(dst: RegId, address: u64) -> DecodedInstruction {
    DecodedInstruction::new(Opcode::Ldadr, vec![dst.into(), Operand::imm(address)])
}

/// `STADR src, address`
pub fn stadr(src: RegId, address: u64) -> DecodedInstruction {
    DecodedInstruction::new(Opcode::Stadr, vec![src.into(), Operand::imm(address)])
}

/// `COMMIT`
pub fn commit() -> DecodedInstruction {
    DecodedInstruction::new(Opcode::Commit, Vec::new())
}

/// `COD name operands...` using the built-in registry.
pub fn cod(name: &str, operands: Vec<Operand>) -> DecodedInstruction {
    let codelet = CodeletRegistry::with_builtins().create(name).unwrap();
    DecodedInstruction::with_codelet(codelet, operands)
}
