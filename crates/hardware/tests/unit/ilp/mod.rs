//! ILP policy suites.
//!
//! `Window` plays the part of the fetch-decode driver: instructions are pushed into a
//! buffer, offered to the controller, and executed on an `ExecutionUnit` in whatever
//! order a test chooses. That makes interleavings the threaded driver would only hit by
//! chance reproducible.

/// Loads and stores sharing memory ranges.
pub mod memory;

/// Renaming, broadcast, and continuation.
pub mod ooo;

/// One instruction in flight.
pub mod sequential;

/// Register reservations.
pub mod superscalar;

use scmsim_core::common::RegisterFile;
use scmsim_core::config::{ComparisonMode, IlpMode};
use scmsim_core::core::control_store::Dispatch;
use scmsim_core::core::executor::ExecutionUnit;
use scmsim_core::core::fault::NoFaults;
use scmsim_core::core::ilp::{IlpController, IlpDispatch};
use scmsim_core::core::{InstState, InstTag, InstructionBuffer};
use scmsim_core::isa::DecodedInstruction;
use scmsim_core::soc::Memory;

use crate::common::harness::{init_tracing, registers};

/// A hand-driven scheduling window.
pub struct Window {
    pub ilp: IlpDispatch,
    pub buffer: InstructionBuffer,
    pub regs: RegisterFile,
    pub memory: Memory,
    unit: ExecutionUnit,
    pc: usize,
}

impl Window {
    pub fn new(mode: IlpMode) -> Self {
        Self::with_registers(mode, registers(16, 8))
    }

    pub fn with_registers(mode: IlpMode, regs: RegisterFile) -> Self {
        init_tracing();
        Self {
            ilp: IlpDispatch::new(mode),
            buffer: InstructionBuffer::new(32),
            regs,
            memory: Memory::new(1024),
            unit: ExecutionUnit::new(0, Box::new(NoFaults), ComparisonMode::RegisterContents),
            pc: 0,
        }
    }

    /// Pushes `inst` as `Waiting`.
    pub fn push(&mut self, inst: DecodedInstruction) -> InstTag {
        let tag = self.buffer.push(inst, self.pc).unwrap();
        self.pc += 1;
        tag
    }

    /// Pushes `inst` and offers it to the controller once.
    pub fn issue(&mut self, inst: DecodedInstruction) -> (InstTag, bool) {
        let tag = self.push(inst);
        (tag, self.schedule(tag))
    }

    pub fn schedule(&mut self, tag: InstTag) -> bool {
        self.ilp
            .try_schedule(tag, &mut self.buffer, &self.regs)
            .unwrap()
    }

    pub fn state(&self, tag: InstTag) -> InstState {
        self.buffer.state(tag).unwrap()
    }

    pub fn is_ready(&self, tag: InstTag) -> bool {
        self.state(tag) == InstState::Ready
    }

    /// Runs a `Ready` instruction on the unit without retiring it.
    pub fn execute(&mut self, tag: InstTag) {
        assert!(self.is_ready(tag), "{tag} is {:?}", self.state(tag));
        let inst = self.buffer.entry(tag).unwrap().inst.clone();
        self.buffer.set_state(tag, InstState::Executing);
        let completion = self.unit.execute(
            Dispatch {
                tag,
                duplicate: false,
                inst,
            },
            &self.regs,
            &self.memory,
        );
        assert!(!completion.result.unwrap());
        self.buffer.set_state(tag, InstState::ExecutionDone);
    }

    /// Releases an executed instruction and decommissions it.
    pub fn finish(&mut self, tag: InstTag) {
        self.ilp
            .on_finished(tag, &mut self.buffer, &self.regs)
            .unwrap();
        self.buffer.set_state(tag, InstState::Decommission);
    }

    /// `execute` followed by `finish`.
    pub fn complete(&mut self, tag: InstTag) {
        self.execute(tag);
        self.finish(tag);
    }

    pub fn executing(&self) -> usize {
        self.buffer.count_in_state(InstState::Executing)
    }
}
