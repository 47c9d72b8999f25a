//! Execution units.
//!
//! Each unit owns one execution slot and runs on its own thread for the whole run. The
//! poll loop is an explicit state machine:
//! 1. **Polling:** Check the alive flag, then the slot; idle through the poll strategy.
//! 2. **Executing:** Run the instruction against shared registers and memory.
//! 3. **Reporting:** Publish the completion and return to polling.
//!
//! Units only touch register bytes and memory ranges the scheduler granted them, so the
//! loop holds no locks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{debug, trace};

use crate::common::error::{SimError, SimResult};
use crate::common::reg::{RegId, RegisterFile};
use crate::config::{ComparisonMode, PollStrategy};
use crate::core::control_store::{Completion, Dispatch, ExecutionSlot};
use crate::core::fault::FaultModel;
use crate::isa::codelet::ExecutionContext;
use crate::isa::instruction::DecodedInstruction;
use crate::isa::opcodes::{InstKind, Opcode};
use crate::soc::Memory;

#[derive(Debug)]
enum UnitState {
    Polling,
    Executing(Dispatch),
    Reporting(Completion),
}

/// One execution unit.
#[derive(Debug)]
pub struct ExecutionUnit {
    index: usize,
    faults: Box<dyn FaultModel>,
    comparison: ComparisonMode,
}

impl ExecutionUnit {
    /// Creates unit `index` with its fault model.
    ///
    /// # Arguments
    ///
    /// * `index` - Unit number, also the index of its slot.
    /// * `faults` - Fault policy queried after non-memory codelets.
    /// * `comparison` - Vote comparison mode; `RegisterContents` makes injected faults
    ///   visible in the written registers.
    pub fn new(index: usize, faults: Box<dyn FaultModel>, comparison: ComparisonMode) -> Self {
        Self {
            index,
            faults,
            comparison,
        }
    }

    /// Unit number.
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Drains `slot` until `alive` is cleared.
    ///
    /// Work taken before the flag drops always runs to completion and is reported.
    pub fn run(
        &mut self,
        slot: &ExecutionSlot,
        alive: &AtomicBool,
        regs: &RegisterFile,
        memory: &Memory,
        poll: PollStrategy,
    ) {
        debug!(unit = self.index, "execution unit started");
        let mut spins = 0;
        let mut state = UnitState::Polling;
        loop {
            state = match state {
                UnitState::Polling => {
                    if !alive.load(Ordering::Acquire) {
                        break;
                    }
                    match slot.take_assigned() {
                        Some(dispatch) => {
                            spins = 0;
                            UnitState::Executing(dispatch)
                        }
                        None => {
                            poll.idle(&mut spins);
                            UnitState::Polling
                        }
                    }
                }
                UnitState::Executing(dispatch) => {
                    UnitState::Reporting(self.execute(dispatch, regs, memory))
                }
                UnitState::Reporting(completion) => {
                    slot.complete(completion);
                    UnitState::Polling
                }
            };
        }
        debug!(unit = self.index, "execution unit stopped");
    }

    /// Runs one dispatched instruction and packages the outcome.
    pub fn execute(&mut self, dispatch: Dispatch, regs: &RegisterFile, memory: &Memory) -> Completion {
        let Dispatch {
            tag,
            duplicate,
            mut inst,
        } = dispatch;
        trace!(unit = self.index, inst = %inst, "executing");
        let result = self
            .perform(&mut inst, regs, memory)
            .map(|()| inst.failed());
        Completion {
            tag,
            duplicate,
            result,
        }
    }

    fn perform(
        &mut self,
        inst: &mut DecodedInstruction,
        regs: &RegisterFile,
        memory: &Memory,
    ) -> SimResult<()> {
        match inst.kind() {
            InstKind::Arithmetic => arithmetic(inst, regs),
            InstKind::Memory => memory_move(inst, regs, memory),
            InstKind::Execute => self.run_codelet(inst, regs, memory),
            _ => Err(SimError::Internal(format!(
                "`{inst}` cannot run on an execution unit"
            ))),
        }
    }

    fn run_codelet(
        &mut self,
        inst: &mut DecodedInstruction,
        regs: &RegisterFile,
        memory: &Memory,
    ) -> SimResult<()> {
        let codelet = inst
            .codelet()
            .cloned()
            .ok_or_else(|| SimError::Internal(format!("`{inst}` has no codelet bound")))?;
        let started = Instant::now();
        codelet.run(&ExecutionContext::new(
            self.index,
            codelet.name(),
            inst.operands(),
            regs,
            memory,
        ))?;
        if codelet.is_memory_codelet() || !self.faults.should_inject(started.elapsed()) {
            return Ok(());
        }

        debug!(unit = self.index, inst = %inst, "fault injected");
        inst.set_failed(true);
        if self.comparison == ComparisonMode::RegisterContents {
            for index in inst.written_operands() {
                if let Some(id) = inst.register(index) {
                    regs.update(id, |_, byte| !byte)?;
                }
            }
        }
        Ok(())
    }
}

fn destination(inst: &DecodedInstruction) -> SimResult<RegId> {
    inst.register(0)
        .ok_or_else(|| inst.invalid_operand(0, "a register"))
}

fn arithmetic(inst: &DecodedInstruction, regs: &RegisterFile) -> SimResult<()> {
    let dst = destination(inst)?;
    let value = match inst.opcode() {
        Opcode::Add => inst.value_of(1, regs)?.wrapping_add(inst.value_of(2, regs)?),
        Opcode::Sub => inst.value_of(1, regs)?.wrapping_sub(inst.value_of(2, regs)?),
        Opcode::Shfl | Opcode::Shfr => {
            let current = regs.read_u64(dst)?;
            let amount = u32::try_from(inst.value_of(1, regs)?).unwrap_or(u32::MAX);
            let shifted = if inst.opcode() == Opcode::Shfl {
                current.checked_shl(amount)
            } else {
                current.checked_shr(amount)
            };
            shifted.unwrap_or(0)
        }
        other => {
            return Err(SimError::Internal(format!("{other} is not arithmetic")));
        }
    };
    regs.write_u64(dst, value)
}

fn effective_address(inst: &DecodedInstruction, regs: &RegisterFile) -> SimResult<u64> {
    let base = inst.value_of(1, regs)?;
    if matches!(inst.opcode(), Opcode::Ldoff | Opcode::Stoff) {
        Ok(base.wrapping_add(inst.value_of(2, regs)?))
    } else {
        Ok(base)
    }
}

fn memory_move(inst: &DecodedInstruction, regs: &RegisterFile, memory: &Memory) -> SimResult<()> {
    let reg = destination(inst)?;
    match inst.opcode() {
        Opcode::Ldimm => regs.write_u64(reg, inst.value_of(1, regs)?),
        Opcode::Ldadr | Opcode::Ldoff => {
            let data = memory.read(effective_address(inst, regs)?, reg.byte_size())?;
            regs.write(reg, &data)
        }
        Opcode::Stadr | Opcode::Stoff => {
            let data = regs.read(reg)?;
            memory.write(effective_address(inst, regs)?, &data)
        }
        other => Err(SimError::Internal(format!("{other} is not a memory move"))),
    }
}
