//! Fetch-decode driver.
//!
//! The driver is the single scheduling thread. Every tick it walks the same fixed order:
//! 1. **Collect:** Drain finished execution slots back into the buffer.
//! 2. **Retire:** Vote on finished work, release its hazards, and decommission it.
//! 3. **Fetch:** Decode up to `fetch_width` program lines into the buffer.
//! 4. **Schedule:** Offer waiting and stalled instructions to the ILP controller.
//! 5. **Dispatch:** Resolve control flow inline, finish on COMMIT, and hand everything
//!    else (clones included) to free execution slots.
//! 6. **Clean Out:** Drop decommissioned entries from the window.
//!
//! The driver owns the buffer, the ILP controller, and the duplication controller, so
//! no scheduler state is ever shared with the execution units.

use std::sync::Arc;

use tracing::{debug, error, trace};

use crate::common::error::{SimError, SimResult};
use crate::common::reg::RegisterFile;
use crate::config::Config;
use crate::core::buffer::{InstState, InstTag, InstructionBuffer};
use crate::core::control_store::{ControlStore, Dispatch};
use crate::core::duplication::{DuplicationController, Vote};
use crate::core::ilp::{IlpController, IlpDispatch};
use crate::isa::codelet::CodeletRegistry;
use crate::isa::decode::{Decoder, ProgramLine};
use crate::isa::instruction::{DecodedInstruction, Operand};
use crate::isa::opcodes::{InstKind, Opcode};
use crate::sim::program::Program;
use crate::stats::SimStats;

/// What a tick achieved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// At least one instruction changed state.
    Busy,
    /// Nothing changed; the units still hold work.
    Idle,
    /// COMMIT retired and the run is over.
    Committed,
}

/// The scheduling side of the machine.
#[derive(Debug)]
pub struct FetchDecode {
    program: Program,
    decoder: Decoder,
    buffer: InstructionBuffer,
    ilp: IlpDispatch,
    duplication: DuplicationController,
    stats: SimStats,
    pc: usize,
    branch_pending: bool,
    fetch_done: bool,
    fetch_width: usize,
    slot_cursor: usize,
}

impl FetchDecode {
    /// Creates a driver positioned at the first line of `program`.
    ///
    /// # Arguments
    ///
    /// * `config` - Window size, fetch width, ILP policy, and resiliency settings.
    /// * `program` - The program to run.
    /// * `registry` - Codelet factories used by the decoder.
    pub fn new(config: &Config, program: Program, registry: Arc<CodeletRegistry>) -> Self {
        Self {
            program,
            decoder: Decoder::new(registry),
            buffer: InstructionBuffer::new(config.general.buffer_size),
            ilp: IlpDispatch::new(config.general.ilp_mode),
            duplication: DuplicationController::new(&config.resiliency),
            stats: SimStats::default(),
            pc: 0,
            branch_pending: false,
            fetch_done: false,
            fetch_width: config.general.fetch_width,
            slot_cursor: 0,
        }
    }

    /// The instruction window.
    pub const fn buffer(&self) -> &InstructionBuffer {
        &self.buffer
    }

    /// The active ILP policy.
    pub const fn ilp(&self) -> &IlpDispatch {
        &self.ilp
    }

    /// The duplication controller.
    pub const fn duplication(&self) -> &DuplicationController {
        &self.duplication
    }

    /// Counters so far.
    pub const fn stats(&self) -> &SimStats {
        &self.stats
    }

    /// Next line to fetch.
    pub const fn pc(&self) -> usize {
        self.pc
    }

    /// Runs one scheduler tick.
    ///
    /// # Returns
    ///
    /// `Committed` once COMMIT retired, `Busy` if anything moved, and `Idle` if the
    /// tick only waited on running units. A tick that moves nothing while every slot is
    /// empty can never make progress and is reported as an internal error.
    pub fn tick(&mut self, store: &ControlStore, regs: &RegisterFile) -> SimResult<TickOutcome> {
        let spawned = self.duplication.counters().spawned;
        let mut progressed = self.collect(store)?;
        progressed |= self.retire(regs)?;
        progressed |= self.fetch()?;
        progressed |= self.schedule(regs)?;

        let outcome = match self.dispatch(store, regs)? {
            Some(TickOutcome::Committed) => TickOutcome::Committed,
            other => {
                progressed |= other.is_some();
                progressed |= self.dispatch_duplicates(store)?;
                progressed |= self.duplication.counters().spawned != spawned;
                if progressed {
                    TickOutcome::Busy
                } else {
                    TickOutcome::Idle
                }
            }
        };

        self.stats.max_in_flight = self.stats.max_in_flight.max(store.in_flight() as u64);
        let _ = self.buffer.clean_out();
        self.stats.ticks += 1;
        self.sync_counters();

        if outcome == TickOutcome::Idle && store.in_flight() == 0 {
            return Err(SimError::Internal(format!(
                "scheduler deadlock at pc {} with {} buffered instructions",
                self.pc,
                self.buffer.len()
            )));
        }
        trace!(tick = self.stats.ticks, ?outcome, buffered = self.buffer.len(), "tick");
        Ok(outcome)
    }

    fn sync_counters(&mut self) {
        let ilp = self.ilp.counters();
        self.stats.renames = ilp.renames;
        self.stats.structural_hazards = ilp.structural_hazards;
        self.stats.broadcasts = ilp.broadcasts;
        let duplication = self.duplication.counters();
        self.stats.duplicates_spawned = duplication.spawned;
        self.stats.votes = duplication.votes;
        self.stats.overrides = duplication.overrides;
    }

    fn collect(&mut self, store: &ControlStore) -> SimResult<bool> {
        let completions = store.collect();
        let progressed = !completions.is_empty();
        for completion in completions {
            let failed = match completion.result {
                Ok(failed) => failed,
                Err(err) => {
                    let inst = self
                        .buffer
                        .get(completion.tag)
                        .map(|entry| entry.inst.to_string())
                        .unwrap_or_default();
                    error!(inst = %inst, error = %err, "execution failed");
                    return Err(err);
                }
            };
            if failed {
                self.stats.faults_injected += 1;
            }
            let entry = self.buffer.entry_mut(completion.tag)?;
            entry.inst.set_failed(failed);
            entry.state = if completion.duplicate {
                InstState::ExecutionDoneDuplicate
            } else {
                InstState::ExecutionDone
            };
            trace!(inst = %completion.tag, failed, "execution done");
        }
        Ok(progressed)
    }

    fn retire(&mut self, regs: &RegisterFile) -> SimResult<bool> {
        let mut progressed = false;
        for tag in self.buffer.tags() {
            if self.buffer.state(tag) != Some(InstState::ExecutionDone) {
                continue;
            }
            if self.duplication.vote(tag, &mut self.buffer, regs)? == Vote::Pending {
                continue;
            }
            self.ilp.on_finished(tag, &mut self.buffer, regs)?;
            self.duplication.cleanup(tag, &mut self.buffer);
            self.buffer.set_state(tag, InstState::Decommission);
            self.stats.retired += 1;
            progressed = true;
        }
        Ok(progressed)
    }

    fn fetch(&mut self) -> SimResult<bool> {
        let mut progressed = false;
        let mut fetched = 0;
        while fetched < self.fetch_width
            && !self.fetch_done
            && !self.branch_pending
            && !self.buffer.is_full()
        {
            let line = self
                .program
                .line(self.pc)
                .ok_or(SimError::ProgramOverrun { pc: self.pc })?;
            progressed = true;
            if matches!(line, ProgramLine::Label(_)) {
                self.pc += 1;
                continue;
            }
            let inst = self.decoder.decode(line);
            let kind = inst.kind();
            if kind == InstKind::Unknown {
                return Err(SimError::UnknownInstruction {
                    pc: self.pc,
                    text: line.to_string(),
                });
            }
            trace!(pc = self.pc, inst = %inst, "fetched");
            let _ = self.buffer.push(inst, self.pc);
            self.stats.fetched += 1;
            fetched += 1;
            match kind {
                InstKind::Commit => self.fetch_done = true,
                InstKind::Control => self.branch_pending = true,
                _ => self.pc += 1,
            }
        }
        Ok(progressed)
    }

    fn schedule(&mut self, regs: &RegisterFile) -> SimResult<bool> {
        let mut progressed = false;
        let in_order = self.ilp.in_order();
        for tag in self.buffer.tags() {
            if !matches!(
                self.buffer.state(tag),
                Some(InstState::Waiting | InstState::Stall)
            ) {
                continue;
            }
            if self.ilp.try_schedule(tag, &mut self.buffer, regs)? {
                debug!(inst = %tag, "ready");
                progressed = true;
            } else {
                self.stats.stalls += 1;
                if in_order {
                    break;
                }
            }
        }
        Ok(progressed)
    }

    /// True if every program instruction older than `tag` has been decommissioned.
    fn is_oldest(&self, tag: InstTag) -> bool {
        self.buffer
            .tags()
            .into_iter()
            .take_while(|older| *older != tag)
            .all(|older| self.buffer.state(older) == Some(InstState::Decommission))
    }

    fn dispatch(&mut self, store: &ControlStore, regs: &RegisterFile) -> SimResult<Option<TickOutcome>> {
        let mut outcome = None;
        for tag in self.buffer.tags() {
            if self.buffer.state(tag) != Some(InstState::Ready) {
                continue;
            }
            match self.buffer.entry(tag)?.inst.kind() {
                InstKind::Commit => {
                    if self.is_oldest(tag) && self.buffer.group_originals().is_empty() {
                        self.ilp.drain(regs)?;
                        self.buffer.set_state(tag, InstState::Decommission);
                        self.stats.retired += 1;
                        debug!(inst = %tag, "commit retired");
                        return Ok(Some(TickOutcome::Committed));
                    }
                }
                InstKind::Control => {
                    self.resolve_control(tag, regs)?;
                    outcome = Some(TickOutcome::Busy);
                }
                _ => {
                    if self.duplication.applies(&self.buffer.entry(tag)?.inst)
                        && !self.duplication.duplicate(tag, &mut self.buffer, regs)?
                    {
                        continue;
                    }
                    if !store.has_free_slot() {
                        continue;
                    }
                    if self.assign(store, tag, false)? {
                        outcome = Some(TickOutcome::Busy);
                    }
                }
            }
        }
        Ok(outcome)
    }

    fn dispatch_duplicates(&mut self, store: &ControlStore) -> SimResult<bool> {
        let mut progressed = false;
        for original in self.buffer.group_originals() {
            for clone in self.buffer.duplicates(original).to_vec() {
                if self.buffer.state(clone) != Some(InstState::Ready) {
                    continue;
                }
                if !store.has_free_slot() {
                    return Ok(progressed);
                }
                progressed |= self.assign(store, clone, true)?;
            }
        }
        Ok(progressed)
    }

    fn assign(&mut self, store: &ControlStore, tag: InstTag, duplicate: bool) -> SimResult<bool> {
        let inst = self.buffer.entry(tag)?.inst.clone();
        match store.try_assign(Dispatch { tag, duplicate, inst }, &mut self.slot_cursor) {
            Ok(unit) => {
                self.buffer.set_state(
                    tag,
                    if duplicate {
                        InstState::ExecutingDuplicate
                    } else {
                        InstState::Executing
                    },
                );
                self.stats.dispatched += 1;
                debug!(inst = %tag, unit, duplicate, "dispatched");
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    fn resolve_control(&mut self, tag: InstTag, regs: &RegisterFile) -> SimResult<()> {
        let entry = self.buffer.entry(tag)?;
        let target = self.branch_target(&entry.inst, entry.pc, regs)?;
        debug!(inst = %tag, from = entry.pc, to = target, "control resolved");
        self.pc = target;
        self.branch_pending = false;
        self.ilp.on_finished(tag, &mut self.buffer, regs)?;
        self.buffer.set_state(tag, InstState::Decommission);
        self.stats.control_resolved += 1;
        self.stats.retired += 1;
        Ok(())
    }

    fn branch_target(&self, inst: &DecodedInstruction, pc: usize, regs: &RegisterFile) -> SimResult<usize> {
        let relative = |offset: u64| {
            pc.checked_add_signed(offset as i64 as isize)
                .ok_or(SimError::ProgramOverrun { pc })
        };
        match inst.opcode() {
            Opcode::Jmplbl => match inst.operand(0) {
                Operand::Label(label) => {
                    self.program
                        .label(label)
                        .ok_or_else(|| SimError::UnknownLabel {
                            label: label.clone(),
                            instruction: inst.to_string(),
                        })
                }
                _ => Err(inst.invalid_operand(0, "a label")),
            },
            Opcode::Jmppc => relative(inst.value_of(0, regs)?),
            opcode => {
                let (a, b) = (inst.value_of(0, regs)?, inst.value_of(1, regs)?);
                let taken = match opcode {
                    Opcode::Breq => a == b,
                    Opcode::Bgt => a > b,
                    Opcode::Bget => a >= b,
                    Opcode::Blt => a < b,
                    Opcode::Blet => a <= b,
                    other => {
                        return Err(SimError::Internal(format!("{other} is not a control operation")));
                    }
                };
                if taken {
                    relative(inst.value_of(2, regs)?)
                } else {
                    Ok(pc + 1)
                }
            }
        }
    }
}
