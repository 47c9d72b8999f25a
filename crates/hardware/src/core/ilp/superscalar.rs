//! Superscalar policy.
//!
//! Every register an instruction touches is reserved for as long as the instruction is
//! in flight. Readers share a reservation; a writer needs the register to itself. There
//! is no renaming, so any WAW, WAR, or RAW conflict stalls the whole instruction.

use std::collections::HashMap;

use tracing::{error, trace};

use crate::common::error::SimResult;
use crate::common::range::MemoryRange;
use crate::common::reg::{RegId, RegisterFile};
use crate::core::buffer::{InstState, InstTag, InstructionBuffer};
use crate::core::ilp::IlpController;
use crate::core::ilp::hazards::MemoryHazardTracker;
use crate::isa::opcodes::InstKind;

#[derive(Clone, Copy, Debug, Default)]
struct Reservation {
    readers: u32,
    writer: bool,
}

impl Reservation {
    const fn is_free(self) -> bool {
        self.readers == 0 && !self.writer
    }
}

/// Register reservation table plus memory range claims.
#[derive(Debug, Default)]
pub struct Superscalar {
    busy: HashMap<RegId, Reservation>,
    tracker: MemoryHazardTracker,
    held: HashMap<InstTag, Vec<MemoryRange>>,
}

impl Superscalar {
    /// Creates the policy with nothing reserved.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registers currently reserved.
    pub fn busy_registers(&self) -> usize {
        self.busy.len()
    }
}

impl IlpController for Superscalar {
    fn try_schedule(
        &mut self,
        tag: InstTag,
        buffer: &mut InstructionBuffer,
        regs: &RegisterFile,
    ) -> SimResult<bool> {
        let entry = buffer.entry_mut(tag)?;
        if entry.inst.kind() == InstKind::Commit {
            let drained = self.busy.is_empty() && self.tracker.is_empty();
            entry.state = if drained { InstState::Ready } else { InstState::Stall };
            return Ok(drained);
        }

        let dirs = entry.inst.register_dirs();
        let conflict = dirs.iter().find(|(id, dir)| {
            self.busy
                .get(id)
                .is_some_and(|held| held.writer || dir.writes())
        });
        if let Some((id, _)) = conflict {
            trace!(inst = %tag, register = %id, "register hazard");
            entry.state = InstState::Stall;
            return Ok(false);
        }

        // Address registers were just checked free of writers, so their values are final.
        let ranges = if entry.inst.touches_memory() {
            entry.inst.memory_ranges(regs)?.to_vec()
        } else {
            Vec::new()
        };
        if self.tracker.overlaps_any(&ranges) {
            trace!(inst = %tag, "memory hazard");
            entry.state = InstState::Stall;
            return Ok(false);
        }

        for (id, dir) in dirs {
            let held = self.busy.entry(id).or_default();
            if dir.writes() {
                held.writer = true;
            } else {
                held.readers += 1;
            }
        }
        if !ranges.is_empty() {
            for range in &ranges {
                self.tracker.add_range(*range);
            }
            let _ = self.held.insert(tag, ranges);
        }
        entry.inst.mark_all_ready();
        entry.state = InstState::Ready;
        Ok(true)
    }

    fn on_finished(
        &mut self,
        tag: InstTag,
        buffer: &mut InstructionBuffer,
        _regs: &RegisterFile,
    ) -> SimResult<()> {
        for (id, dir) in buffer.entry(tag)?.inst.register_dirs() {
            let Some(held) = self.busy.get_mut(&id) else {
                error!(inst = %tag, register = %id, "released a register that was not reserved");
                continue;
            };
            if dir.writes() {
                held.writer = false;
            } else {
                held.readers = held.readers.saturating_sub(1);
            }
            if held.is_free() {
                let _ = self.busy.remove(&id);
            }
        }
        for range in self.held.remove(&tag).unwrap_or_default() {
            if !self.tracker.remove_range(&range) {
                error!(inst = %tag, %range, "released a memory range that was not claimed");
            }
        }
        Ok(())
    }

    fn in_order(&self) -> bool {
        true
    }

    fn is_quiescent(&self) -> bool {
        self.busy.is_empty() && self.tracker.is_empty()
    }
}
