//! Sequential policy: a single execution slot token.

use tracing::trace;

use crate::common::error::SimResult;
use crate::common::reg::RegisterFile;
use crate::core::buffer::{InstState, InstTag, InstructionBuffer};
use crate::core::ilp::IlpController;
use crate::isa::opcodes::InstKind;

/// Admits one instruction at a time; the baseline every other policy is checked against.
#[derive(Debug, Default)]
pub struct Sequential {
    occupant: Option<InstTag>,
}

impl Sequential {
    /// Creates the policy with the slot free.
    pub const fn new() -> Self {
        Self { occupant: None }
    }

    /// Instruction currently holding the slot.
    pub const fn occupant(&self) -> Option<InstTag> {
        self.occupant
    }
}

impl IlpController for Sequential {
    fn try_schedule(
        &mut self,
        tag: InstTag,
        buffer: &mut InstructionBuffer,
        _regs: &RegisterFile,
    ) -> SimResult<bool> {
        let entry = buffer.entry_mut(tag)?;
        if let Some(holder) = self.occupant {
            trace!(inst = %tag, holder = %holder, "slot busy");
            entry.state = InstState::Stall;
            return Ok(false);
        }
        // COMMIT only needs the slot to be free; it never runs on a unit.
        if entry.inst.kind() != InstKind::Commit {
            self.occupant = Some(tag);
        }
        entry.inst.mark_all_ready();
        entry.state = InstState::Ready;
        Ok(true)
    }

    fn on_finished(
        &mut self,
        tag: InstTag,
        _buffer: &mut InstructionBuffer,
        _regs: &RegisterFile,
    ) -> SimResult<()> {
        if self.occupant == Some(tag) {
            self.occupant = None;
        }
        Ok(())
    }

    fn in_order(&self) -> bool {
        true
    }

    fn is_quiescent(&self) -> bool {
        self.occupant.is_none()
    }
}
