//! Instruction-level parallelism controllers.
//!
//! This module defines the scheduling contract and its three policies:
//! 1. **`IlpController`:** "Can this instruction be marked ready, and what must be mutated
//!    to make that true", plus the release path run when an instruction retires.
//! 2. **Sequential:** One instruction in flight at a time.
//! 3. **Superscalar:** Register reservations; anything but read-after-read stalls.
//! 4. **Out-of-Order:** Scoreboard with register renaming and value broadcast.
//! 5. **`IlpDispatch`:** Enum dispatch so the driver stores the policy without generics.
//!
//! Controllers are owned by the scheduling thread. Execution units never see them.

/// Multiset of claimed memory ranges.
pub mod hazards;

/// Scoreboard with renaming.
pub mod ooo;

/// One instruction in flight.
pub mod sequential;

/// Register reservations without renaming.
pub mod superscalar;

use crate::common::error::SimResult;
use crate::common::reg::{RegId, RegisterFile};
use crate::config::IlpMode;
use crate::core::buffer::{InstTag, InstructionBuffer};

pub use self::hazards::MemoryHazardTracker;
pub use self::ooo::OutOfOrder;
pub use self::sequential::Sequential;
pub use self::superscalar::Superscalar;

/// Bookkeeping counters reported by a controller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IlpCounters {
    /// Write operands given a fresh hidden identity.
    pub renames: u64,
    /// Times an instruction stalled on an exhausted rename pool.
    pub structural_hazards: u64,
    /// Register copies performed for broadcasters.
    pub broadcasts: u64,
}

/// The scheduling contract shared by every policy.
pub trait IlpController {
    /// Tries to promote a `Waiting` or `Stall` instruction to `Ready`.
    ///
    /// On success the instruction is `Ready` and every structure that justifies the
    /// decision has been updated. On failure the instruction is left `Stall` or
    /// `Waiting`. Safe to call again on the same instruction once conditions change.
    ///
    /// # Returns
    ///
    /// `true` if the instruction is now `Ready`.
    fn try_schedule(
        &mut self,
        tag: InstTag,
        buffer: &mut InstructionBuffer,
        regs: &RegisterFile,
    ) -> SimResult<bool>;

    /// Releases everything `tag` held and wakes instructions blocked on it.
    fn on_finished(
        &mut self,
        tag: InstTag,
        buffer: &mut InstructionBuffer,
        regs: &RegisterFile,
    ) -> SimResult<()>;

    /// True if the driver must stop its scheduling pass at the first refusal.
    fn in_order(&self) -> bool;

    /// True when no register or memory range is held.
    fn is_quiescent(&self) -> bool;

    /// Storage currently holding the newest value of an architectural register.
    fn resolve(&self, id: RegId) -> RegId {
        id
    }

    /// Folds renamed values back into architectural storage at the commit barrier.
    fn drain(&mut self, _regs: &RegisterFile) -> SimResult<()> {
        Ok(())
    }

    /// Bookkeeping counters.
    fn counters(&self) -> IlpCounters {
        IlpCounters::default()
    }
}

/// Type-erased controller storage for the driver.
#[derive(Debug)]
pub enum IlpDispatch {
    /// One instruction in flight.
    Sequential(Sequential),
    /// Register reservations.
    Superscalar(Superscalar),
    /// Scoreboard with renaming.
    OutOfOrder(Box<OutOfOrder>),
}

impl IlpDispatch {
    /// Builds the controller selected by `mode`.
    pub fn new(mode: IlpMode) -> Self {
        match mode {
            IlpMode::Sequential => Self::Sequential(Sequential::new()),
            IlpMode::Superscalar => Self::Superscalar(Superscalar::new()),
            IlpMode::OutOfOrder => Self::OutOfOrder(Box::default()),
        }
    }

    fn inner(&self) -> &dyn IlpController {
        match self {
            Self::Sequential(c) => c,
            Self::Superscalar(c) => c,
            Self::OutOfOrder(c) => c.as_ref(),
        }
    }

    fn inner_mut(&mut self) -> &mut dyn IlpController {
        match self {
            Self::Sequential(c) => c,
            Self::Superscalar(c) => c,
            Self::OutOfOrder(c) => c.as_mut(),
        }
    }
}

impl IlpController for IlpDispatch {
    fn try_schedule(
        &mut self,
        tag: InstTag,
        buffer: &mut InstructionBuffer,
        regs: &RegisterFile,
    ) -> SimResult<bool> {
        self.inner_mut().try_schedule(tag, buffer, regs)
    }

    fn on_finished(
        &mut self,
        tag: InstTag,
        buffer: &mut InstructionBuffer,
        regs: &RegisterFile,
    ) -> SimResult<()> {
        self.inner_mut().on_finished(tag, buffer, regs)
    }

    fn in_order(&self) -> bool {
        self.inner().in_order()
    }

    fn is_quiescent(&self) -> bool {
        self.inner().is_quiescent()
    }

    fn resolve(&self, id: RegId) -> RegId {
        self.inner().resolve(id)
    }

    fn drain(&mut self, regs: &RegisterFile) -> SimResult<()> {
        self.inner_mut().drain(regs)
    }

    fn counters(&self) -> IlpCounters {
        self.inner().counters()
    }
}
