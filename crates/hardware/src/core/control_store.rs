//! Control Store (execution slots).
//!
//! One single-entry handoff channel per execution unit. The slot state is the only
//! synchronization point between the scheduling thread and the execution threads:
//!
//! ```text
//!   scheduler               unit                 scheduler
//!   Empty --try_assign--> Busy --complete--> Done --take_completed--> Empty
//! ```
//!
//! Ownership of the payload follows the state. The scheduler owns the cell in `Empty`
//! and `Done`, the unit owns it in `Busy`. Every transition publishes the cell with a
//! `Release` store and each side `Acquire`-loads the state before touching it, so no
//! lock is ever taken and units can spin on the state.

use std::cell::UnsafeCell;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::common::error::SimResult;
use crate::core::buffer::InstTag;
use crate::isa::instruction::DecodedInstruction;

const EMPTY: u8 = 0;
const BUSY: u8 = 1;
const DONE: u8 = 2;

/// Work handed to an execution unit.
#[derive(Debug)]
pub struct Dispatch {
    /// Buffer entry the work belongs to.
    pub tag: InstTag,
    /// True for a duplication clone.
    pub duplicate: bool,
    /// Snapshot of the instruction with its final operand identities.
    pub inst: DecodedInstruction,
}

/// Result handed back by an execution unit.
#[derive(Debug)]
pub struct Completion {
    /// Buffer entry the result belongs to.
    pub tag: InstTag,
    /// True for a duplication clone.
    pub duplicate: bool,
    /// The fault flag on success; a fatal error otherwise.
    pub result: SimResult<bool>,
}

#[derive(Debug, Default)]
enum SlotCell {
    #[default]
    Vacant,
    Assigned(Dispatch),
    Finished(Completion),
}

/// Observable state of a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    /// Free for the scheduler.
    Empty,
    /// Owned by the execution unit.
    Busy,
    /// Result waiting for the scheduler.
    Done,
}

/// Single-entry handoff between the scheduler and one execution unit.
pub struct ExecutionSlot {
    state: AtomicU8,
    cell: UnsafeCell<SlotCell>,
}

// SAFETY: the cell is only accessed by the side that owns the current state (scheduler
// in EMPTY and DONE, unit in BUSY), and ownership changes through Release/Acquire on
// `state`. With exactly one scheduler and one unit per slot, accesses never overlap.
unsafe impl Sync for ExecutionSlot {}

impl ExecutionSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            cell: UnsafeCell::new(SlotCell::Vacant),
        }
    }

    /// Current state.
    pub fn state(&self) -> SlotState {
        match self.state.load(Ordering::Acquire) {
            EMPTY => SlotState::Empty,
            BUSY => SlotState::Busy,
            _ => SlotState::Done,
        }
    }

    /// Publishes `dispatch` if the slot is empty. Scheduler side.
    ///
    /// # Returns
    ///
    /// The dispatch back if the slot is occupied.
    pub fn try_assign(&self, dispatch: Dispatch) -> Result<(), Dispatch> {
        if self.state.load(Ordering::Acquire) != EMPTY {
            return Err(dispatch);
        }
        // SAFETY: EMPTY means the scheduler owns the cell and the unit will not look at it
        // until it observes BUSY below.
        unsafe {
            *self.cell.get() = SlotCell::Assigned(dispatch);
        }
        self.state.store(BUSY, Ordering::Release);
        Ok(())
    }

    /// Takes the published work, if any. Execution unit side.
    pub fn take_assigned(&self) -> Option<Dispatch> {
        if self.state.load(Ordering::Acquire) != BUSY {
            return None;
        }
        // SAFETY: BUSY means the unit owns the cell; the Acquire load above synchronizes
        // with the scheduler's Release store in `try_assign`.
        let cell = unsafe { &mut *self.cell.get() };
        match std::mem::take(cell) {
            SlotCell::Assigned(dispatch) => Some(dispatch),
            other => {
                *cell = other;
                None
            }
        }
    }

    /// Publishes the result of the taken work. Execution unit side.
    pub fn complete(&self, completion: Completion) {
        // SAFETY: only called by the unit after `take_assigned` succeeded, so the slot is
        // BUSY and owned by the unit.
        unsafe {
            *self.cell.get() = SlotCell::Finished(completion);
        }
        self.state.store(DONE, Ordering::Release);
    }

    /// Takes a published result and empties the slot. Scheduler side.
    pub fn take_completed(&self) -> Option<Completion> {
        if self.state.load(Ordering::Acquire) != DONE {
            return None;
        }
        // SAFETY: DONE means the scheduler owns the cell; the Acquire load above
        // synchronizes with the unit's Release store in `complete`.
        let finished = unsafe { std::mem::take(&mut *self.cell.get()) };
        self.state.store(EMPTY, Ordering::Release);
        match finished {
            SlotCell::Finished(completion) => Some(completion),
            _ => None,
        }
    }
}

impl Default for ExecutionSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExecutionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionSlot")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// All execution slots, one per unit.
#[derive(Debug)]
pub struct ControlStore {
    slots: Vec<ExecutionSlot>,
}

impl ControlStore {
    /// Creates `units` empty slots.
    pub fn new(units: usize) -> Self {
        Self {
            slots: (0..units).map(|_| ExecutionSlot::new()).collect(),
        }
    }

    /// Every slot, indexed by unit.
    pub fn slots(&self) -> &[ExecutionSlot] {
        &self.slots
    }

    /// Assigns `dispatch` to the first empty slot at or after `cursor`, wrapping around.
    ///
    /// The cursor moves past the chosen slot so consecutive dispatches spread over units.
    ///
    /// # Returns
    ///
    /// The unit index, or the dispatch back if every slot is occupied.
    pub fn try_assign(&self, dispatch: Dispatch, cursor: &mut usize) -> Result<usize, Dispatch> {
        let count = self.slots.len();
        let mut pending = dispatch;
        for step in 0..count {
            let index = (*cursor + step) % count;
            match self.slots[index].try_assign(pending) {
                Ok(()) => {
                    *cursor = (index + 1) % count;
                    return Ok(index);
                }
                Err(back) => pending = back,
            }
        }
        Err(pending)
    }

    /// True if at least one slot is empty.
    pub fn has_free_slot(&self) -> bool {
        self.slots.iter().any(|slot| slot.state() == SlotState::Empty)
    }

    /// Drains every finished slot.
    pub fn collect(&self) -> Vec<Completion> {
        self.slots
            .iter()
            .filter_map(ExecutionSlot::take_completed)
            .collect()
    }

    /// Number of slots owned by units (running or finished).
    pub fn in_flight(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.state() != SlotState::Empty)
            .count()
    }
}
