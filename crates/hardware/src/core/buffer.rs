//! Instruction Buffer (window).
//!
//! The buffer holds every fetched instruction from decode until it is decommissioned.
//! It provides:
//! 1. **Allocation:** Assigns monotonically increasing tags, so tag order is program order.
//! 2. **Lifecycle:** One `InstState` per entry, driven by the scheduler and the slots.
//! 3. **Duplication Groups:** Clones of an original codelet, tracked alongside it.
//! 4. **Clean Out:** Removal of decommissioned entries, the only way an entry leaves.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use crate::common::error::{SimError, SimResult};
use crate::isa::instruction::DecodedInstruction;

/// Unique tag of a buffered instruction; ordering follows program order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct InstTag(pub u64);

impl fmt::Display for InstTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a buffered instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum InstState {
    /// Fetched, or analyzed and waiting on operands.
    #[default]
    Waiting,
    /// Cleared to run.
    Ready,
    /// Blocked; re-evaluated every scheduling pass.
    Stall,
    /// Running on an execution unit.
    Executing,
    /// A clone running on an execution unit.
    ExecutingDuplicate,
    /// Finished; waiting for retirement (and the vote, if duplicated).
    ExecutionDone,
    /// A clone finished.
    ExecutionDoneDuplicate,
    /// Retired; removed at the next clean out.
    Decommission,
}

/// One buffered instruction and its lifecycle state.
#[derive(Clone, Debug)]
pub struct BufferEntry {
    /// The instruction, mutated in place by the scheduler.
    pub inst: DecodedInstruction,
    /// Current lifecycle state.
    pub state: InstState,
    /// Program counter of the line (clones carry their original's).
    pub pc: usize,
    /// Original of a duplication clone.
    pub origin: Option<InstTag>,
}

/// Ordered window of in-flight instructions.
#[derive(Debug)]
pub struct InstructionBuffer {
    capacity: usize,
    order: VecDeque<InstTag>,
    entries: HashMap<InstTag, BufferEntry>,
    groups: HashMap<InstTag, Vec<InstTag>>,
    next_tag: u64,
}

impl InstructionBuffer {
    /// Creates an empty buffer holding at most `capacity` program instructions.
    ///
    /// Clones do not count against the capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            entries: HashMap::with_capacity(capacity),
            groups: HashMap::new(),
            next_tag: 0,
        }
    }

    fn allocate(&mut self) -> InstTag {
        let tag = InstTag(self.next_tag);
        self.next_tag += 1;
        tag
    }

    /// True when no further program instruction fits.
    pub fn is_full(&self) -> bool {
        self.order.len() >= self.capacity
    }

    /// Number of program instructions in the window.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when the window holds no program instruction.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Appends a freshly decoded instruction as `Waiting`.
    ///
    /// # Returns
    ///
    /// The new tag, or `None` if the buffer is full.
    pub fn push(&mut self, inst: DecodedInstruction, pc: usize) -> Option<InstTag> {
        if self.is_full() {
            return None;
        }
        let tag = self.allocate();
        self.order.push_back(tag);
        let _ = self.entries.insert(
            tag,
            BufferEntry {
                inst,
                state: InstState::Waiting,
                pc,
                origin: None,
            },
        );
        Some(tag)
    }

    /// Entry behind `tag`.
    pub fn get(&self, tag: InstTag) -> Option<&BufferEntry> {
        self.entries.get(&tag)
    }

    /// Mutable entry behind `tag`.
    pub fn get_mut(&mut self, tag: InstTag) -> Option<&mut BufferEntry> {
        self.entries.get_mut(&tag)
    }

    /// Entry behind `tag`; a missing tag is broken scheduler bookkeeping.
    pub fn entry(&self, tag: InstTag) -> SimResult<&BufferEntry> {
        self.entries.get(&tag).ok_or_else(|| missing(tag))
    }

    /// Mutable entry behind `tag`; a missing tag is broken scheduler bookkeeping.
    pub fn entry_mut(&mut self, tag: InstTag) -> SimResult<&mut BufferEntry> {
        self.entries.get_mut(&tag).ok_or_else(|| missing(tag))
    }

    /// Lifecycle state of `tag`.
    pub fn state(&self, tag: InstTag) -> Option<InstState> {
        self.entries.get(&tag).map(|entry| entry.state)
    }

    /// Moves `tag` to `state`; unknown tags are ignored.
    pub fn set_state(&mut self, tag: InstTag, state: InstState) {
        if let Some(entry) = self.entries.get_mut(&tag) {
            entry.state = state;
        }
    }

    /// Program instructions in program order.
    pub fn tags(&self) -> Vec<InstTag> {
        self.order.iter().copied().collect()
    }

    /// Oldest program instruction.
    pub fn head(&self) -> Option<InstTag> {
        self.order.front().copied()
    }

    /// Youngest program instruction.
    pub fn tail(&self) -> Option<InstTag> {
        self.order.back().copied()
    }

    /// Number of entries (clones included) in `state`.
    pub fn count_in_state(&self, state: InstState) -> usize {
        self.entries.values().filter(|entry| entry.state == state).count()
    }

    /// Removes decommissioned program instructions that have no live clones.
    ///
    /// # Returns
    ///
    /// The number of entries removed.
    pub fn clean_out(&mut self) -> usize {
        let before = self.order.len();
        let entries = &mut self.entries;
        let groups = &self.groups;
        self.order.retain(|tag| {
            let done = entries
                .get(tag)
                .is_none_or(|entry| entry.state == InstState::Decommission);
            if done && !groups.contains_key(tag) {
                let _ = entries.remove(tag);
                false
            } else {
                true
            }
        });
        before - self.order.len()
    }

    /// Opens an (empty) duplication group for `original`.
    pub fn open_group(&mut self, original: InstTag) {
        let _ = self.groups.entry(original).or_default();
    }

    /// True if `original` has a duplication group.
    pub fn has_group(&self, original: InstTag) -> bool {
        self.groups.contains_key(&original)
    }

    /// Adds a clone of `original` in `state` and returns its tag.
    pub fn insert_duplicate(
        &mut self,
        original: InstTag,
        inst: DecodedInstruction,
        state: InstState,
    ) -> InstTag {
        let tag = self.allocate();
        let pc = self.entries.get(&original).map_or(0, |entry| entry.pc);
        let _ = self.entries.insert(
            tag,
            BufferEntry {
                inst,
                state,
                pc,
                origin: Some(original),
            },
        );
        self.groups.entry(original).or_default().push(tag);
        tag
    }

    /// Clones of `original`, oldest first.
    pub fn duplicates(&self, original: InstTag) -> &[InstTag] {
        self.groups.get(&original).map_or(&[], Vec::as_slice)
    }

    /// Originals with an open duplication group, oldest first.
    pub fn group_originals(&self) -> Vec<InstTag> {
        let mut originals: Vec<InstTag> = self.groups.keys().copied().collect();
        originals.sort_unstable();
        originals
    }

    /// True once the original and every clone have finished executing.
    pub fn group_complete(&self, original: InstTag) -> bool {
        self.state(original) == Some(InstState::ExecutionDone)
            && self
                .duplicates(original)
                .iter()
                .all(|tag| self.state(*tag) == Some(InstState::ExecutionDoneDuplicate))
    }

    /// Decommissions and removes every clone of `original`, closing the group.
    ///
    /// # Returns
    ///
    /// The removed clone entries.
    pub fn remove_duplicates(&mut self, original: InstTag) -> Vec<BufferEntry> {
        let Some(tags) = self.groups.remove(&original) else {
            return Vec::new();
        };
        tags.into_iter()
            .filter_map(|tag| {
                self.set_state(tag, InstState::Decommission);
                self.entries.remove(&tag)
            })
            .collect()
    }

    /// True once every program instruction and clone has been removed.
    pub fn all_retired(&self) -> bool {
        self.entries.is_empty()
    }
}

fn missing(tag: InstTag) -> SimError {
    SimError::Internal(format!("instruction {tag} is not in the buffer"))
}
