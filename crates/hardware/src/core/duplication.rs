//! Duplication and voting controller.
//!
//! Wraps the dispatch of non-memory codelets with N-modular redundancy:
//! 1. **Cloning:** Each clone writes to fresh Duplicate-pool registers; read-only
//!    registers are shared with the original. Read-write registers are snapshotted when
//!    the group opens so every clone, even one spawned after the original ran, starts
//!    from the same state.
//! 2. **Voting:** Once the whole group finished, copies are partitioned into agreeing
//!    classes. A class with at least two members and more than half of all copies wins,
//!    and its values overwrite the original's if the original lost.
//! 3. **Growth:** In adaptive mode a failed vote spawns one more clone, up to the cap.
//! 4. **Cleanup:** Clones are removed and their registers returned to the pool.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::common::error::{SimError, SimResult};
use crate::common::reg::{RegId, RegPool, RegisterFile, SizeClass};
use crate::config::{ComparisonMode, DuplicationMode, ResiliencyConfig};
use crate::core::buffer::{InstState, InstTag, InstructionBuffer};
use crate::isa::instruction::{DecodedInstruction, RegDir};
use crate::isa::opcodes::InstKind;

/// Outcome of a consensus round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Vote {
    /// Some copy is still running, or a new clone was just spawned.
    Pending,
    /// A majority agreed.
    Accepted {
        /// The original disagreed with the majority and was overwritten.
        overridden: bool,
    },
}

/// Controller counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DuplicationCounters {
    /// Clones created.
    pub spawned: u64,
    /// Consensus rounds run on complete groups.
    pub votes: u64,
    /// Votes that overwrote the original.
    pub overrides: u64,
}

/// Creates, votes on, and retires duplication groups.
#[derive(Debug)]
pub struct DuplicationController {
    mode: DuplicationMode,
    comparison: ComparisonMode,
    max_copies: usize,
    in_use: HashSet<RegId>,
    cursors: HashMap<SizeClass, usize>,
    group_regs: HashMap<InstTag, Vec<RegId>>,
    snapshots: HashMap<InstTag, Vec<(RegId, RegId)>>,
    counters: DuplicationCounters,
}

impl DuplicationController {
    /// Creates a controller for the configured mode.
    pub fn new(config: &ResiliencyConfig) -> Self {
        Self {
            mode: config.duplication,
            comparison: config.comparison,
            max_copies: config.max_copies,
            in_use: HashSet::new(),
            cursors: HashMap::new(),
            group_regs: HashMap::new(),
            snapshots: HashMap::new(),
            counters: DuplicationCounters::default(),
        }
    }

    /// Active mode.
    pub const fn mode(&self) -> DuplicationMode {
        self.mode
    }

    /// Counters so far.
    pub const fn counters(&self) -> DuplicationCounters {
        self.counters
    }

    /// Duplicate-pool registers currently held by groups.
    pub fn registers_in_use(&self) -> usize {
        self.in_use.len()
    }

    /// True if `inst` must run redundantly.
    pub fn applies(&self, inst: &DecodedInstruction) -> bool {
        self.mode != DuplicationMode::NoDuplication
            && inst.kind() == InstKind::Execute
            && !inst.touches_memory()
    }

    /// Allocates one register per class, all or nothing.
    fn reserve(&mut self, classes: &[SizeClass], regs: &RegisterFile) -> Option<Vec<RegId>> {
        let mut taken = Vec::with_capacity(classes.len());
        for &class in classes {
            let size = regs.pool_size(RegPool::Duplicate, class);
            let cursor = self.cursors.entry(class).or_insert(0);
            let found = (0..size)
                .filter_map(|_| regs.next_free(RegPool::Duplicate, class, cursor))
                .find(|candidate| !self.in_use.contains(candidate));
            if let Some(id) = found {
                let _ = self.in_use.insert(id);
                taken.push(id);
            } else {
                for id in &taken {
                    let _ = self.in_use.remove(id);
                }
                return None;
            }
        }
        Some(taken)
    }

    fn build_clone(
        inst: &DecodedInstruction,
        written: &[(RegId, RegDir)],
        targets: &[RegId],
        snapshot: &[(RegId, RegId)],
        regs: &RegisterFile,
    ) -> SimResult<DecodedInstruction> {
        let mut clone = inst.to_duplicate();
        for (&(id, dir), &target) in written.iter().zip(targets) {
            if dir == RegDir::ReadWrite {
                let shadow = snapshot
                    .iter()
                    .find_map(|(original, shadow)| (*original == id).then_some(*shadow))
                    .ok_or_else(|| SimError::Internal(format!("no snapshot of {id} for `{inst}`")))?;
                regs.copy(shadow, target)?;
            }
            let _ = clone.rename_all(id, target);
        }
        clone.mark_all_ready();
        Ok(clone)
    }

    fn written(inst: &DecodedInstruction) -> Vec<(RegId, RegDir)> {
        inst.register_dirs()
            .into_iter()
            .filter(|(_, dir)| dir.writes())
            .collect()
    }

    /// Opens the duplication group of a `Ready` original and spawns the initial clones.
    ///
    /// # Returns
    ///
    /// `false` if the Duplicate pool cannot hold the whole group yet; nothing was
    /// allocated and the original should be retried later.
    pub fn duplicate(
        &mut self,
        original: InstTag,
        buffer: &mut InstructionBuffer,
        regs: &RegisterFile,
    ) -> SimResult<bool> {
        if buffer.has_group(original) {
            return Ok(true);
        }
        let inst = buffer.entry(original)?.inst.clone();
        let written = Self::written(&inst);
        let read_written: Vec<RegId> = written
            .iter()
            .filter_map(|(id, dir)| (*dir == RegDir::ReadWrite).then_some(*id))
            .collect();
        let clones = self.mode.initial_clones();

        let mut classes: Vec<SizeClass> = read_written.iter().map(|id| id.class()).collect();
        for _ in 0..clones {
            classes.extend(written.iter().map(|(id, _)| id.class()));
        }
        let Some(fresh) = self.reserve(&classes, regs) else {
            debug!(inst = %original, "duplicate pool exhausted");
            return Ok(false);
        };

        let (shadows, targets) = fresh.split_at(read_written.len());
        let snapshot: Vec<(RegId, RegId)> = read_written.iter().copied().zip(shadows.iter().copied()).collect();
        for &(id, shadow) in &snapshot {
            regs.copy(id, shadow)?;
        }

        buffer.open_group(original);
        let width = written.len();
        for n in 0..clones {
            let clone = Self::build_clone(
                &inst,
                &written,
                &targets[n * width..(n + 1) * width],
                &snapshot,
                regs,
            )?;
            let _ = buffer.insert_duplicate(original, clone, InstState::Ready);
            self.counters.spawned += 1;
        }
        let _ = self.group_regs.insert(original, fresh);
        let _ = self.snapshots.insert(original, snapshot);
        debug!(inst = %original, clones, "duplication group opened");
        Ok(true)
    }

    fn spawn_one(
        &mut self,
        original: InstTag,
        buffer: &mut InstructionBuffer,
        regs: &RegisterFile,
    ) -> SimResult<bool> {
        let inst = buffer.entry(original)?.inst.clone();
        let written = Self::written(&inst);
        let classes: Vec<SizeClass> = written.iter().map(|(id, _)| id.class()).collect();
        let Some(targets) = self.reserve(&classes, regs) else {
            return Ok(false);
        };
        let snapshot = self.snapshots.get(&original).cloned().unwrap_or_default();
        let clone = Self::build_clone(&inst, &written, &targets, &snapshot, regs)?;
        let _ = buffer.insert_duplicate(original, clone, InstState::Ready);
        self.group_regs.entry(original).or_default().extend(targets);
        self.counters.spawned += 1;
        Ok(true)
    }

    fn agree(
        &self,
        a: &DecodedInstruction,
        b: &DecodedInstruction,
        written: &[usize],
        regs: &RegisterFile,
    ) -> SimResult<bool> {
        if self.comparison == ComparisonMode::FailedFlag || written.is_empty() {
            return Ok(!a.failed() && !b.failed());
        }
        for &index in written {
            let (Some(x), Some(y)) = (a.register(index), b.register(index)) else {
                return Ok(false);
            };
            if regs.read(x)? != regs.read(y)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Runs consensus for a finished original.
    ///
    /// # Returns
    ///
    /// `Pending` while copies are still running or a clone was just added, `Accepted`
    /// once a majority agreed, or `ResiliencyFailure` when no majority can be reached.
    pub fn vote(
        &mut self,
        original: InstTag,
        buffer: &mut InstructionBuffer,
        regs: &RegisterFile,
    ) -> SimResult<Vote> {
        let inst = &buffer.entry(original)?.inst;
        if !buffer.has_group(original) {
            if inst.failed() {
                return Err(SimError::ResiliencyFailure {
                    instruction: inst.to_string(),
                    copies: 1,
                });
            }
            return Ok(Vote::Accepted { overridden: false });
        }
        if !buffer.group_complete(original) {
            return Ok(Vote::Pending);
        }

        let mut members: Vec<&DecodedInstruction> = vec![inst];
        for tag in buffer.duplicates(original) {
            members.push(&buffer.entry(*tag)?.inst);
        }
        let written = inst.written_operands();
        let mut classes: Vec<Vec<usize>> = Vec::new();
        for (index, member) in members.iter().enumerate() {
            let mut placed = false;
            for class in &mut classes {
                if self.agree(members[class[0]], member, &written, regs)? {
                    class.push(index);
                    placed = true;
                    break;
                }
            }
            if !placed {
                classes.push(vec![index]);
            }
        }
        let total = members.len();
        let winner = classes
            .iter()
            .max_by_key(|class| class.len())
            .filter(|class| class.len() >= 2 && class.len() * 2 > total);
        self.counters.votes += 1;

        if let Some(class) = winner {
            let overridden = !class.contains(&0);
            if overridden {
                let source = members[class[0]];
                for &index in &written {
                    if let (Some(from), Some(to)) = (source.register(index), inst.register(index)) {
                        regs.copy(from, to)?;
                    }
                }
                self.counters.overrides += 1;
                warn!(inst = %original, agreeing = class.len(), total, "original outvoted");
            }
            debug!(inst = %original, agreeing = class.len(), total, "vote accepted");
            return Ok(Vote::Accepted { overridden });
        }

        let instruction = inst.to_string();
        if self.mode == DuplicationMode::Adaptive && total < self.max_copies {
            if self.spawn_one(original, buffer, regs)? {
                debug!(inst = %original, copies = total + 1, "no majority, adding a clone");
            }
            return Ok(Vote::Pending);
        }
        Err(SimError::ResiliencyFailure {
            instruction,
            copies: total,
        })
    }

    /// Removes every clone of `original` and returns its registers to the pool.
    pub fn cleanup(&mut self, original: InstTag, buffer: &mut InstructionBuffer) {
        let _ = buffer.remove_duplicates(original);
        for id in self.group_regs.remove(&original).unwrap_or_default() {
            let _ = self.in_use.remove(&id);
        }
        let _ = self.snapshots.remove(&original);
    }
}
