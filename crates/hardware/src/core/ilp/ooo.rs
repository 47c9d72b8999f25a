//! Out-of-Order policy (Tomasulo-style scoreboard with register renaming).
//!
//! Scheduler state:
//! 1. **`used`:** Current direction of every identity held by an in-flight instruction.
//! 2. **Subscribers:** Operands that read an identity; woken when its pending write lands.
//! 3. **Broadcasters:** Read-write operands that need a copy of an identity once its
//!    pending write lands. A broadcaster whose operand *is* the released identity is a
//!    continuation: the next writer of the same storage, woken without a copy.
//! 4. **Renaming:** Architectural identity to its newest hidden copy.
//! 5. **Reservation Table:** Instructions whose operands were analyzed, with per-operand
//!    progress so an analysis cut short by a structural hazard resumes where it stopped.
//!
//! Memory instructions reserve their ranges in program order once their address
//! operands are ready.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, error, trace, warn};

use crate::common::constants::MAX_NUM_OPERANDS;
use crate::common::error::SimResult;
use crate::common::range::MemoryRange;
use crate::common::reg::{RegId, RegPool, RegisterFile, SizeClass};
use crate::core::buffer::{InstState, InstTag, InstructionBuffer};
use crate::core::ilp::hazards::MemoryHazardTracker;
use crate::core::ilp::{IlpController, IlpCounters};
use crate::isa::instruction::RegDir;
use crate::isa::opcodes::InstKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum UseKind {
    Read,
    Write,
}

/// One operand of one buffered instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct OperandRef {
    inst: InstTag,
    operand: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Analysis {
    Complete,
    Structural,
}

type Progress = [bool; MAX_NUM_OPERANDS];

/// Scoreboard, renaming tables, and memory reservations.
#[derive(Debug, Default)]
pub struct OutOfOrder {
    used: HashMap<RegId, UseKind>,
    subscribers: HashMap<RegId, Vec<OperandRef>>,
    broadcasters: HashMap<RegId, Vec<OperandRef>>,
    renaming: HashMap<RegId, RegId>,
    renamed_in_use: HashSet<RegId>,
    reservation: HashMap<InstTag, Progress>,
    structural: Option<InstTag>,
    cursors: HashMap<SizeClass, usize>,
    tracker: MemoryHazardTracker,
    reserved: HashMap<InstTag, Vec<MemoryRange>>,
    pending_memory: BTreeSet<InstTag>,
    counters: IlpCounters,
}

impl OutOfOrder {
    /// Creates an empty scoreboard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of identities held by in-flight instructions.
    pub fn used_registers(&self) -> usize {
        self.used.len()
    }

    /// Active renames, architectural identity first.
    pub fn renames(&self) -> Vec<(RegId, RegId)> {
        let mut pairs: Vec<(RegId, RegId)> = self.renaming.iter().map(|(k, v)| (*k, *v)).collect();
        pairs.sort_unstable();
        pairs
    }

    /// Instruction blocked on an exhausted rename pool, if any.
    pub const fn structural_hazard(&self) -> Option<InstTag> {
        self.structural
    }

    fn allocate_rename(&mut self, id: RegId, regs: &RegisterFile) -> Option<RegId> {
        let class = id.class();
        let size = regs.pool_size(RegPool::Rename, class);
        let cursor = self.cursors.entry(class).or_insert(0);
        for _ in 0..size {
            let candidate = regs.next_free(RegPool::Rename, class, cursor)?;
            if !self.used.contains_key(&candidate) && !self.renamed_in_use.contains(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    fn set_rename(&mut self, original: RegId, fresh: RegId) {
        if let Some(stale) = self.renaming.insert(original, fresh) {
            let _ = self.renamed_in_use.remove(&stale);
        }
        let _ = self.renamed_in_use.insert(fresh);
        self.counters.renames += 1;
        debug!(register = %original, renamed = %fresh, "rename");
    }

    fn drop_rename(&mut self, original: RegId) {
        if let Some(stale) = self.renaming.remove(&original) {
            let _ = self.renamed_in_use.remove(&stale);
        }
    }

    fn subscribe(&mut self, id: RegId, waiter: OperandRef) {
        self.subscribers.entry(id).or_default().push(waiter);
    }

    fn analyze(
        &mut self,
        tag: InstTag,
        buffer: &mut InstructionBuffer,
        regs: &RegisterFile,
    ) -> SimResult<Analysis> {
        for index in 0..MAX_NUM_OPERANDS {
            let progress = self.reservation.get(&tag).copied().unwrap_or_default();
            if progress[index] {
                continue;
            }
            let inst = &buffer.entry(tag)?.inst;
            let Some(id) = inst.register(index) else {
                self.mark_processed(tag, &[index]);
                continue;
            };
            // Operands naming the same storage are resolved together.
            let aliases: Vec<usize> = (index..MAX_NUM_OPERANDS)
                .filter(|&i| !progress[i] && inst.register(i) == Some(id))
                .collect();
            let dir = inst.direction_of(id).unwrap_or(RegDir::Read);
            let outcome = match dir {
                RegDir::Read => {
                    self.analyze_read(tag, id, &aliases, buffer)?;
                    Analysis::Complete
                }
                RegDir::Write => self.analyze_write(tag, id, &aliases, buffer, regs)?,
                RegDir::ReadWrite => self.analyze_read_write(tag, id, &aliases, buffer, regs)?,
            };
            if outcome == Analysis::Structural {
                return Ok(Analysis::Structural);
            }
            self.mark_processed(tag, &aliases);
        }
        Ok(Analysis::Complete)
    }

    fn mark_processed(&mut self, tag: InstTag, indices: &[usize]) {
        let progress = self.reservation.entry(tag).or_default();
        for &index in indices {
            progress[index] = true;
        }
    }

    fn analyze_read(
        &mut self,
        tag: InstTag,
        id: RegId,
        aliases: &[usize],
        buffer: &mut InstructionBuffer,
    ) -> SimResult<()> {
        let source = self.renaming.get(&id).copied().unwrap_or(id);
        let pending_write = self.used.get(&source) == Some(&UseKind::Write);
        let inst = &mut buffer.entry_mut(tag)?.inst;
        for &index in aliases {
            inst.set_register(index, source);
            if !pending_write {
                inst.mark_ready(index);
            }
            self.subscribe(source, OperandRef { inst: tag, operand: index });
        }
        if !pending_write {
            let _ = self.used.entry(source).or_insert(UseKind::Read);
        }
        Ok(())
    }

    fn analyze_write(
        &mut self,
        tag: InstTag,
        id: RegId,
        aliases: &[usize],
        buffer: &mut InstructionBuffer,
        regs: &RegisterFile,
    ) -> SimResult<Analysis> {
        let target = if self.used.contains_key(&id) {
            let Some(fresh) = self.allocate_rename(id, regs) else {
                return Ok(Analysis::Structural);
            };
            self.set_rename(id, fresh);
            fresh
        } else {
            self.drop_rename(id);
            id
        };
        let inst = &mut buffer.entry_mut(tag)?.inst;
        for &index in aliases {
            inst.set_register(index, target);
            inst.mark_ready(index);
        }
        let _ = self.used.insert(target, UseKind::Write);
        Ok(Analysis::Complete)
    }

    fn analyze_read_write(
        &mut self,
        tag: InstTag,
        id: RegId,
        aliases: &[usize],
        buffer: &mut InstructionBuffer,
        regs: &RegisterFile,
    ) -> SimResult<Analysis> {
        let source = self.renaming.get(&id).copied().unwrap_or(id);
        let source_use = self.used.get(&source).copied();
        let has_subscribers = self
            .subscribers
            .get(&source)
            .is_some_and(|list| !list.is_empty());
        let needs_fresh = match source_use {
            Some(UseKind::Read) => true,
            Some(UseKind::Write) => has_subscribers,
            None => false,
        };

        if needs_fresh {
            let Some(fresh) = self.allocate_rename(id, regs) else {
                return Ok(Analysis::Structural);
            };
            self.set_rename(id, fresh);
            let available = source_use != Some(UseKind::Write);
            if available {
                regs.copy(source, fresh)?;
                self.counters.broadcasts += 1;
            }
            let inst = &mut buffer.entry_mut(tag)?.inst;
            for &index in aliases {
                inst.set_register(index, fresh);
                if available {
                    inst.mark_ready(index);
                }
            }
            if !available {
                let waiting = self.broadcasters.entry(source).or_default();
                waiting.extend(aliases.iter().map(|&operand| OperandRef { inst: tag, operand }));
            }
            let _ = self.used.insert(fresh, UseKind::Write);
        } else {
            let inst = &mut buffer.entry_mut(tag)?.inst;
            for &index in aliases {
                inst.set_register(index, source);
                if source_use.is_none() {
                    inst.mark_ready(index);
                }
            }
            if source_use == Some(UseKind::Write) {
                // Continuation: same storage, woken when the previous writer finishes.
                let waiting = self.broadcasters.entry(source).or_default();
                waiting.extend(aliases.iter().map(|&operand| OperandRef { inst: tag, operand }));
            }
            let _ = self.used.insert(source, UseKind::Write);
        }
        Ok(Analysis::Complete)
    }

    /// True while a memory instruction must not become `Ready`.
    ///
    /// Reserves the instruction's ranges as a side effect once it may proceed.
    fn stall_memory(
        &mut self,
        tag: InstTag,
        buffer: &mut InstructionBuffer,
        regs: &RegisterFile,
    ) -> SimResult<bool> {
        if self.reserved.contains_key(&tag) {
            return Ok(false);
        }
        let inst = &mut buffer.entry_mut(tag)?.inst;
        if !inst.touches_memory() {
            return Ok(false);
        }
        let address_pending = (0..MAX_NUM_OPERANDS)
            .any(|index| inst.is_address_operand(index) && !inst.operand(index).is_ready());
        if address_pending || self.pending_memory.first() != Some(&tag) {
            return Ok(true);
        }
        let ranges = inst.memory_ranges(regs)?.to_vec();
        if self.tracker.overlaps_any(&ranges) {
            trace!(inst = %tag, "memory hazard");
            return Ok(true);
        }
        for range in &ranges {
            self.tracker.add_range(*range);
        }
        let _ = self.reserved.insert(tag, ranges);
        let _ = self.pending_memory.remove(&tag);
        Ok(false)
    }

    /// Final readiness decision for an analyzed instruction.
    fn settle(
        &mut self,
        tag: InstTag,
        buffer: &mut InstructionBuffer,
        regs: &RegisterFile,
    ) -> SimResult<bool> {
        if self.stall_memory(tag, buffer, regs)? {
            buffer.set_state(tag, InstState::Stall);
            return Ok(false);
        }
        let entry = buffer.entry_mut(tag)?;
        if entry.inst.all_operands_ready() {
            entry.state = InstState::Ready;
            return Ok(true);
        }
        entry.state = if entry.inst.kind() == InstKind::Control {
            InstState::Stall
        } else {
            InstState::Waiting
        };
        Ok(false)
    }

    fn promote_if_ready(
        &mut self,
        tag: InstTag,
        buffer: &mut InstructionBuffer,
        regs: &RegisterFile,
    ) -> SimResult<()> {
        let Some(entry) = buffer.get(tag) else {
            return Ok(());
        };
        let waiting = matches!(entry.state, InstState::Waiting | InstState::Stall);
        if !waiting
            || self.structural == Some(tag)
            || !self.reservation.contains_key(&tag)
            || !entry.inst.all_operands_ready()
        {
            return Ok(());
        }
        if !self.stall_memory(tag, buffer, regs)? {
            trace!(inst = %tag, "woken");
            buffer.set_state(tag, InstState::Ready);
        }
        Ok(())
    }

    fn mark_operand_ready(buffer: &mut InstructionBuffer, waiter: OperandRef) {
        match buffer.get_mut(waiter.inst) {
            Some(entry) => entry.inst.mark_ready(waiter.operand),
            None => warn!(inst = %waiter.inst, "woken operand belongs to a retired instruction"),
        }
    }

    fn release_read(&mut self, tag: InstTag, id: RegId) {
        let drained = match self.subscribers.get_mut(&id) {
            Some(list) => {
                list.retain(|waiter| waiter.inst != tag);
                list.is_empty()
            }
            None => true,
        };
        if drained {
            let _ = self.subscribers.remove(&id);
        }
        match self.used.get(&id) {
            Some(UseKind::Read) => {
                if drained {
                    let _ = self.used.remove(&id);
                }
            }
            state => error!(inst = %tag, register = %id, ?state, "reader released a register not held for reading"),
        }
    }

    fn release_write(
        &mut self,
        tag: InstTag,
        id: RegId,
        buffer: &mut InstructionBuffer,
        regs: &RegisterFile,
    ) -> SimResult<()> {
        if self.used.get(&id) != Some(&UseKind::Write) {
            error!(inst = %tag, register = %id, "writer released a register not held for writing");
        }

        let mut queue = self.broadcasters.remove(&id).unwrap_or_default();
        let mut woken: Vec<InstTag> = Vec::new();
        let mut released = 0;
        let mut continued = false;
        while let Some(&waiter) = queue.get(released) {
            let target = buffer.get(waiter.inst).and_then(|e| e.inst.register(waiter.operand));
            if target == Some(id) {
                // The next writer of this storage takes over; later waiters are its own.
                while let Some(&next) = queue.get(released).filter(|next| next.inst == waiter.inst) {
                    Self::mark_operand_ready(buffer, next);
                    released += 1;
                }
                woken.push(waiter.inst);
                continued = true;
                break;
            }
            if let Some(target) = target {
                regs.copy(id, target)?;
                self.counters.broadcasts += 1;
            }
            Self::mark_operand_ready(buffer, waiter);
            woken.push(waiter.inst);
            released += 1;
        }
        let pending = queue.split_off(released);
        if !pending.is_empty() {
            let _ = self.broadcasters.insert(id, pending);
        }

        if !continued {
            let readers = self.subscribers.get(&id).cloned().unwrap_or_default();
            for waiter in &readers {
                Self::mark_operand_ready(buffer, *waiter);
                woken.push(waiter.inst);
            }
            if readers.is_empty() {
                let _ = self.subscribers.remove(&id);
                let _ = self.used.remove(&id);
            } else {
                let _ = self.used.insert(id, UseKind::Read);
            }
        }

        woken.sort_unstable();
        woken.dedup();
        for waiter in woken {
            self.promote_if_ready(waiter, buffer, regs)?;
        }
        Ok(())
    }
}

impl IlpController for OutOfOrder {
    fn try_schedule(
        &mut self,
        tag: InstTag,
        buffer: &mut InstructionBuffer,
        regs: &RegisterFile,
    ) -> SimResult<bool> {
        let entry = buffer.entry(tag)?;
        let (kind, state, touches) = (entry.inst.kind(), entry.state, entry.inst.touches_memory());

        if kind == InstKind::Commit {
            let drained = self.used.is_empty() && self.tracker.is_empty();
            buffer.set_state(
                tag,
                if drained { InstState::Ready } else { InstState::Stall },
            );
            return Ok(drained);
        }
        if self.reservation.contains_key(&tag) && self.structural != Some(tag) {
            // Analyzed already; only a memory reservation can still be outstanding.
            if touches && state == InstState::Stall {
                return self.settle(tag, buffer, regs);
            }
            return Ok(false);
        }
        // A structural hazard blocks new analysis only.
        if self.structural.is_some_and(|blocked| blocked != tag) {
            return Ok(false);
        }

        let _ = self.reservation.entry(tag).or_default();
        if touches {
            let _ = self.pending_memory.insert(tag);
        }
        if self.analyze(tag, buffer, regs)? == Analysis::Structural {
            if self.structural != Some(tag) {
                self.counters.structural_hazards += 1;
                debug!(inst = %tag, "structural hazard: rename pool exhausted");
            }
            self.structural = Some(tag);
            buffer.set_state(tag, InstState::Stall);
            return Ok(false);
        }
        self.structural = None;
        self.settle(tag, buffer, regs)
    }

    fn on_finished(
        &mut self,
        tag: InstTag,
        buffer: &mut InstructionBuffer,
        regs: &RegisterFile,
    ) -> SimResult<()> {
        for range in self.reserved.remove(&tag).unwrap_or_default() {
            if !self.tracker.remove_range(&range) {
                error!(inst = %tag, %range, "released a memory range that was not claimed");
            }
        }
        let _ = self.pending_memory.remove(&tag);

        for (id, dir) in buffer.entry(tag)?.inst.register_dirs() {
            match dir {
                RegDir::Read => self.release_read(tag, id),
                RegDir::Write | RegDir::ReadWrite => self.release_write(tag, id, buffer, regs)?,
            }
        }
        let _ = self.reservation.remove(&tag);
        if self.structural == Some(tag) {
            self.structural = None;
        }
        Ok(())
    }

    fn in_order(&self) -> bool {
        false
    }

    fn is_quiescent(&self) -> bool {
        self.used.is_empty() && self.tracker.is_empty()
    }

    fn resolve(&self, id: RegId) -> RegId {
        self.renaming.get(&id).copied().unwrap_or(id)
    }

    fn drain(&mut self, regs: &RegisterFile) -> SimResult<()> {
        for (original, renamed) in self.renaming.drain() {
            regs.copy(renamed, original)?;
            trace!(register = %original, from = %renamed, "rename folded back");
        }
        self.renamed_in_use.clear();
        Ok(())
    }

    fn counters(&self) -> IlpCounters {
        self.counters
    }
}
