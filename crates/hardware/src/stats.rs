//! Simulation statistics collection and reporting.
//!
//! This module tracks what the scheduler did during a run. It provides:
//! 1. **Throughput:** Scheduler ticks, fetched, dispatched, and retired instructions.
//! 2. **Hazards:** Stall events, structural hazards, renames, and broadcast copies.
//! 3. **Resiliency:** Clones spawned, votes, overrides, and injected faults.
//! 4. **Parallelism:** The largest number of execution slots in use at once.

use std::fmt::Write as _;
use std::time::Instant;

use serde::Serialize;

/// Counters for one run.
#[derive(Clone, Debug, Serialize)]
pub struct SimStats {
    #[serde(skip)]
    start_time: Instant,
    /// Scheduler ticks executed.
    pub ticks: u64,
    /// Instructions pushed into the buffer (labels excluded).
    pub fetched: u64,
    /// Instructions and clones handed to execution units.
    pub dispatched: u64,
    /// Instructions decommissioned, COMMIT included.
    pub retired: u64,
    /// Branches and jumps resolved by the driver.
    pub control_resolved: u64,
    /// Scheduling attempts that left an instruction waiting.
    pub stalls: u64,
    /// Stalls caused by an exhausted rename pool.
    pub structural_hazards: u64,
    /// Write operands given a fresh hidden identity.
    pub renames: u64,
    /// Register copies made on behalf of renamed read-write operands.
    pub broadcasts: u64,
    /// Duplication clones created.
    pub duplicates_spawned: u64,
    /// Consensus rounds on complete duplication groups.
    pub votes: u64,
    /// Votes in which the original was outvoted and overwritten.
    pub overrides: u64,
    /// Executions reported as faulty by the fault model.
    pub faults_injected: u64,
    /// Largest number of occupied execution slots seen at once.
    pub max_in_flight: u64,
}

impl Default for SimStats {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            ticks: 0,
            fetched: 0,
            dispatched: 0,
            retired: 0,
            control_resolved: 0,
            stalls: 0,
            structural_hazards: 0,
            renames: 0,
            broadcasts: 0,
            duplicates_spawned: 0,
            votes: 0,
            overrides: 0,
            faults_injected: 0,
            max_in_flight: 0,
        }
    }
}

impl SimStats {
    /// Retired instructions per scheduler tick.
    pub fn retired_per_tick(&self) -> f64 {
        let ticks = if self.ticks == 0 { 1 } else { self.ticks };
        self.retired as f64 / ticks as f64
    }

    /// Renders the counters as a text report.
    pub fn summary(&self) -> String {
        let seconds = self.start_time.elapsed().as_secs_f64();
        let mut out = String::new();
        let _ = writeln!(out, "==========================================================");
        let _ = writeln!(out, "SCM MACHINE SIMULATION STATISTICS");
        let _ = writeln!(out, "==========================================================");
        let _ = writeln!(out, "host_seconds             {seconds:.4} s");
        let _ = writeln!(out, "sim_ticks                {}", self.ticks);
        let _ = writeln!(out, "sim_insts                {}", self.retired);
        let _ = writeln!(out, "sim_ipt                  {:.4}", self.retired_per_tick());
        let _ = writeln!(out, "----------------------------------------------------------");
        let _ = writeln!(out, "SCHEDULER");
        let _ = writeln!(out, "  fetched                {}", self.fetched);
        let _ = writeln!(out, "  dispatched             {}", self.dispatched);
        let _ = writeln!(out, "  control.resolved       {}", self.control_resolved);
        let _ = writeln!(out, "  stalls                 {}", self.stalls);
        let _ = writeln!(out, "  stalls.structural      {}", self.structural_hazards);
        let _ = writeln!(out, "  renames                {}", self.renames);
        let _ = writeln!(out, "  broadcasts             {}", self.broadcasts);
        let _ = writeln!(out, "  max_in_flight          {}", self.max_in_flight);
        let _ = writeln!(out, "----------------------------------------------------------");
        let _ = writeln!(out, "RESILIENCY");
        let _ = writeln!(out, "  duplicates.spawned     {}", self.duplicates_spawned);
        let _ = writeln!(out, "  votes                  {}", self.votes);
        let _ = writeln!(out, "  votes.overridden       {}", self.overrides);
        let _ = writeln!(out, "  faults.injected        {}", self.faults_injected);
        let _ = writeln!(out, "==========================================================");
        out
    }
}
