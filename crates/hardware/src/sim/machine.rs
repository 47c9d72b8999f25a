//! Machine top level.
//!
//! The `Machine` owns every piece of state for one run:
//! 1. **Storage:** The register file and the flat memory, shared with the units.
//! 2. **Control Store:** One execution slot per unit.
//! 3. **Driver:** The fetch-decode driver with its ILP and duplication controllers.
//!
//! `run` spawns the execution units as scoped threads, drives the scheduler until COMMIT
//! retires or a fatal error occurs, then clears the alive flag and joins every unit.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tracing::{error, info};

use crate::common::error::{SimError, SimResult};
use crate::common::reg::{RegId, RegisterFile};
use crate::config::{Config, PollStrategy};
use crate::core::control_store::ControlStore;
use crate::core::executor::ExecutionUnit;
use crate::core::fault::{FaultModel, fault_model_for};
use crate::core::fetch_decode::{FetchDecode, TickOutcome};
use crate::core::ilp::IlpController;
use crate::isa::codelet::CodeletRegistry;
use crate::sim::program::Program;
use crate::soc::Memory;
use crate::stats::SimStats;

/// Builds the fault model of execution unit `n`.
pub type FaultModelFactory = Box<dyn Fn(usize) -> Box<dyn FaultModel> + Send + Sync>;

/// One configured machine with a loaded program.
pub struct Machine {
    config: Config,
    registers: RegisterFile,
    memory: Memory,
    store: ControlStore,
    driver: FetchDecode,
    faults: FaultModelFactory,
    halted: bool,
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("driver", &self.driver)
            .field("halted", &self.halted)
            .finish_non_exhaustive()
    }
}

impl Machine {
    /// Creates a machine with the built-in codelets.
    ///
    /// # Examples
    ///
    /// ```
    /// use scmsim_core::common::{RegId, SizeClass};
    /// use scmsim_core::sim::{Machine, Program};
    /// use scmsim_core::Config;
    ///
    /// let (a, b) = (RegId::arch(SizeClass::B64, 0), RegId::arch(SizeClass::B64, 1));
    /// let program = Program::builder().ldimm(a, 40).add(b, a, 2u64).commit().build();
    /// let mut machine = Machine::new(Config::default(), program).unwrap();
    /// machine.run().unwrap();
    /// assert_eq!(machine.read_u64(b).unwrap(), 42);
    /// ```
    pub fn new(config: Config, program: Program) -> SimResult<Self> {
        Self::with_registry(config, program, Arc::new(CodeletRegistry::with_builtins()))
    }

    /// Creates a machine that resolves codelets through `registry`.
    ///
    /// # Returns
    ///
    /// A configuration error if `config` is inconsistent, or `InvalidRegister` if the
    /// program names a register the configured file does not have.
    pub fn with_registry(
        config: Config,
        program: Program,
        registry: Arc<CodeletRegistry>,
    ) -> SimResult<Self> {
        config.validate()?;
        let registers = RegisterFile::new(&config.registers);
        if let Some(id) = program.registers().find(|id| !registers.contains(*id)) {
            return Err(SimError::InvalidRegister(id));
        }
        let resiliency = config.resiliency;
        Ok(Self {
            memory: Memory::new(config.memory.size),
            store: ControlStore::new(config.general.execution_units),
            driver: FetchDecode::new(&config, program, registry),
            faults: Box::new(move |unit| fault_model_for(&resiliency, unit)),
            registers,
            config,
            halted: false,
        })
    }

    /// Replaces the fault models the units are built with.
    pub fn set_fault_model_factory(&mut self, factory: FaultModelFactory) {
        self.faults = factory;
    }

    /// Runs the program to COMMIT.
    ///
    /// A machine runs once. Fatal errors halt it as well; every later call returns
    /// `Halted`.
    pub fn run(&mut self) -> SimResult<()> {
        if self.halted {
            return Err(SimError::Halted);
        }
        self.halted = true;

        let units: Vec<ExecutionUnit> = (0..self.config.general.execution_units)
            .map(|index| {
                ExecutionUnit::new(index, (self.faults)(index), self.config.resiliency.comparison)
            })
            .collect();
        let Self {
            config,
            registers,
            memory,
            store,
            driver,
            ..
        } = self;
        let (registers, memory, store) = (&*registers, &*memory, &*store);
        let poll = config.execution.poll;
        let max_ticks = config.general.max_ticks;
        let alive = AtomicBool::new(true);
        info!(
            units = units.len(),
            ilp = ?config.general.ilp_mode,
            duplication = ?config.resiliency.duplication,
            "run started"
        );

        let result = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(units.len());
            for (mut unit, slot) in units.into_iter().zip(store.slots()) {
                let alive = &alive;
                let spawned = thread::Builder::new()
                    .name(format!("cu-{}", unit.index()))
                    .spawn_scoped(scope, move || unit.run(slot, alive, registers, memory, poll));
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(err) => {
                        alive.store(false, Ordering::Release);
                        return Err(SimError::Io(err));
                    }
                }
            }

            let outcome = drive(driver, store, registers, poll, max_ticks);
            alive.store(false, Ordering::Release);
            let mut panicked = false;
            for handle in handles {
                panicked |= handle.join().is_err();
            }
            if panicked {
                return Err(SimError::Internal("an execution unit panicked".into()));
            }
            outcome
        });

        let stats = driver.stats();
        match &result {
            Ok(()) => info!(ticks = stats.ticks, retired = stats.retired, "run finished"),
            Err(err) => error!(ticks = stats.ticks, error = %err, "run halted"),
        }
        result
    }

    /// True once `run` returned.
    pub const fn is_halted(&self) -> bool {
        self.halted
    }

    /// Active configuration.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The register file.
    pub const fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    /// The flat memory.
    pub const fn memory(&self) -> &Memory {
        &self.memory
    }

    /// The fetch-decode driver.
    pub const fn driver(&self) -> &FetchDecode {
        &self.driver
    }

    /// Counters of the run so far.
    pub const fn stats(&self) -> &SimStats {
        self.driver.stats()
    }

    /// Bytes of the newest value of `id`, following active renames.
    pub fn read_register(&self, id: RegId) -> SimResult<Vec<u8>> {
        self.registers.read(self.driver.ilp().resolve(id))
    }

    /// The newest value of `id` as a u64.
    pub fn read_u64(&self, id: RegId) -> SimResult<u64> {
        self.registers.read_u64(self.driver.ilp().resolve(id))
    }

    /// Seeds a register before the run.
    pub fn write_register(&self, id: RegId, data: &[u8]) -> SimResult<()> {
        self.registers.write(id, data)
    }

    /// Seeds a register with a u64 before the run.
    pub fn write_u64(&self, id: RegId, value: u64) -> SimResult<()> {
        self.registers.write_u64(id, value)
    }

    /// Reads `len` bytes of memory.
    pub fn read_memory(&self, addr: u64, len: usize) -> SimResult<Vec<u8>> {
        self.memory.read(addr, len)
    }

    /// Writes bytes into memory.
    pub fn write_memory(&self, addr: u64, data: &[u8]) -> SimResult<()> {
        self.memory.write(addr, data)
    }
}

fn drive(
    driver: &mut FetchDecode,
    store: &ControlStore,
    registers: &RegisterFile,
    poll: PollStrategy,
    max_ticks: Option<u64>,
) -> SimResult<()> {
    let mut spins = 0;
    loop {
        if let Some(limit) = max_ticks.filter(|limit| driver.stats().ticks >= *limit) {
            return Err(SimError::TickLimit(limit));
        }
        match driver.tick(store, registers)? {
            TickOutcome::Committed => return Ok(()),
            TickOutcome::Busy => spins = 0,
            TickOutcome::Idle => poll.idle(&mut spins),
        }
    }
}
