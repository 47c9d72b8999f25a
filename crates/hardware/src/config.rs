//! Configuration system for the SCM machine simulator.
//!
//! This module defines all configuration structures and enums used to parameterize
//! the simulator. It provides:
//! 1. **Defaults:** Baseline machine constants (window size, unit count, register counts).
//! 2. **Structures:** Hierarchical config for general, execution, registers, memory, and
//!    resiliency settings.
//! 3. **Enums:** ILP policy, duplication mode, comparison mode, fault model, and poll strategy.
//! 4. **Environment:** The `SCM_*` overrides understood by the original machine.
//!
//! Configuration is supplied via JSON (from Python or a file) or `Config::default()`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::constants::{
    BACKOFF_SPIN_LIMIT, DEFAULT_EXECUTION_UNITS, DEFAULT_FAULT_LAMBDA, DEFAULT_FAULT_SEED,
    DEFAULT_MEMORY_SIZE, DEFAULT_WEIBULL_BETA, INSTRUCTION_BUFFER_SIZE, INSTRUCTION_FETCH_WINDOW,
    MAX_DUPLICATED_CODELETS,
};
use crate::common::error::{SimError, SimResult};
use crate::common::reg::{RegPool, SizeClass};

/// Default configuration constants for the simulator.
mod defaults {
    /// Architectural 64B registers.
    pub const REGS_64B: usize = 160;
    /// Architectural 1L registers.
    pub const REGS_1L: usize = 140;
    /// Architectural 8L registers.
    pub const REGS_8L: usize = 100;
    /// Architectural 16L registers.
    pub const REGS_16L: usize = 100;
    /// Architectural 256L registers.
    pub const REGS_256L: usize = 60;
    /// Architectural 512L registers.
    pub const REGS_512L: usize = 60;
    /// Architectural 1024L registers.
    pub const REGS_1024L: usize = 60;
    /// Architectural 2048L registers.
    pub const REGS_2048L: usize = 40;

    /// Hidden registers per small class (64B through 16L) in each hidden pool.
    pub const HIDDEN_SMALL: usize = 32;
    /// Hidden registers per large class (256L and up) in each hidden pool.
    pub const HIDDEN_LARGE: usize = 8;
}

/// Environment variable selecting the duplication mode.
pub const ENV_DUPLICATION_MODE: &str = "SCM_DUPL_MODE";
/// Environment variable selecting the fault injection model.
pub const ENV_FAULT_INJECTION_MODE: &str = "SCM_FAULT_INJECTION_MODE";
/// Environment variable overriding the fault rate parameter.
pub const ENV_LAMBDA: &str = "SCM_LAMBDA";
/// Environment variable overriding the Weibull shape parameter.
pub const ENV_WEIBULL_BETA: &str = "SCM_WEIBULL_BETA";

/// Instruction-level parallelism policy of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum IlpMode {
    /// One instruction in flight at a time.
    Sequential,
    /// In-order issue of any number of hazard-free instructions.
    Superscalar,
    /// Out-of-order issue with register renaming.
    #[default]
    #[serde(alias = "OoO")]
    OutOfOrder,
}

/// Redundant execution mode for codelets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DuplicationMode {
    /// Codelets run once.
    #[default]
    NoDuplication,
    /// Two clones, majority of two out of three.
    TwoOutOfThree,
    /// Four clones, majority of three out of five.
    ThreeOutOfFive,
    /// Start without clones and add one at a time until a majority agrees.
    Adaptive,
}

impl DuplicationMode {
    /// Parses the value of `SCM_DUPL_MODE`.
    pub fn from_env_value(value: &str) -> Option<Self> {
        match value.trim() {
            "NO_DUPLICATION" => Some(Self::NoDuplication),
            "TWO_OUT_OF_THREE" => Some(Self::TwoOutOfThree),
            "THREE_OUT_OF_FIVE" => Some(Self::ThreeOutOfFive),
            "ADAPTIVE_DUPLICATION" => Some(Self::Adaptive),
            _ => None,
        }
    }

    /// Number of clones created alongside the original when it is dispatched.
    pub const fn initial_clones(self) -> usize {
        match self {
            Self::NoDuplication | Self::Adaptive => 0,
            Self::TwoOutOfThree => 2,
            Self::ThreeOutOfFive => 4,
        }
    }
}

/// How two copies of a duplicated codelet are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ComparisonMode {
    /// Byte-for-byte comparison of every written register.
    #[default]
    RegisterContents,
    /// Two copies agree when neither was flagged as failed.
    FailedFlag,
}

/// Fault model applied after each codelet execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum FaultInjectionMode {
    /// No faults are injected.
    #[default]
    None,
    /// Exponential time-to-failure: `1 - e^(-lambda * t)`.
    Poisson,
    /// Weibull time-to-failure: `1 - e^(-lambda * t^beta)`.
    Weibull,
}

impl FaultInjectionMode {
    /// Parses the value of `SCM_FAULT_INJECTION_MODE`.
    pub fn from_env_value(value: &str) -> Option<Self> {
        match value.trim() {
            "NO_FAULT_INJECTION" => Some(Self::None),
            "POISSON_FAULT_INJECTION" => Some(Self::Poisson),
            "WEIBULL_FAULT_INJECTION" => Some(Self::Weibull),
            _ => None,
        }
    }
}

/// What an idle thread does between two polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PollStrategy {
    /// Spin with a CPU pause hint.
    #[default]
    BusySpin,
    /// Yield the time slice to the OS scheduler.
    Yield,
    /// Spin for a while, then yield.
    Backoff,
}

impl PollStrategy {
    /// Idles once. `spins` counts consecutive idle polls and is reset by the caller
    /// whenever work is found.
    pub fn idle(self, spins: &mut u32) {
        match self {
            Self::BusySpin => std::hint::spin_loop(),
            Self::Yield => std::thread::yield_now(),
            Self::Backoff => {
                if *spins < BACKOFF_SPIN_LIMIT {
                    *spins += 1;
                    std::hint::spin_loop();
                } else {
                    std::thread::yield_now();
                }
            }
        }
    }
}

/// Root configuration structure containing all simulator settings.
///
/// # Examples
///
/// ```
/// use scmsim_core::config::{Config, IlpMode};
///
/// let config = Config::from_json(r#"{ "general": { "ilp_mode": "Superscalar" } }"#).unwrap();
/// assert_eq!(config.general.ilp_mode, IlpMode::Superscalar);
/// assert_eq!(config.general.buffer_size, 128);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Scheduler and window settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Execution unit settings.
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Register counts per pool.
    #[serde(default)]
    pub registers: RegisterFileConfig,
    /// Flat memory settings.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Duplication and fault injection settings.
    #[serde(default)]
    pub resiliency: ResiliencyConfig,
}

impl Config {
    /// Parses a JSON configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> SimResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> SimResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Rejects configurations the machine cannot run with.
    pub fn validate(&self) -> SimResult<()> {
        if self.general.execution_units == 0 {
            return Err(SimError::Config("at least one execution unit is required".into()));
        }
        if self.general.buffer_size == 0 {
            return Err(SimError::Config("instruction buffer size must be positive".into()));
        }
        if self.general.fetch_width == 0 {
            return Err(SimError::Config("fetch width must be positive".into()));
        }
        if self.resiliency.max_copies < 3 {
            return Err(SimError::Config(format!(
                "max_copies must be at least 3, got {}",
                self.resiliency.max_copies
            )));
        }
        if !(self.resiliency.lambda.is_finite() && self.resiliency.lambda >= 0.0) {
            return Err(SimError::Config("lambda must be a non-negative number".into()));
        }
        Ok(())
    }

    /// Applies the `SCM_*` environment overrides through `lookup`.
    ///
    /// # Arguments
    ///
    /// * `lookup` - Returns the value of an environment variable, if set.
    ///
    /// # Returns
    ///
    /// A configuration error naming the variable if a value cannot be parsed.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> SimResult<()> {
        if let Some(value) = lookup(ENV_DUPLICATION_MODE) {
            self.resiliency.duplication = DuplicationMode::from_env_value(&value)
                .ok_or_else(|| invalid_env(ENV_DUPLICATION_MODE, &value))?;
        }
        if let Some(value) = lookup(ENV_FAULT_INJECTION_MODE) {
            self.resiliency.fault_injection = FaultInjectionMode::from_env_value(&value)
                .ok_or_else(|| invalid_env(ENV_FAULT_INJECTION_MODE, &value))?;
        }
        if let Some(value) = lookup(ENV_LAMBDA) {
            self.resiliency.lambda = value
                .trim()
                .parse()
                .map_err(|_| invalid_env(ENV_LAMBDA, &value))?;
        }
        if let Some(value) = lookup(ENV_WEIBULL_BETA) {
            self.resiliency.beta = value
                .trim()
                .parse()
                .map_err(|_| invalid_env(ENV_WEIBULL_BETA, &value))?;
        }
        self.validate()
    }

    /// Applies the `SCM_*` overrides from the process environment.
    pub fn apply_process_env(&mut self) -> SimResult<()> {
        self.apply_env_overrides(|key| std::env::var(key).ok())
    }
}

fn invalid_env(key: &str, value: &str) -> SimError {
    SimError::Config(format!("{key} has unsupported value `{value}`"))
}

/// Scheduler and window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// ILP policy.
    #[serde(default)]
    pub ilp_mode: IlpMode,
    /// Number of execution units (and execution slots).
    #[serde(default = "GeneralConfig::default_execution_units")]
    pub execution_units: usize,
    /// Capacity of the instruction buffer.
    #[serde(default = "GeneralConfig::default_buffer_size")]
    pub buffer_size: usize,
    /// Lines fetched per scheduler tick.
    #[serde(default = "GeneralConfig::default_fetch_width")]
    pub fetch_width: usize,
    /// Optional bound on scheduler ticks before the run is aborted.
    #[serde(default)]
    pub max_ticks: Option<u64>,
}

impl GeneralConfig {
    fn default_execution_units() -> usize {
        DEFAULT_EXECUTION_UNITS
    }

    fn default_buffer_size() -> usize {
        INSTRUCTION_BUFFER_SIZE
    }

    fn default_fetch_width() -> usize {
        INSTRUCTION_FETCH_WINDOW
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            ilp_mode: IlpMode::default(),
            execution_units: DEFAULT_EXECUTION_UNITS,
            buffer_size: INSTRUCTION_BUFFER_SIZE,
            fetch_width: INSTRUCTION_FETCH_WINDOW,
            max_ticks: None,
        }
    }
}

/// Execution unit settings.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Idle behaviour of execution units and of the scheduler.
    #[serde(default)]
    pub poll: PollStrategy,
}

/// Register counts for each size class of one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolCounts {
    /// 64B registers.
    #[serde(rename = "64B", default)]
    pub b64: usize,
    /// 1L registers.
    #[serde(rename = "1L", default)]
    pub l1: usize,
    /// 8L registers.
    #[serde(rename = "8L", default)]
    pub l8: usize,
    /// 16L registers.
    #[serde(rename = "16L", default)]
    pub l16: usize,
    /// 256L registers.
    #[serde(rename = "256L", default)]
    pub l256: usize,
    /// 512L registers.
    #[serde(rename = "512L", default)]
    pub l512: usize,
    /// 1024L registers.
    #[serde(rename = "1024L", default)]
    pub l1024: usize,
    /// 2048L registers.
    #[serde(rename = "2048L", default)]
    pub l2048: usize,
}

impl PoolCounts {
    /// Same count for every class.
    pub const fn uniform(count: usize) -> Self {
        Self {
            b64: count,
            l1: count,
            l8: count,
            l16: count,
            l256: count,
            l512: count,
            l1024: count,
            l2048: count,
        }
    }

    /// Count for one class.
    pub const fn count(&self, class: SizeClass) -> usize {
        match class {
            SizeClass::B64 => self.b64,
            SizeClass::L1 => self.l1,
            SizeClass::L8 => self.l8,
            SizeClass::L16 => self.l16,
            SizeClass::L256 => self.l256,
            SizeClass::L512 => self.l512,
            SizeClass::L1024 => self.l1024,
            SizeClass::L2048 => self.l2048,
        }
    }

    /// Sets the count for one class.
    pub fn set(&mut self, class: SizeClass, count: usize) {
        let slot = match class {
            SizeClass::B64 => &mut self.b64,
            SizeClass::L1 => &mut self.l1,
            SizeClass::L8 => &mut self.l8,
            SizeClass::L16 => &mut self.l16,
            SizeClass::L256 => &mut self.l256,
            SizeClass::L512 => &mut self.l512,
            SizeClass::L1024 => &mut self.l1024,
            SizeClass::L2048 => &mut self.l2048,
        };
        *slot = count;
    }

    fn architectural() -> Self {
        Self {
            b64: defaults::REGS_64B,
            l1: defaults::REGS_1L,
            l8: defaults::REGS_8L,
            l16: defaults::REGS_16L,
            l256: defaults::REGS_256L,
            l512: defaults::REGS_512L,
            l1024: defaults::REGS_1024L,
            l2048: defaults::REGS_2048L,
        }
    }

    fn hidden() -> Self {
        Self {
            b64: defaults::HIDDEN_SMALL,
            l1: defaults::HIDDEN_SMALL,
            l8: defaults::HIDDEN_SMALL,
            l16: defaults::HIDDEN_SMALL,
            l256: defaults::HIDDEN_LARGE,
            l512: defaults::HIDDEN_LARGE,
            l1024: defaults::HIDDEN_LARGE,
            l2048: defaults::HIDDEN_LARGE,
        }
    }
}

/// Register counts for the architectural file and both hidden pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFileConfig {
    /// Registers programs can name.
    #[serde(default = "PoolCounts::architectural")]
    pub architectural: PoolCounts,
    /// Hidden registers for out-of-order renaming.
    #[serde(default = "PoolCounts::hidden")]
    pub rename: PoolCounts,
    /// Hidden registers for duplicated codelets.
    #[serde(default = "PoolCounts::hidden")]
    pub duplicate: PoolCounts,
}

impl RegisterFileConfig {
    /// Same architectural count for every class and same count for both hidden pools.
    pub const fn uniform(architectural: usize, hidden: usize) -> Self {
        Self {
            architectural: PoolCounts::uniform(architectural),
            rename: PoolCounts::uniform(hidden),
            duplicate: PoolCounts::uniform(hidden),
        }
    }

    /// Counts of one pool.
    pub const fn pool(&self, pool: RegPool) -> &PoolCounts {
        match pool {
            RegPool::Architectural => &self.architectural,
            RegPool::Rename => &self.rename,
            RegPool::Duplicate => &self.duplicate,
        }
    }
}

impl Default for RegisterFileConfig {
    fn default() -> Self {
        Self {
            architectural: PoolCounts::architectural(),
            rename: PoolCounts::hidden(),
            duplicate: PoolCounts::hidden(),
        }
    }
}

/// Flat shared memory settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Size of the address space in bytes.
    #[serde(default = "MemoryConfig::default_size")]
    pub size: usize,
}

impl MemoryConfig {
    fn default_size() -> usize {
        DEFAULT_MEMORY_SIZE
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_MEMORY_SIZE,
        }
    }
}

/// Duplication and fault injection settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResiliencyConfig {
    /// Redundant execution mode.
    #[serde(default)]
    pub duplication: DuplicationMode,
    /// How copies are compared during the vote.
    #[serde(default)]
    pub comparison: ComparisonMode,
    /// Fault model applied after codelets run.
    #[serde(default)]
    pub fault_injection: FaultInjectionMode,
    /// Rate parameter of the fault model (per millisecond of codelet time).
    #[serde(default = "ResiliencyConfig::default_lambda")]
    pub lambda: f64,
    /// Shape parameter of the Weibull model.
    #[serde(default = "ResiliencyConfig::default_beta")]
    pub beta: f64,
    /// Largest duplication group (original included).
    #[serde(default = "ResiliencyConfig::default_max_copies")]
    pub max_copies: usize,
    /// Seed of the execution units' random generators.
    #[serde(default = "ResiliencyConfig::default_seed")]
    pub seed: u64,
}

impl ResiliencyConfig {
    fn default_lambda() -> f64 {
        DEFAULT_FAULT_LAMBDA
    }

    fn default_beta() -> f64 {
        DEFAULT_WEIBULL_BETA
    }

    fn default_max_copies() -> usize {
        MAX_DUPLICATED_CODELETS
    }

    fn default_seed() -> u64 {
        DEFAULT_FAULT_SEED
    }
}

impl Default for ResiliencyConfig {
    fn default() -> Self {
        Self {
            duplication: DuplicationMode::default(),
            comparison: ComparisonMode::default(),
            fault_injection: FaultInjectionMode::default(),
            lambda: DEFAULT_FAULT_LAMBDA,
            beta: DEFAULT_WEIBULL_BETA,
            max_copies: MAX_DUPLICATED_CODELETS,
            seed: DEFAULT_FAULT_SEED,
        }
    }
}
