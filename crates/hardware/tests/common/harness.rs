//! Test harness: logging, small configurations, and register shorthands.

use scmsim_core::common::{RegId, RegisterFile, SizeClass};
use scmsim_core::config::{Config, IlpMode, PollStrategy, RegisterFileConfig};
use tracing_subscriber::EnvFilter;

/// Installs a test subscriber once; later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Architectural 64B register.
pub const fn r64(index: u32) -> RegId {
    RegId::arch(SizeClass::B64, index)
}

/// Architectural 1L (64-byte) register.
pub const fn l1(index: u32) -> RegId {
    RegId::arch(SizeClass::L1, index)
}

/// Register file with `arch` registers per class and `hidden` per hidden pool.
pub fn registers(arch: usize, hidden: usize) -> RegisterFile {
    RegisterFile::new(&RegisterFileConfig::uniform(arch, hidden))
}

/// A small machine that yields while idle, so tests stay polite on busy CI hosts.
pub fn small_config(mode: IlpMode) -> Config {
    let mut config = Config::default();
    config.general.ilp_mode = mode;
    config.general.execution_units = 4;
    config.general.buffer_size = 16;
    config.general.max_ticks = Some(10_000_000);
    config.execution.poll = PollStrategy::Yield;
    config.registers = RegisterFileConfig::uniform(16, 8);
    config.memory.size = 4096;
    config
}
