//! Fault injection models.
//!
//! Execution units ask their model after every non-memory codelet whether the run should
//! be treated as faulty. The model is a policy the unit queries; the scheduler never
//! sees it.

use std::fmt;
use std::time::Duration;

use crate::config::{FaultInjectionMode, ResiliencyConfig};

/// Decides whether a codelet execution suffered a fault.
pub trait FaultModel: Send + fmt::Debug {
    /// Called once per finished non-memory codelet with its running time.
    fn should_inject(&mut self, elapsed: Duration) -> bool;
}

/// Never injects.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFaults;

impl FaultModel for NoFaults {
    fn should_inject(&mut self, _elapsed: Duration) -> bool {
        false
    }
}

/// Xorshift generator; cheap and reproducible from a seed.
#[derive(Debug, Clone)]
pub struct XorShift {
    state: u64,
}

impl XorShift {
    /// Creates a generator. A zero seed would lock the sequence at zero, so it is bumped.
    pub const fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    /// Next raw value.
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Next value uniform in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// Poisson or Weibull failure model over codelet running time.
///
/// The failure probability of a run lasting `t` milliseconds is the model's CDF:
/// `1 - e^(-λt)` (Poisson) or `1 - e^(-λt^β)` (Weibull). A fault is injected when the
/// CDF exceeds a uniform draw.
#[derive(Debug, Clone)]
pub struct StochasticFaults {
    mode: FaultInjectionMode,
    lambda: f64,
    beta: f64,
    rng: XorShift,
}

impl StochasticFaults {
    /// Creates a model for one unit; units draw from distinct streams.
    pub const fn new(mode: FaultInjectionMode, lambda: f64, beta: f64, seed: u64) -> Self {
        Self {
            mode,
            lambda,
            beta,
            rng: XorShift::new(seed),
        }
    }

    /// Failure probability of a run lasting `millis` milliseconds.
    pub fn probability(&self, millis: f64) -> f64 {
        match self.mode {
            FaultInjectionMode::None => 0.0,
            FaultInjectionMode::Poisson => 1.0 - (-self.lambda * millis).exp(),
            FaultInjectionMode::Weibull => 1.0 - (-self.lambda * millis.powf(self.beta)).exp(),
        }
    }
}

impl FaultModel for StochasticFaults {
    fn should_inject(&mut self, elapsed: Duration) -> bool {
        let probability = self.probability(elapsed.as_secs_f64() * 1000.0);
        probability > self.rng.next_f64()
    }
}

/// Builds the configured model for execution unit `unit`.
pub fn fault_model_for(config: &ResiliencyConfig, unit: usize) -> Box<dyn FaultModel> {
    match config.fault_injection {
        FaultInjectionMode::None => Box::new(NoFaults),
        mode => Box::new(StochasticFaults::new(
            mode,
            config.lambda,
            config.beta,
            config.seed.wrapping_add(unit as u64),
        )),
    }
}
