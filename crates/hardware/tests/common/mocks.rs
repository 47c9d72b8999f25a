//! Fault model mocks and test-only codelets.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use mockall::mock;
use scmsim_core::common::{RegPool, SimResult};
use scmsim_core::core::fault::FaultModel;
use scmsim_core::isa::{Codelet, CodeletRegistry, ExecutionContext, OpIo};

mock! {
    pub Faults {}

    impl FaultModel for Faults {
        fn should_inject(&mut self, elapsed: Duration) -> bool;
    }
}

impl std::fmt::Debug for MockFaults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockFaults").finish_non_exhaustive()
    }
}

/// A model that injects on exactly one query across every model sharing `fired`.
pub fn single_fault(fired: Arc<AtomicBool>) -> MockFaults {
    let mut faults = MockFaults::new();
    let _ = faults
        .expect_should_inject()
        .returning(move |_| !fired.swap(true, Ordering::SeqCst));
    faults
}

/// A model that injects on every query.
pub fn always_faulty() -> MockFaults {
    let mut faults = MockFaults::new();
    let _ = faults.expect_should_inject().returning(|_| true);
    faults
}

/// `COD flaky dst, src`: writes `src + 1`, garbled whenever `dst` is architectural.
///
/// Clones always write Duplicate-pool registers, so only an original run comes out wrong.
#[derive(Debug)]
pub struct Flaky;

impl Codelet for Flaky {
    fn name(&self) -> &str {
        "flaky"
    }

    fn io_mask(&self) -> OpIo {
        OpIo::OP1_WR | OpIo::OP2_RD
    }

    fn run(&self, ctx: &ExecutionContext<'_>) -> SimResult<()> {
        let dst = ctx.register(0)?;
        let value = ctx.value(1)?.wrapping_add(1);
        let out = if dst.pool() == RegPool::Architectural {
            value ^ 0xdead
        } else {
            value
        };
        ctx.registers().write_u64(dst, out)
    }
}

/// `COD unique dst`: every run of one instance writes a different value.
#[derive(Debug, Default)]
pub struct Unique {
    runs: AtomicU64,
}

impl Codelet for Unique {
    fn name(&self) -> &str {
        "unique"
    }

    fn io_mask(&self) -> OpIo {
        OpIo::OP1_WR
    }

    fn run(&self, ctx: &ExecutionContext<'_>) -> SimResult<()> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst);
        ctx.registers().write_u64(ctx.register(0)?, 1000 + run)
    }
}

/// Built-ins plus `flaky` and `unique`.
pub fn test_registry() -> Arc<CodeletRegistry> {
    let mut registry = CodeletRegistry::with_builtins();
    registry.register("flaky", || Arc::new(Flaky));
    registry.register("unique", || Arc::new(Unique::default()));
    Arc::new(registry)
}
