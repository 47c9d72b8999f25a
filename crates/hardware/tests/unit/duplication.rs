//! # Duplication Tests
//!
//! Redundant codelet execution on a running machine: majority override, growth in
//! adaptive mode, the fatal no-consensus path, and injected faults.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use rstest::rstest;
use scmsim_core::config::{ComparisonMode, DuplicationMode, IlpMode};
use scmsim_core::core::fault::FaultModel;
use scmsim_core::isa::Operand;
use scmsim_core::{Config, Machine, Program, SimError};

use crate::common::harness::{init_tracing, r64, small_config};
use crate::common::mocks::{always_faulty, single_fault, test_registry};

fn config(mode: IlpMode, duplication: DuplicationMode) -> Config {
    let mut config = small_config(mode);
    config.resiliency.duplication = duplication;
    config
}

fn flaky_program() -> Program {
    Program::builder()
        .ldimm(r64(0), 41)
        .cod("flaky", vec![r64(1).into(), r64(0).into()])
        .commit()
        .build()
}

fn machine(config: Config, program: Program) -> Machine {
    init_tracing();
    Machine::with_registry(config, program, test_registry()).unwrap()
}

#[rstest]
#[case::sequential(IlpMode::Sequential)]
#[case::superscalar(IlpMode::Superscalar)]
#[case::out_of_order(IlpMode::OutOfOrder)]
fn majority_overrides_a_wrong_original(#[case] mode: IlpMode) {
    let mut m = machine(config(mode, DuplicationMode::TwoOutOfThree), flaky_program());
    m.run().unwrap();

    assert_eq!(m.read_u64(r64(1)).unwrap(), 42);
    let stats = m.stats();
    assert_eq!(stats.duplicates_spawned, 2);
    assert_eq!(stats.votes, 1);
    assert_eq!(stats.overrides, 1);
    assert_eq!(m.driver().duplication().registers_in_use(), 0);
}

#[test]
fn three_out_of_five_spawns_four_clones() {
    let mut m = machine(
        config(IlpMode::Superscalar, DuplicationMode::ThreeOutOfFive),
        flaky_program(),
    );
    m.run().unwrap();
    assert_eq!(m.read_u64(r64(1)).unwrap(), 42);
    assert_eq!(m.stats().duplicates_spawned, 4);
    assert_eq!(m.stats().overrides, 1);
}

#[test]
fn adaptive_grows_until_a_majority_agrees() {
    let mut m = machine(
        config(IlpMode::Sequential, DuplicationMode::Adaptive),
        flaky_program(),
    );
    m.run().unwrap();
    assert_eq!(m.read_u64(r64(1)).unwrap(), 42);
    // One copy has no majority, one clone ties, a second clone settles it.
    assert_eq!(m.stats().duplicates_spawned, 2);
    assert_eq!(m.stats().votes, 3);
    assert_eq!(m.stats().overrides, 1);
}

#[rstest]
#[case::two_of_three(DuplicationMode::TwoOutOfThree, 3)]
#[case::adaptive(DuplicationMode::Adaptive, 5)]
fn no_consensus_halts_the_machine(#[case] duplication: DuplicationMode, #[case] copies: usize) {
    let mut cfg = config(IlpMode::Superscalar, duplication);
    cfg.resiliency.max_copies = 5;
    let program = Program::builder()
        .cod("unique", vec![r64(2).into()])
        .commit()
        .build();
    let mut m = machine(cfg, program);

    let err = m.run().unwrap_err();
    match err {
        SimError::ResiliencyFailure { copies: n, ref instruction } => {
            assert_eq!(n, copies);
            assert!(instruction.contains("unique"), "{instruction}");
        }
        other => panic!("expected a resiliency failure, got {other}"),
    }
    assert!(m.is_halted());
    assert!(matches!(m.run(), Err(SimError::Halted)));
}

#[test]
fn memory_codelets_are_never_duplicated() {
    let program = Program::builder()
        .cod("store_block", vec![r64(0).into(), Operand::imm(0)])
        .commit()
        .build();
    let mut m = machine(config(IlpMode::OutOfOrder, DuplicationMode::TwoOutOfThree), program);
    m.run().unwrap();
    assert_eq!(m.stats().duplicates_spawned, 0);
}

#[rstest]
#[case::sequential(IlpMode::Sequential)]
#[case::out_of_order(IlpMode::OutOfOrder)]
fn single_injected_fault_is_outvoted(#[case] mode: IlpMode) {
    let mut cfg = config(mode, DuplicationMode::TwoOutOfThree);
    cfg.resiliency.comparison = ComparisonMode::FailedFlag;
    let program = Program::builder()
        .ldimm(r64(0), 7)
        .cod("copy", vec![r64(1).into(), r64(0).into()])
        .commit()
        .build();
    let mut m = machine(cfg, program);
    let fired = Arc::new(AtomicBool::new(false));
    m.set_fault_model_factory(Box::new(move |_| {
        Box::new(single_fault(Arc::clone(&fired))) as Box<dyn FaultModel>
    }));
    m.run().unwrap();

    assert_eq!(m.read_u64(r64(1)).unwrap(), 7);
    assert_eq!(m.stats().faults_injected, 1);
    assert_eq!(m.stats().votes, 1);
}

#[test]
fn fault_without_duplication_is_fatal() {
    let program = Program::builder()
        .cod("copy", vec![r64(1).into(), r64(0).into()])
        .commit()
        .build();
    let mut m = machine(config(IlpMode::Sequential, DuplicationMode::NoDuplication), program);
    m.set_fault_model_factory(Box::new(|_| Box::new(always_faulty()) as Box<dyn FaultModel>));
    assert!(matches!(
        m.run(),
        Err(SimError::ResiliencyFailure { copies: 1, .. })
    ));
}
