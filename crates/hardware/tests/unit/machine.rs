//! # Machine Tests
//!
//! Whole programs on real execution-unit threads. Every policy must produce the results
//! a strictly sequential run produces; only the statistics may differ.

use pretty_assertions::assert_eq;
use rstest::rstest;
use scmsim_core::common::{RegId, SizeClass};
use scmsim_core::config::{IlpMode, RegisterFileConfig};
use scmsim_core::isa::Operand;
use scmsim_core::{Config, Machine, Program, SimError};

use crate::common::harness::{init_tracing, l1, r64, small_config};

fn run(config: Config, program: Program) -> Machine {
    init_tracing();
    let mut machine = Machine::new(config, program).unwrap();
    machine.run().unwrap();
    machine
}

fn values(machine: &Machine, regs: &[RegId]) -> Vec<u64> {
    regs.iter().map(|id| machine.read_u64(*id).unwrap()).collect()
}

#[rstest]
#[case::sequential(IlpMode::Sequential)]
#[case::superscalar(IlpMode::Superscalar)]
#[case::out_of_order(IlpMode::OutOfOrder)]
fn readers_observe_program_order(#[case] mode: IlpMode) {
    let (x, y, z) = (r64(0), r64(1), r64(2));
    let program = Program::builder()
        .ldimm(x, 1)
        .add(y, x, 0u64)
        .ldimm(x, 2)
        .add(z, x, 0u64)
        .commit()
        .build();
    let m = run(small_config(mode), program);
    assert_eq!(values(&m, &[x, y, z]), vec![2, 1, 2]);
    // After COMMIT the architectural register itself holds the newest value.
    assert_eq!(m.registers().read_u64(x).unwrap(), 2);
}

#[rstest]
#[case::sequential(IlpMode::Sequential)]
#[case::superscalar(IlpMode::Superscalar)]
#[case::out_of_order(IlpMode::OutOfOrder)]
fn arithmetic_chain(#[case] mode: IlpMode) {
    let (a, b, c) = (r64(0), r64(1), r64(2));
    let program = Program::builder()
        .ldimm(a, 10)
        .ldimm(b, 3)
        .sub(c, a, b)
        .shfl(c, 4u64)
        .add(a, c, a)
        .shfr(a, 1u64)
        .commit()
        .build();
    let m = run(small_config(mode), program);
    assert_eq!(values(&m, &[a, b, c]), vec![61, 3, 112]);
}

#[rstest]
#[case::sequential(IlpMode::Sequential)]
#[case::superscalar(IlpMode::Superscalar)]
#[case::out_of_order(IlpMode::OutOfOrder)]
fn counted_loop(#[case] mode: IlpMode) {
    let (i, limit, one) = (r64(0), r64(1), r64(2));
    let program = Program::builder()
        .ldimm(i, 0)
        .ldimm(limit, 5)
        .ldimm(one, 1)
        .label("loop")
        .add(i, i, one)
        .blt(i, limit, -1)
        .commit()
        .build();
    let m = run(small_config(mode), program);
    assert_eq!(m.read_u64(i).unwrap(), 5);
    assert_eq!(m.stats().control_resolved, 5);
}

#[rstest]
#[case::sequential(IlpMode::Sequential)]
#[case::superscalar(IlpMode::Superscalar)]
#[case::out_of_order(IlpMode::OutOfOrder)]
fn memory_round_trip(#[case] mode: IlpMode) {
    let base = r64(3);
    let program = Program::builder()
        .ldimm(base, 128)
        .cod("vec_add", vec![l1(0).into(), l1(1).into(), Operand::imm(7)])
        .stoff(l1(0), base, 64u64)
        .ldadr(l1(2), 192u64)
        .ldoff(l1(3), base, 96u64)
        .commit()
        .build();
    let mut config = small_config(mode);
    config.memory.size = 512;
    let m = run(config, program);

    let stored = m.read_memory(192, 64).unwrap();
    assert_eq!(m.read_register(l1(2)).unwrap(), stored);
    assert_eq!(&m.read_register(l1(3)).unwrap()[..32], &stored[32..]);
    assert_eq!(&stored[..8], &7u64.to_be_bytes());
}

#[test]
fn sequential_never_overlaps_execution() {
    let mut builder = Program::builder();
    for i in 0..12 {
        builder = builder.ldimm(r64(i), u64::from(i));
    }
    let m = run(small_config(IlpMode::Sequential), builder.commit().build());
    assert_eq!(m.stats().max_in_flight, 1);
    assert_eq!(m.stats().retired, 13);
}

#[test]
fn independent_work_overlaps_out_of_order() {
    let mut builder = Program::builder();
    for i in 0..8 {
        builder = builder.cod("sleep", vec![Operand::imm(20)]).ldimm(r64(i), 1);
    }
    let m = run(small_config(IlpMode::OutOfOrder), builder.commit().build());
    assert!(m.stats().max_in_flight > 1, "{}", m.stats().summary());
}

#[test]
fn seeded_registers_are_visible_to_the_program() {
    init_tracing();
    let (a, b) = (r64(0), r64(1));
    let program = Program::builder().add(b, a, a).commit().build();
    let mut m = Machine::new(small_config(IlpMode::Superscalar), program).unwrap();
    m.write_u64(a, 21).unwrap();
    m.run().unwrap();
    assert_eq!(m.read_u64(b).unwrap(), 42);
}

#[rstest]
#[case::sequential(IlpMode::Sequential)]
#[case::out_of_order(IlpMode::OutOfOrder)]
fn out_of_bounds_access_halts(#[case] mode: IlpMode) {
    init_tracing();
    let program = Program::builder().ldadr(l1(0), 4090u64).commit().build();
    let mut m = Machine::new(small_config(mode), program).unwrap();
    assert!(matches!(
        m.run(),
        Err(SimError::MemoryOutOfBounds { addr: 4090, len: 64, .. })
    ));
    assert!(m.is_halted());
}

#[test]
fn unknown_codelet_halts_with_its_position() {
    init_tracing();
    let program = Program::builder()
        .ldimm(r64(0), 1)
        .cod("fft", vec![r64(0).into()])
        .commit()
        .build();
    let mut m = Machine::new(small_config(IlpMode::OutOfOrder), program).unwrap();
    match m.run() {
        Err(SimError::UnknownInstruction { pc, text }) => {
            assert_eq!(pc, 1);
            assert!(text.contains("fft"), "{text}");
        }
        other => panic!("expected an unknown instruction, got {other:?}"),
    }
}

#[test]
fn program_without_commit_overruns() {
    init_tracing();
    let program = Program::builder().ldimm(r64(0), 1).build();
    let mut m = Machine::new(small_config(IlpMode::Superscalar), program).unwrap();
    assert!(matches!(m.run(), Err(SimError::ProgramOverrun { pc: 1 })));
}

#[test]
fn memory_stall_does_not_deadlock_behind_a_structural_hazard() {
    init_tracing();
    let (src, loaded, sum) = (r64(2), r64(3), r64(4));
    let program = Program::builder()
        .stadr(src, 0u64)
        .ldadr(loaded, 0u64)
        .add(sum, loaded, loaded)
        .add(sum, loaded, loaded)
        .ldimm(sum, 9)
        .commit()
        .build();
    let mut config = small_config(IlpMode::OutOfOrder);
    config.general.fetch_width = 8;
    config.registers = RegisterFileConfig::uniform(16, 1);
    let mut m = Machine::new(config, program).unwrap();
    m.write_u64(src, 5).unwrap();

    m.run().unwrap();
    assert_eq!(values(&m, &[loaded, sum]), vec![5, 9]);
    assert!(m.stats().structural_hazards >= 1, "{}", m.stats().summary());
}

#[test]
fn wide_registers_round_trip() {
    let wide = RegId::arch(SizeClass::L8, 0);
    let program = Program::builder()
        .cod("vec_add", vec![wide.into(), wide.into(), Operand::imm(3)])
        .cod("scale", vec![wide.into(), Operand::imm(2)])
        .commit()
        .build();
    let m = run(small_config(IlpMode::OutOfOrder), program);
    let bytes = m.read_register(wide).unwrap();
    assert_eq!(bytes.len(), 512);
    assert!(bytes.chunks(8).all(|lane| lane == 6u64.to_be_bytes()));
}
