//! Out-of-order policy: renaming, broadcast, and continuation.

use scmsim_core::common::RegPool;
use scmsim_core::config::IlpMode;
use scmsim_core::core::InstState;
use scmsim_core::core::ilp::IlpController;
use scmsim_core::isa::Operand;

use super::Window;
use crate::common::builder::{add, cod, commit, ldadr, ldimm, stadr};
use crate::common::harness::{r64, registers};

#[test]
fn readers_see_the_value_of_their_program_position() {
    let mut w = Window::new(IlpMode::OutOfOrder);
    let (x, y, z) = (r64(0), r64(1), r64(2));

    let (a, ready_a) = w.issue(ldimm(x, 1));
    let (c, ready_c) = w.issue(add(y, x, x));
    let (b, ready_b) = w.issue(ldimm(x, 2));
    let (d, ready_d) = w.issue(add(z, x, x));
    assert!(ready_a);
    assert!(!ready_c);
    assert!(ready_b, "a second writer of X is renamed rather than stalled");
    assert!(!ready_d);

    let renamed = w.ilp.resolve(x);
    assert_ne!(renamed, x);
    assert_eq!(renamed.pool(), RegPool::Rename);
    assert_eq!(w.buffer.entry(d).unwrap().inst.register(1), Some(renamed));

    // The younger writer lands first; only its own reader wakes.
    w.complete(b);
    assert!(w.is_ready(d));
    assert_eq!(w.state(c), InstState::Waiting);
    w.complete(d);

    w.complete(a);
    assert!(w.is_ready(c));
    w.complete(c);

    assert_eq!(w.regs.read_u64(y).unwrap(), 2);
    assert_eq!(w.regs.read_u64(z).unwrap(), 4);
    assert_eq!(w.regs.read_u64(x).unwrap(), 1);
    assert_eq!(w.regs.read_u64(w.ilp.resolve(x)).unwrap(), 2);

    w.ilp.drain(&w.regs).unwrap();
    assert_eq!(w.ilp.resolve(x), x);
    assert_eq!(w.regs.read_u64(x).unwrap(), 2);
    assert!(w.ilp.is_quiescent());
    assert_eq!(w.ilp.counters().renames, 1);
}

#[test]
fn read_write_chain_on_one_register_runs_in_order() {
    let mut w = Window::new(IlpMode::OutOfOrder);
    let (x, y) = (r64(0), r64(1));

    let (write, _) = w.issue(ldimm(x, 3));
    let (s1, ready_s1) = w.issue(cod("scale", vec![x.into(), Operand::imm(2)]));
    let (s2, ready_s2) = w.issue(cod("scale", vec![x.into(), Operand::imm(5)]));
    let (read, ready_read) = w.issue(add(y, x, x));
    assert!(!ready_s1 && !ready_s2 && !ready_read);

    w.complete(write);
    assert!(w.is_ready(s1));
    assert!(!w.is_ready(s2), "the second read-write waits for the first");
    assert!(!w.is_ready(read));

    w.complete(s1);
    assert!(w.is_ready(s2));
    assert!(!w.is_ready(read));

    w.complete(s2);
    assert!(w.is_ready(read));
    w.complete(read);

    assert_eq!(w.regs.read_u64(w.ilp.resolve(x)).unwrap(), 30);
    assert_eq!(w.regs.read_u64(y).unwrap(), 60);
    w.ilp.drain(&w.regs).unwrap();
    assert_eq!(w.regs.read_u64(x).unwrap(), 30);
}

#[test]
fn exhausted_rename_pool_is_a_stall() {
    let mut w = Window::with_registers(IlpMode::OutOfOrder, registers(16, 0));
    let x = r64(0);

    let (a, ready_a) = w.issue(ldimm(x, 1));
    let (b, ready_b) = w.issue(ldimm(x, 2));
    assert!(ready_a);
    assert!(!ready_b);
    assert_eq!(w.state(b), InstState::Stall);
    assert_eq!(w.ilp.counters().structural_hazards, 1);

    // Younger instructions queue behind the blocked one.
    let (c, ready_c) = w.issue(ldimm(r64(5), 7));
    assert!(!ready_c);

    // Retrying does not count the same hazard twice.
    assert!(!w.schedule(b));
    assert_eq!(w.ilp.counters().structural_hazards, 1);

    w.complete(a);
    assert!(w.schedule(b));
    assert!(w.schedule(c));
    assert_eq!(w.ilp.resolve(x), x);
    w.complete(b);
    w.complete(c);
    assert_eq!(w.regs.read_u64(x).unwrap(), 2);
}

#[test]
fn memory_stall_clears_while_a_younger_instruction_is_structurally_blocked() {
    let mut w = Window::with_registers(IlpMode::OutOfOrder, registers(16, 1));
    let (src, loaded, sum) = (r64(2), r64(3), r64(4));
    w.regs.write_u64(src, 5).unwrap();

    let (store, ready_store) = w.issue(stadr(src, 0));
    let (load, ready_load) = w.issue(ldadr(loaded, 0));
    let (a, _) = w.issue(add(sum, loaded, loaded));
    let (b, _) = w.issue(add(sum, loaded, loaded));
    let (c, ready_c) = w.issue(ldimm(sum, 9));
    assert!(ready_store);
    assert!(!ready_load);
    assert!(!ready_c);
    assert_eq!(w.state(c), InstState::Stall);
    assert_eq!(w.ilp.counters().structural_hazards, 1);

    // The load re-checks its range even though `c` still holds the structural hazard.
    w.complete(store);
    assert!(w.schedule(load));
    w.complete(load);

    assert!(w.is_ready(a));
    assert!(w.is_ready(b));
    w.complete(a);
    w.complete(b);
    assert!(w.schedule(c));
    w.complete(c);

    w.ilp.drain(&w.regs).unwrap();
    assert_eq!(w.regs.read_u64(loaded).unwrap(), 5);
    assert_eq!(w.regs.read_u64(sum).unwrap(), 9);
}

#[test]
fn commit_waits_for_every_write() {
    let mut w = Window::new(IlpMode::OutOfOrder);
    let writes: Vec<_> = (0..3).map(|i| w.issue(ldimm(r64(i), 1)).0).collect();
    let (c, ready) = w.issue(commit());
    assert!(!ready);
    assert_eq!(w.state(c), InstState::Stall);

    w.complete(writes[0]);
    w.complete(writes[2]);
    assert!(!w.schedule(c));
    w.complete(writes[1]);
    assert!(w.schedule(c));
}
