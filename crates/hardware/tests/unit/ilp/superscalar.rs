//! Superscalar policy: register reservations without renaming.

use rstest::rstest;
use scmsim_core::common::RegId;
use scmsim_core::config::IlpMode;
use scmsim_core::core::InstState;
use scmsim_core::core::ilp::IlpController;
use scmsim_core::isa::DecodedInstruction;

use super::Window;
use crate::common::builder::{add, commit, ldimm};
use crate::common::harness::r64;

#[test]
fn readers_of_one_register_share_it() {
    let mut w = Window::new(IlpMode::Superscalar);
    let (a, ready_a) = w.issue(add(r64(1), r64(0), r64(0)));
    let (b, ready_b) = w.issue(add(r64(2), r64(0), r64(0)));
    assert!(ready_a && ready_b);
    assert!(w.is_ready(a) && w.is_ready(b));
}

fn writer(x: RegId) -> DecodedInstruction {
    ldimm(x, 9)
}

fn reader(x: RegId) -> DecodedInstruction {
    add(r64(7), x, x)
}

fn other_writer(x: RegId) -> DecodedInstruction {
    add(x, r64(6), r64(6))
}

#[rstest]
#[case::raw(writer, reader)]
#[case::war(reader, writer)]
#[case::waw(writer, other_writer)]
fn conflicting_pair_never_ready_together(
    #[case] first: fn(RegId) -> DecodedInstruction,
    #[case] second: fn(RegId) -> DecodedInstruction,
) {
    let mut w = Window::new(IlpMode::Superscalar);
    let x = r64(3);
    let (a, ready_a) = w.issue(first(x));
    let (b, ready_b) = w.issue(second(x));
    assert!(ready_a);
    assert!(!ready_b);
    assert_eq!(w.state(b), InstState::Stall);

    // Retrying while the first is in flight changes nothing.
    w.execute(a);
    assert!(!w.schedule(b));
    w.finish(a);
    assert!(w.schedule(b));
}

#[test]
fn commit_waits_for_every_write() {
    let mut w = Window::new(IlpMode::Superscalar);
    let writes: Vec<_> = (0..4).map(|i| w.issue(ldimm(r64(i), 1)).0).collect();
    assert!(writes.iter().all(|t| w.is_ready(*t)));
    let (c, ready) = w.issue(commit());
    assert!(!ready);

    for (n, &tag) in writes.iter().enumerate() {
        w.complete(tag);
        let last = n + 1 == writes.len();
        assert_eq!(w.schedule(c), last);
    }
    assert!(w.ilp.is_quiescent());
}
