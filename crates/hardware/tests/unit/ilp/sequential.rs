//! Sequential policy: one instruction in flight.

use scmsim_core::config::IlpMode;
use scmsim_core::core::InstState;

use super::Window;
use crate::common::builder::{add, commit, ldimm};
use crate::common::harness::r64;

#[test]
fn second_instruction_waits_for_the_slot() {
    let mut w = Window::new(IlpMode::Sequential);
    let (a, ready_a) = w.issue(ldimm(r64(0), 1));
    let (b, ready_b) = w.issue(ldimm(r64(1), 2));
    assert!(ready_a);
    assert!(!ready_b);
    assert_eq!(w.state(b), InstState::Stall);

    w.complete(a);
    assert!(w.schedule(b));
}

#[test]
fn independent_instructions_still_serialize() {
    let mut w = Window::new(IlpMode::Sequential);
    let tags: Vec<_> = (0..6).map(|i| w.push(ldimm(r64(i), u64::from(i)))).collect();

    let mut done = 0;
    while done < tags.len() {
        for &tag in &tags {
            let state = w.state(tag);
            if matches!(state, InstState::Waiting | InstState::Stall) {
                let _ = w.schedule(tag);
            }
        }
        let ready: Vec<_> = tags.iter().copied().filter(|t| w.is_ready(*t)).collect();
        assert_eq!(ready.len(), 1);
        w.execute(ready[0]);
        assert_eq!(w.executing(), 0);
        w.finish(ready[0]);
        done += 1;
    }
    for i in 0..6 {
        assert_eq!(w.regs.read_u64(r64(i)).unwrap(), u64::from(i));
    }
}

#[test]
fn commit_waits_for_the_occupant() {
    let mut w = Window::new(IlpMode::Sequential);
    let (a, _) = w.issue(add(r64(2), r64(0), r64(1)));
    let (c, ready) = w.issue(commit());
    assert!(!ready);
    w.complete(a);
    assert!(w.schedule(c));
}
