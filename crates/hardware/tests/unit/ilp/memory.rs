//! Memory range disjointness under the policies that overlap memory work.

use rstest::rstest;
use scmsim_core::config::IlpMode;
use scmsim_core::core::InstState;

use super::Window;
use crate::common::builder::{ldadr, stadr};
use crate::common::harness::l1;

#[rstest]
#[case::superscalar(IlpMode::Superscalar)]
#[case::out_of_order(IlpMode::OutOfOrder)]
fn load_overlapping_a_store_waits(#[case] mode: IlpMode) {
    let mut w = Window::new(mode);
    w.regs.write(l1(0), &[0xab; 64]).unwrap();

    let (store, ready_store) = w.issue(stadr(l1(0), 0));
    let (load, ready_load) = w.issue(ldadr(l1(1), 32));
    assert!(ready_store);
    assert!(!ready_load);
    assert_eq!(w.state(load), InstState::Stall);

    w.execute(store);
    assert!(!w.schedule(load));
    w.finish(store);
    assert!(w.schedule(load));
    w.complete(load);

    let loaded = w.regs.read(l1(1)).unwrap();
    assert_eq!(&loaded[..32], &[0xab; 32]);
    assert_eq!(&loaded[32..], &[0; 32]);
}

#[rstest]
#[case::superscalar(IlpMode::Superscalar)]
#[case::out_of_order(IlpMode::OutOfOrder)]
fn adjacent_ranges_do_not_conflict(#[case] mode: IlpMode) {
    let mut w = Window::new(mode);
    let (_, ready_store) = w.issue(stadr(l1(0), 0));
    let (_, ready_load) = w.issue(ldadr(l1(1), 64));
    assert!(ready_store && ready_load);
}

#[rstest]
#[case::superscalar(IlpMode::Superscalar)]
#[case::out_of_order(IlpMode::OutOfOrder)]
fn overlapping_loads_share_memory(#[case] mode: IlpMode) {
    let mut w = Window::new(mode);
    let (_, first) = w.issue(ldadr(l1(0), 0));
    let (_, second) = w.issue(ldadr(l1(1), 16));
    assert!(first && second);
}

#[rstest]
#[case::superscalar(IlpMode::Superscalar)]
#[case::out_of_order(IlpMode::OutOfOrder)]
fn overlapping_stores_serialize(#[case] mode: IlpMode) {
    let mut w = Window::new(mode);
    let (first, _) = w.issue(stadr(l1(0), 100));
    let (second, ready) = w.issue(stadr(l1(1), 120));
    assert!(!ready);
    w.complete(first);
    assert!(w.schedule(second));
}
