//! SimStats reporting tests.

use scmsim_core::SimStats;

#[test]
fn default_stats_all_zero() {
    let stats = SimStats::default();
    assert_eq!(stats.ticks, 0);
    assert_eq!(stats.retired, 0);
    assert_eq!(stats.dispatched, 0);
    assert_eq!(stats.overrides, 0);
    assert!(stats.retired_per_tick().abs() < f64::EPSILON);
}

#[test]
fn summary_lists_scheduler_and_resiliency_counters() {
    let mut stats = SimStats::default();
    stats.ticks = 10;
    stats.retired = 5;
    stats.renames = 3;
    stats.overrides = 1;
    let text = stats.summary();
    assert!(text.contains("sim_ipt                  0.5000"));
    assert!(text.contains("renames                3"));
    assert!(text.contains("votes.overridden       1"));
}

#[test]
fn json_report_has_every_counter() {
    let mut stats = SimStats::default();
    stats.max_in_flight = 4;
    let json = serde_json::to_value(&stats).unwrap();
    let object = json.as_object().unwrap();
    assert_eq!(object.len(), 14);
    assert_eq!(json["max_in_flight"], 4);
}
