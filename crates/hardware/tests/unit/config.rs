//! # Configuration Tests
//!
//! Defaults, JSON loading, validation, and the `SCM_*` environment overrides.

use std::collections::HashMap;
use std::io::Write;

use pretty_assertions::assert_eq;
use scmsim_core::SimError;
use scmsim_core::common::SizeClass;
use scmsim_core::config::*;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn defaults_describe_the_reference_machine() {
    let config = Config::default();
    assert_eq!(config.general.ilp_mode, IlpMode::OutOfOrder);
    assert_eq!(config.general.execution_units, 8);
    assert_eq!(config.general.buffer_size, 128);
    assert_eq!(config.general.max_ticks, None);
    assert_eq!(config.resiliency.duplication, DuplicationMode::NoDuplication);
    assert_eq!(config.resiliency.max_copies, 10);
    assert_eq!(config.registers.architectural.count(SizeClass::B64), 160);
    assert_eq!(config.registers.rename.count(SizeClass::L2048), 8);
    config.validate().unwrap();
}

#[test]
fn partial_json_keeps_defaults() {
    let config = Config::from_json(
        r#"{
            "general": { "ilp_mode": "OoO", "execution_units": 2 },
            "registers": { "architectural": { "64B": 4 } },
            "resiliency": { "duplication": "ThreeOutOfFive", "comparison": "FailedFlag" }
        }"#,
    )
    .unwrap();
    assert_eq!(config.general.ilp_mode, IlpMode::OutOfOrder);
    assert_eq!(config.general.execution_units, 2);
    assert_eq!(config.general.fetch_width, 2);
    assert_eq!(config.registers.architectural.count(SizeClass::B64), 4);
    assert_eq!(config.registers.architectural.count(SizeClass::L1), 0);
    assert_eq!(config.registers.duplicate.count(SizeClass::B64), 32);
    assert_eq!(config.resiliency.duplication, DuplicationMode::ThreeOutOfFive);
    assert_eq!(config.resiliency.comparison, ComparisonMode::FailedFlag);
}

#[test]
fn loads_from_a_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "general": {{ "ilp_mode": "Sequential", "max_ticks": 500 }} }}"#).unwrap();
    let config = Config::from_json_file(file.path()).unwrap();
    assert_eq!(config.general.ilp_mode, IlpMode::Sequential);
    assert_eq!(config.general.max_ticks, Some(500));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = Config::from_json_file(dir.path().join("absent.json"));
    assert!(matches!(result, Err(SimError::Io(_))));
}

#[test]
fn malformed_json_is_a_parse_error() {
    assert!(matches!(
        Config::from_json(r#"{ "general": { "ilp_mode": "Speculative" } }"#),
        Err(SimError::ConfigParse(_))
    ));
}

#[test]
fn validation_rejects_unusable_machines() {
    let mut config = Config::default();
    config.general.execution_units = 0;
    assert!(matches!(config.validate(), Err(SimError::Config(_))));

    let mut config = Config::default();
    config.resiliency.max_copies = 2;
    assert!(matches!(config.validate(), Err(SimError::Config(_))));

    let mut config = Config::default();
    config.resiliency.lambda = f64::NAN;
    assert!(matches!(config.validate(), Err(SimError::Config(_))));
}

#[test]
fn environment_overrides_resiliency() {
    let mut config = Config::default();
    config
        .apply_env_overrides(lookup(&[
            (ENV_DUPLICATION_MODE, "ADAPTIVE_DUPLICATION"),
            (ENV_FAULT_INJECTION_MODE, "WEIBULL_FAULT_INJECTION"),
            (ENV_LAMBDA, " 0.25 "),
            (ENV_WEIBULL_BETA, "1.5"),
        ]))
        .unwrap();
    assert_eq!(config.resiliency.duplication, DuplicationMode::Adaptive);
    assert_eq!(config.resiliency.fault_injection, FaultInjectionMode::Weibull);
    assert!((config.resiliency.lambda - 0.25).abs() < f64::EPSILON);
    assert!((config.resiliency.beta - 1.5).abs() < f64::EPSILON);
}

#[test]
fn unknown_environment_value_names_the_variable() {
    let mut config = Config::default();
    let err = config
        .apply_env_overrides(lookup(&[(ENV_DUPLICATION_MODE, "SOMETIMES")]))
        .unwrap_err();
    assert!(err.to_string().contains(ENV_DUPLICATION_MODE));
    assert_eq!(config.resiliency.duplication, DuplicationMode::NoDuplication);
}

#[test]
fn duplication_modes_spawn_their_clones() {
    assert_eq!(DuplicationMode::NoDuplication.initial_clones(), 0);
    assert_eq!(DuplicationMode::TwoOutOfThree.initial_clones(), 2);
    assert_eq!(DuplicationMode::ThreeOutOfFive.initial_clones(), 4);
    assert_eq!(DuplicationMode::Adaptive.initial_clones(), 0);
}
