//! # Unit Components
//!
//! Suites for the scheduling engine, grouped by the component they drive. Policy suites
//! step an ILP controller by hand; machine suites run whole programs on unit threads.

/// Configuration parsing, validation, and environment overrides.
pub mod config;

/// Duplication groups, consensus, and fault injection.
pub mod duplication;

/// Memory hazard tracker contract.
pub mod hazards;

/// ILP policies stepped by hand.
///
/// This module includes tests for:
/// - Sequential slot ownership.
/// - Superscalar reservations and memory range disjointness.
/// - Out-of-order renaming, continuation, and pool exhaustion.
pub mod ilp;

/// Whole programs on a running machine.
pub mod machine;

/// Statistics reporting.
pub mod stats;
