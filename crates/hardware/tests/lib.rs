//! # Hardware Testing Library
//!
//! Central entry point for the scheduling engine test suite. Unit-level suites drive the
//! ILP controllers, the duplication controller, and the hazard tracker directly; machine
//! suites run whole programs on real execution-unit threads.

/// Shared test infrastructure.
///
/// - **Harness**: Logging setup, small configurations, and register shorthands.
/// - **Builder**: Decoded-instruction constructors for policy-level tests.
/// - **Mocks**: A mockable fault model and test-only codelets.
pub mod common;

/// Unit and machine-level suites.
pub mod unit;
