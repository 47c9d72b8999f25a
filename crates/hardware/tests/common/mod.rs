//! Shared test infrastructure.

/// Decoded-instruction constructors.
pub mod builder;

/// Logging, configurations, and register shorthands.
pub mod harness;

/// Fault model mocks and test codelets.
pub mod mocks;
