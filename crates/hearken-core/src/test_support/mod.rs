//! Test doubles shared by unit and integration tests
//!
//! Enabled for this crate's own tests and for dependents through the
//! `test-utils` feature.

pub mod mocks;

pub use mocks::{CallLog, MockCompiler, MockUnit};
