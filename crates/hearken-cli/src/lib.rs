//! Hearken CLI library
//!
//! Argument parsing, engine wiring and the individual commands behind the
//! `hearken` binary. Kept as a library so commands can be exercised from
//! integration tests without spawning a process.

pub mod cli;
pub mod commands;
pub mod engine;
pub mod output;
