//! Deterministic, pure logic shared by the runner core.
//!
//! Core modules must be free of I/O side effects. They operate on captured
//! tool output and return deterministic outcomes suitable for tests.

pub mod classifier;
pub mod outcome;
pub mod types;
