//! Terraform plan/apply driver with classified, machine-readable outcomes.
//!
//! A run plans once, decides whether there is anything to do, applies or
//! destroys with a bounded retry on transient failures, and reduces the
//! tool's free-form log to one [`core::outcome::Outcome`]. The architecture
//! keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (taxonomy, log classification).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (config file, process execution).
//!   Isolated behind the [`io::terraform::Terraform`] trait for tests.
//!
//! Orchestration modules ([`plan`], [`orchestrate`]) coordinate core logic
//! with I/O; [`report`] renders operator output.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod orchestrate;
pub mod plan;
pub mod report;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
