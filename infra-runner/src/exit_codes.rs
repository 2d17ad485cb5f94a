//! Stable process exit codes for the `infra-runner` CLI.
//!
//! The pipeline reads the outcome code from stdout; the exit status only says
//! whether the run succeeded.

/// The run finished with `Outcome::Success`.
pub const OK: i32 = 0;
/// The run finished with any other outcome.
pub const FAILED: i32 = 1;
/// The run could not start (invalid config, missing working directory).
pub const INVALID: i32 = 2;
