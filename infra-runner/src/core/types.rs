//! Shared deterministic types for the runner core.
//!
//! These types carry tool output between the invoker and the classifier. They
//! do no I/O and must behave identically across runs.

use serde::{Deserialize, Serialize};

/// Which mutating operation a run is driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Destroy,
}

impl Action {
    pub fn from_destroy_flag(destroy: bool) -> Self {
        if destroy {
            Action::Destroy
        } else {
            Action::Create
        }
    }

    pub fn is_destroy(self) -> bool {
        self == Action::Destroy
    }

    /// Operator-facing name of the action ("create" / "destroy").
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Destroy => "destroy",
        }
    }

    /// Terraform subcommand that performs the mutation.
    pub fn subcommand(self) -> &'static str {
        match self {
            Action::Create => "apply",
            Action::Destroy => "destroy",
        }
    }
}

/// Result of one Terraform process execution.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InvocationResult {
    /// Exit status. `None` when the process was killed by a signal or never ran.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl InvocationResult {
    /// Completed invocation with an exit status.
    pub fn exited(status: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            stdout: stdout.into(),
            stderr: stderr.into(),
            timed_out: false,
        }
    }

    /// Invocation that never produced an exit status (spawn failure and similar).
    ///
    /// The message becomes the captured stderr so it reaches the classifier and
    /// the diagnostic dump like any other tool output.
    pub fn not_run(message: impl Into<String>) -> Self {
        Self {
            status: None,
            stdout: String::new(),
            stderr: message.into(),
            timed_out: false,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == Some(0)
    }
}

/// Ordered lines captured from one logical operation.
///
/// Built once per invocation and read-only afterwards. A retry builds a new one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CapturedLog {
    lines: Vec<String>,
}

impl CapturedLog {
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Stdout lines followed by stderr lines.
    pub fn from_invocation(result: &InvocationResult) -> Self {
        Self::from_lines(result.stdout.lines().chain(result.stderr.lines()))
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captured_log_orders_stdout_before_stderr() {
        let result = InvocationResult::exited(1, "one\ntwo\n", "Error: three\n");
        let log = CapturedLog::from_invocation(&result);
        assert_eq!(log.lines(), ["one", "two", "Error: three"]);
    }

    #[test]
    fn not_run_has_no_status_and_keeps_message() {
        let result = InvocationResult::not_run("spawn terraform: No such file");
        assert_eq!(result.status, None);
        assert!(!result.succeeded());
        let log = CapturedLog::from_invocation(&result);
        assert_eq!(log.lines(), ["spawn terraform: No such file"]);
    }

    #[test]
    fn action_maps_to_subcommand() {
        assert_eq!(Action::from_destroy_flag(false).subcommand(), "apply");
        assert_eq!(Action::from_destroy_flag(true).subcommand(), "destroy");
        assert!(Action::Destroy.is_destroy());
    }
}
