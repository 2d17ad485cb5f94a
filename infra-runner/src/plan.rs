//! Plan evaluation: run `terraform plan` once and decide whether to proceed.

use std::io::Write;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use tracing::{debug, info, instrument};

use crate::core::classifier::{Classifier, is_signal_line};
use crate::core::outcome::Outcome;
use crate::core::types::{Action, CapturedLog, InvocationResult};
use crate::io::terraform::{Step, Terraform, invoke_captured};
use crate::report::{say, write_outcome};

/// Plan statuses under `-detailed-exitcode`: no changes, changes pending.
const PLAN_OK_STATUSES: [i32; 2] = [0, 2];
const PLAN_NO_CHANGES_STATUS: i32 = 0;

static NO_CHANGES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"No changes\.\s+(?:Infrastructure is up-to-date|Your infrastructure matches the configuration|No objects need to be destroyed)",
    )
    .unwrap()
});

/// What the plan step means for the mutating step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanVerdict {
    /// The plan itself failed; never retried.
    Failed(Outcome),
    /// Nothing to do. The run succeeds without applying.
    NoChanges,
    ChangesPending,
}

impl PlanVerdict {
    pub fn proceed(self) -> bool {
        self == PlanVerdict::ChangesPending
    }

    pub fn outcome(self) -> Outcome {
        match self {
            PlanVerdict::Failed(outcome) => outcome,
            PlanVerdict::NoChanges | PlanVerdict::ChangesPending => Outcome::Success,
        }
    }
}

/// Facts derived from one plan execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub succeeded: bool,
    pub changes_required: bool,
    /// Lines to show the operator, in plan order.
    pub echo_lines: Vec<String>,
}

impl PlanSummary {
    /// Derive the summary from a plan result.
    ///
    /// Exit status 0 means no changes whatever the wording; the no-changes
    /// sentence is a second signal for wrappers that flatten the status to 2.
    /// The `Plan:` line is always echoed. For a destroy every other signal line
    /// is echoed too, so the operator sees exactly what will be removed.
    pub fn from_invocation(result: &InvocationResult, action: Action) -> Self {
        let succeeded = result
            .status
            .is_some_and(|status| PLAN_OK_STATUSES.contains(&status));
        let mut changes_required = result.status != Some(PLAN_NO_CHANGES_STATUS);
        let mut echo_lines = Vec::new();
        if succeeded {
            for line in result.stdout.lines().map(str::trim) {
                if !is_signal_line(line) {
                    continue;
                }
                if line.contains("Plan:") {
                    echo_lines.push(line.to_string());
                } else if NO_CHANGES_RE.is_match(line) {
                    changes_required = false;
                } else if action.is_destroy() {
                    echo_lines.push(line.to_string());
                }
            }
        }
        Self {
            succeeded,
            changes_required,
            echo_lines,
        }
    }
}

/// Run the plan step once in `workdir` and evaluate it.
///
/// A failed plan is classified from its own log and reported in full. `Err`
/// only means operator output could not be written.
#[instrument(skip_all, fields(action = action.as_str(), workdir = %workdir.display()))]
pub fn evaluate_plan<T: Terraform + ?Sized, W: Write>(
    tool: &T,
    classifier: &Classifier,
    workdir: &Path,
    action: Action,
    out: &mut W,
) -> Result<PlanVerdict> {
    say(out, format!("Executing terraform {} plan", action.as_str()))?;
    let result = invoke_captured(tool, Step::Plan(action), workdir);
    let summary = PlanSummary::from_invocation(&result, action);

    if !summary.succeeded {
        let log = CapturedLog::from_invocation(&result);
        let review = classifier.review(&log, action);
        // The process status already says the plan failed.
        let outcome = match review.outcome {
            Outcome::Success => Outcome::GenericFailure,
            other => other,
        };
        write_outcome(out, &log, outcome, review.matched_line)?;
        say(out, format!("Plan failed with error {}", outcome.code()))?;
        info!(status = ?result.status, outcome = ?outcome, "plan failed");
        return Ok(PlanVerdict::Failed(outcome));
    }

    for line in &summary.echo_lines {
        say(out, line)?;
    }
    let verdict = if summary.changes_required {
        PlanVerdict::ChangesPending
    } else {
        PlanVerdict::NoChanges
    };
    debug!(verdict = ?verdict, "plan evaluated");
    Ok(verdict)
}
