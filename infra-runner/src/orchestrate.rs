//! Orchestration for one plan → apply/destroy run.
//!
//! The sequence is: plan once, stop if the plan failed or found nothing to
//! do, stop if apply was not requested, pause before a destroy, then run the
//! mutating step with a bounded retry on transient failures.

use std::io::Write;
use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::classifier::Classifier;
use crate::core::outcome::Outcome;
use crate::core::types::{Action, CapturedLog};
use crate::io::config::RunnerConfig;
use crate::io::terraform::{Step, Terraform, invoke_captured};
use crate::plan::{PlanVerdict, evaluate_plan};
use crate::report::{say, write_outcome, write_review};

/// Total mutating attempts, the first one included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Last-chance window before an irreversible destroy.
pub const DEFAULT_DESTROY_DELAY: Duration = Duration::from_secs(30);

/// Tunables for a run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub max_attempts: u32,
    pub destroy_delay: Duration,
    pub classifier: Classifier,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            destroy_delay: DEFAULT_DESTROY_DELAY,
            classifier: Classifier::default(),
        }
    }
}

impl Settings {
    pub fn from_config(cfg: &RunnerConfig) -> Result<Self> {
        Ok(Self {
            max_attempts: cfg.max_attempts,
            destroy_delay: cfg.destroy_delay(),
            classifier: cfg.classifier()?,
        })
    }
}

/// Attempt bookkeeping for the mutating step. Attempts count from one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RetryState {
    attempt: u32,
    max_attempts: u32,
}

impl RetryState {
    fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 1,
            max_attempts: max_attempts.max(1),
        }
    }

    fn should_retry(&self, outcome: Outcome) -> bool {
        outcome == Outcome::RetryableError && self.attempt < self.max_attempts
    }

    fn advance(&mut self) {
        self.attempt += 1;
    }
}

/// Drives Terraform through one run against one working directory.
///
/// The caller must not point two runs at the same directory concurrently.
#[derive(Debug)]
pub struct Orchestrator<T> {
    tool: T,
    settings: Settings,
}

impl<T: Terraform> Orchestrator<T> {
    pub fn new(tool: T, settings: Settings) -> Self {
        Self { tool, settings }
    }

    pub fn tool(&self) -> &T {
        &self.tool
    }

    /// Run `terraform init` in `workdir`.
    ///
    /// Returns `Success` when init exits zero; otherwise the classified failure,
    /// after printing the diagnostic.
    #[instrument(skip_all, fields(workdir = %workdir.display()))]
    pub fn init<W: Write>(&self, workdir: &Path, action: Action, out: &mut W) -> Result<Outcome> {
        let result = invoke_captured(&self.tool, Step::Init, workdir);
        if result.succeeded() {
            info!("terraform init succeeded");
            return Ok(Outcome::Success);
        }
        let log = CapturedLog::from_invocation(&result);
        let review = self.settings.classifier.review(&log, action);
        let outcome = match review.outcome {
            Outcome::Success => Outcome::GenericFailure,
            other => other,
        };
        write_outcome(out, &log, outcome, review.matched_line)?;
        say(out, format!("Init failed with error {}", outcome.code()))?;
        warn!(status = ?result.status, outcome = ?outcome, "terraform init failed");
        Ok(outcome)
    }

    /// Plan, then apply or destroy when there is something to do and it was asked for.
    ///
    /// The returned outcome is the plan's failure, `Success` for an empty plan,
    /// `ApplyNotSpecified` for a preview, or the outcome of the last mutating
    /// attempt. `Err` only means operator output could not be written.
    #[instrument(skip_all, fields(action = action.as_str(), apply_requested = apply_requested, workdir = %workdir.display()))]
    pub fn run<W: Write>(
        &self,
        workdir: &Path,
        action: Action,
        apply_requested: bool,
        out: &mut W,
    ) -> Result<Outcome> {
        let verdict = evaluate_plan(
            &self.tool,
            &self.settings.classifier,
            workdir,
            action,
            out,
        )?;

        match verdict {
            PlanVerdict::Failed(outcome) => return Ok(outcome),
            PlanVerdict::NoChanges => {
                say(out, "Plan determined that no action was needed. Skipping apply")?;
                return Ok(Outcome::Success);
            }
            PlanVerdict::ChangesPending => {}
        }

        if !apply_requested {
            say(out, "Argument --apply not specified. No action taken")?;
            return Ok(Outcome::ApplyNotSpecified);
        }

        if action.is_destroy() {
            let delay = self.settings.destroy_delay;
            say(
                out,
                format!(
                    "Pausing for {} seconds before destroying existing infrastructure.",
                    delay.as_secs()
                ),
            )?;
            thread::sleep(delay);
        }

        say(
            out,
            format!(
                "Starting terraform {}. There will be little to no output for the next 15 - 20+ minutes.",
                action.as_str()
            ),
        )?;
        self.execute_with_retry(workdir, action, out)
    }

    /// Run the mutating step, retrying only transient failures.
    fn execute_with_retry<W: Write>(
        &self,
        workdir: &Path,
        action: Action,
        out: &mut W,
    ) -> Result<Outcome> {
        let step = Step::mutation(action);
        let mut retry = RetryState::new(self.settings.max_attempts);
        loop {
            say(
                out,
                format!("Terraform {} attempt {} starting", step.name(), retry.attempt),
            )?;
            let result = invoke_captured(&self.tool, step, workdir);
            let log = CapturedLog::from_invocation(&result);
            let review = self.settings.classifier.review(&log, action);
            write_review(out, &log, &review)?;
            info!(
                attempt = retry.attempt,
                status = ?result.status,
                outcome = ?review.outcome,
                "mutating attempt finished"
            );

            if !retry.should_retry(review.outcome) {
                if review.outcome == Outcome::RetryableError {
                    warn!(attempts = retry.attempt, "retry budget exhausted");
                }
                return Ok(review.outcome);
            }
            retry.advance();
        }
    }
}
