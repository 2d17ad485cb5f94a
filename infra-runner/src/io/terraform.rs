//! Terraform invocation abstraction.
//!
//! The [`Terraform`] trait decouples plan/apply orchestration from the actual
//! binary. Tests use a scripted implementation that returns predetermined
//! invocation results without spawning processes.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::types::{Action, InvocationResult};
use crate::io::config::RunnerConfig;
use crate::io::process::run_command;

const COMMON_ARGS: [&str; 2] = ["-input=false", "-no-color"];

/// One Terraform subcommand invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Init,
    Plan(Action),
    Apply,
    Destroy,
}

impl Step {
    /// The mutating step that carries out `action`.
    pub fn mutation(action: Action) -> Self {
        match action {
            Action::Create => Step::Apply,
            Action::Destroy => Step::Destroy,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Step::Init => "init",
            Step::Plan(_) => "plan",
            Step::Apply => "apply",
            Step::Destroy => "destroy",
        }
    }

    pub fn is_mutation(self) -> bool {
        matches!(self, Step::Apply | Step::Destroy)
    }

    /// Command-line arguments, subcommand first.
    pub fn args(self) -> Vec<&'static str> {
        let mut args = vec![self.name()];
        args.extend(COMMON_ARGS);
        match self {
            Step::Init => {}
            Step::Plan(action) => {
                // Exit 0 = no changes, 2 = changes pending, anything else = failure.
                args.push("-detailed-exitcode");
                if action.is_destroy() {
                    args.push("-destroy");
                }
            }
            Step::Apply | Step::Destroy => args.push("-auto-approve"),
        }
        args
    }
}

/// Abstraction over the Terraform process boundary.
pub trait Terraform {
    /// Run `step` in `workdir` and capture its status and output.
    ///
    /// `Err` means the step could not be run at all (spawn or wait failure).
    fn invoke(&self, step: Step, workdir: &Path) -> Result<InvocationResult>;
}

/// Run `step` and fold a collaborator failure into the captured output.
///
/// The error text lands on stderr of a result without exit status, so it is
/// classified and shown to the operator like any other tool output.
pub fn invoke_captured<T: Terraform + ?Sized>(
    tool: &T,
    step: Step,
    workdir: &Path,
) -> InvocationResult {
    match tool.invoke(step, workdir) {
        Ok(result) => result,
        Err(err) => {
            let message = format!("{err:#}");
            warn!(step = step.name(), err = %message, "terraform step did not run");
            InvocationResult::not_run(message)
        }
    }
}

/// Terraform driven through its command-line binary.
#[derive(Debug, Clone)]
pub struct TerraformCli {
    bin: PathBuf,
    timeout: Option<Duration>,
    output_limit_bytes: usize,
}

impl TerraformCli {
    pub fn new(bin: impl Into<PathBuf>, timeout: Option<Duration>, output_limit_bytes: usize) -> Self {
        Self {
            bin: bin.into(),
            timeout,
            output_limit_bytes,
        }
    }

    pub fn from_config(cfg: &RunnerConfig) -> Self {
        Self::new(&cfg.terraform_bin, cfg.timeout(), cfg.output_limit_bytes)
    }
}

impl Terraform for TerraformCli {
    #[instrument(skip_all, fields(step = step.name(), workdir = %workdir.display()))]
    fn invoke(&self, step: Step, workdir: &Path) -> Result<InvocationResult> {
        info!(bin = %self.bin.display(), "starting terraform");
        let mut cmd = Command::new(&self.bin);
        cmd.args(step.args()).current_dir(workdir);

        let output = run_command(cmd, self.timeout, self.output_limit_bytes).with_context(|| {
            format!("run {} {}", self.bin.display(), step.name())
        })?;

        let label = format!("terraform {}", step.name());
        let status = output.status.code();
        let stdout = output.stdout.into_text(&format!("{label} stdout"));
        let mut stderr = output.stderr.into_text(&format!("{label} stderr"));

        if output.timed_out {
            let secs = self.timeout.map(|t| t.as_secs()).unwrap_or_default();
            warn!(timeout_secs = secs, "terraform step timed out");
            stderr.push_str(&format!("\n[{label} timed out after {secs}s]\n"));
        }

        debug!(exit_code = ?status, "terraform step finished");
        Ok(InvocationResult {
            status,
            stdout,
            stderr,
            timed_out: output.timed_out,
        })
    }
}
