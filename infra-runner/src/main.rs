//! Terraform plan/apply driver for the provisioning pipeline.
//!
//! Runs `terraform init` and `plan` in the working directory, then `apply` or
//! `destroy` when `--apply` is given, and prints one outcome code the pipeline
//! can branch on. Exit status is 0 only for `Success`.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use infra_runner::core::outcome::Outcome;
use infra_runner::core::types::Action;
use infra_runner::exit_codes;
use infra_runner::io::config::{DEFAULT_CONFIG_FILE, RunnerConfig, load_config};
use infra_runner::io::terraform::TerraformCli;
use infra_runner::logging;
use infra_runner::orchestrate::{Orchestrator, Settings};
use infra_runner::report::{OutcomeReport, say};
use tracing::debug;

#[derive(Debug, Parser)]
#[command(
    name = "infra-runner",
    version,
    about = "Plan and apply/destroy Terraform with classified outcome codes"
)]
struct Cli {
    /// Execute a destroy action.
    #[arg(long)]
    destroy: bool,
    /// Actually do the work. Without it only the plan runs.
    #[arg(long)]
    apply: bool,
    /// Directory holding the Terraform configuration.
    #[arg(long, value_name = "DIR", default_value = "modules")]
    chdir: PathBuf,
    /// Config file. Defaults to `infra-runner.toml` in the current directory.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Do not run `terraform init` before planning.
    #[arg(long)]
    skip_init: bool,
    /// Also print the outcome as a JSON object.
    #[arg(long)]
    json: bool,
    /// Override `terraform_bin`.
    #[arg(long, value_name = "PATH")]
    terraform_bin: Option<PathBuf>,
    /// Override `max_attempts`.
    #[arg(long)]
    max_attempts: Option<u32>,
    /// Override `destroy_delay_secs`.
    #[arg(long)]
    destroy_delay_secs: Option<u64>,
    /// Override `timeout_secs`.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl Cli {
    fn apply_overrides(&self, cfg: &mut RunnerConfig) {
        if let Some(bin) = &self.terraform_bin {
            cfg.terraform_bin = bin.clone();
        }
        if let Some(max_attempts) = self.max_attempts {
            cfg.max_attempts = max_attempts;
        }
        if let Some(delay) = self.destroy_delay_secs {
            cfg.destroy_delay_secs = delay;
        }
        if let Some(timeout) = self.timeout_secs {
            cfg.timeout_secs = Some(timeout);
        }
    }
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(outcome) if outcome.is_success() => std::process::exit(exit_codes::OK),
        Ok(_) => std::process::exit(exit_codes::FAILED),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: &Cli) -> Result<Outcome> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let mut cfg = load_config(&config_path)?;
    cli.apply_overrides(&mut cfg);
    cfg.validate().context("validate command-line overrides")?;
    debug!(?cfg, config = %config_path.display(), "config loaded");

    if !cli.chdir.is_dir() {
        bail!("working directory {} does not exist", cli.chdir.display());
    }

    let action = Action::from_destroy_flag(cli.destroy);
    let orchestrator = Orchestrator::new(
        TerraformCli::from_config(&cfg),
        Settings::from_config(&cfg)?,
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let outcome = if cli.skip_init {
        Outcome::Success
    } else {
        orchestrator.init(&cli.chdir, action, &mut out)?
    };
    let outcome = if outcome.is_success() {
        orchestrator.run(&cli.chdir, action, cli.apply, &mut out)?
    } else {
        outcome
    };

    say(&mut out, format!("Infra service returned {}", outcome.code()))?;
    if cli.json {
        let payload =
            serde_json::to_string(&OutcomeReport::from(outcome)).context("serialize outcome")?;
        writeln!(out, "{payload}").context("write outcome json")?;
    }
    Ok(outcome)
}
