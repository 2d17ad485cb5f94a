//! Runner configuration stored in `infra-runner.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::classifier::{Classifier, DEFAULT_RETRYABLE_PATTERNS};

pub const DEFAULT_CONFIG_FILE: &str = "infra-runner.toml";

/// Runner configuration (TOML).
///
/// Edited by humans and read by automation. Missing fields fall back to the
/// values the pipeline has always used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunnerConfig {
    /// Terraform binary to invoke (looked up on `PATH` when not absolute).
    pub terraform_bin: PathBuf,

    /// Total apply/destroy attempts, the first one included.
    pub max_attempts: u32,

    /// Pause before a destroy starts, in seconds.
    pub destroy_delay_secs: u64,

    /// Kill a Terraform step after this many seconds. Unset means no limit.
    pub timeout_secs: Option<u64>,

    /// Keep only the last this-many bytes of each captured stream.
    pub output_limit_bytes: usize,

    /// Regexes searched anywhere in a line to detect transient failures.
    pub retryable_patterns: Vec<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            terraform_bin: PathBuf::from("terraform"),
            max_attempts: 3,
            destroy_delay_secs: 30,
            timeout_secs: None,
            output_limit_bytes: 10_000_000,
            retryable_patterns: DEFAULT_RETRYABLE_PATTERNS
                .iter()
                .map(|pattern| pattern.to_string())
                .collect(),
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.terraform_bin.as_os_str().is_empty() {
            return Err(anyhow!("terraform_bin must not be empty"));
        }
        if self.max_attempts == 0 {
            return Err(anyhow!("max_attempts must be > 0"));
        }
        if self.timeout_secs == Some(0) {
            return Err(anyhow!("timeout_secs must be > 0 when set"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        self.classifier()?;
        Ok(())
    }

    pub fn classifier(&self) -> Result<Classifier> {
        Classifier::new(&self.retryable_patterns)
    }

    pub fn destroy_delay(&self) -> Duration {
        Duration::from_secs(self.destroy_delay_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RunnerConfig::default()`.
pub fn load_config(path: &Path) -> Result<RunnerConfig> {
    if !path.exists() {
        let cfg = RunnerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RunnerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}
