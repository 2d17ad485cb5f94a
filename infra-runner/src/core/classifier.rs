//! Deterministic classification of captured Terraform logs.
//!
//! The most recent lines decide the result, so the log is scanned from the end
//! and the first matching line wins. Scanning forward picks a different line
//! whenever a log holds more than one marker.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::{Regex, RegexSet};

use crate::core::outcome::Outcome;
use crate::core::types::{Action, CapturedLog};

/// Signatures of transient provider failures.
pub const DEFAULT_RETRYABLE_PATTERNS: &[&str] =
    &["RetryableError", r"context\s+deadline\s+exceeded"];

const ERROR_PREFIX: &str = "Error:";
const APPLY_COMPLETE: &str = "Apply complete!";
const DESTROY_COMPLETE: [&str; 2] = ["Destroy complete!", "Destruction complete"];
const SEPARATOR: &str = "------------------------------------------------------";

static PLUGIN_REQUIREMENTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"error\s+satisfying\s+plugin\s+requirements").unwrap());
static CORE_QUOTA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"exceeding\s+approved\s+Total\s+Regional\s+Cores\s+quota").unwrap()
});
static UNKNOWN_RESOURCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"unknown\s+resource").unwrap());
static REFRESHING_STATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Refreshing\s+state").unwrap());

/// Outcome of a review plus the line that decided it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Review<'a> {
    pub outcome: Outcome,
    /// `None` when nothing matched and the outcome is `Unclassified`.
    pub matched_line: Option<&'a str>,
}

/// Log classifier with a configurable set of retryable signatures.
#[derive(Debug, Clone)]
pub struct Classifier {
    retryable: RegexSet,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            retryable: RegexSet::new(DEFAULT_RETRYABLE_PATTERNS).unwrap(),
        }
    }
}

impl Classifier {
    /// Build a classifier from retryable regex patterns (unanchored search).
    pub fn new<I, S>(retryable_patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let retryable =
            RegexSet::new(retryable_patterns).context("compile retryable error patterns")?;
        Ok(Self { retryable })
    }

    pub fn classify(&self, log: &CapturedLog, action: Action) -> Outcome {
        self.review(log, action).outcome
    }

    /// Scan `log` backwards and stop at the first line that matches a rule.
    ///
    /// Per line the rules apply in order: success marker for `action`,
    /// retryable signature, then an `Error:` line refined by sub-pattern.
    pub fn review<'a>(&self, log: &'a CapturedLog, action: Action) -> Review<'a> {
        for line in log.lines().iter().rev() {
            if let Some(outcome) = self.classify_line(line, action) {
                return Review {
                    outcome,
                    matched_line: Some(line.as_str()),
                };
            }
        }
        Review {
            outcome: Outcome::Unclassified,
            matched_line: None,
        }
    }

    fn classify_line(&self, line: &str, action: Action) -> Option<Outcome> {
        if is_success_marker(line, action) {
            return Some(Outcome::Success);
        }
        if self.retryable.is_match(line) {
            return Some(Outcome::RetryableError);
        }
        if line.starts_with(ERROR_PREFIX) {
            return Some(classify_error_line(line));
        }
        None
    }
}

fn is_success_marker(line: &str, action: Action) -> bool {
    match action {
        Action::Create => line.starts_with(APPLY_COMPLETE),
        Action::Destroy => DESTROY_COMPLETE
            .iter()
            .any(|marker| line.starts_with(marker)),
    }
}

fn classify_error_line(line: &str) -> Outcome {
    if PLUGIN_REQUIREMENTS_RE.is_match(line) {
        Outcome::PluginError
    } else if CORE_QUOTA_RE.is_match(line) {
        Outcome::VmCoreQuota
    } else if UNKNOWN_RESOURCE_RE.is_match(line) {
        Outcome::UnknownResource
    } else {
        Outcome::GenericFailure
    }
}

/// Whether a trimmed line is worth showing to an operator.
pub fn is_signal_line(line: &str) -> bool {
    !line.is_empty() && !REFRESHING_STATE_RE.is_match(line)
}

/// One-line operator summary for a non-success outcome.
pub fn headline(outcome: Outcome) -> Option<String> {
    let code = outcome.code();
    let text = match outcome {
        Outcome::Success | Outcome::ApplyNotSpecified => return None,
        Outcome::PluginError => format!("Terraform plugin configuration invalid {code}"),
        Outcome::VmCoreQuota => {
            format!("VM core quota exceeded. A quota increase request is required. {code}")
        }
        Outcome::UnknownResource => format!("Terraform unknown resource error {code}"),
        Outcome::GenericFailure => format!("Terraform unhandled exception {code}"),
        Outcome::RetryableError => format!("Terraform reported a retryable error {code}"),
        Outcome::Unclassified => {
            format!("Terraform output did not match any known pattern {code}")
        }
    };
    Some(text)
}

/// Render the full log for an operator, forward order, noise removed.
pub fn render_diagnostic(log: &CapturedLog) -> String {
    let mut buf = String::new();
    buf.push('\n');
    buf.push_str("An execution error occurred. Detailed output:\n");
    buf.push_str(SEPARATOR);
    buf.push('\n');
    for line in log.lines().iter().map(|line| line.trim()) {
        if is_signal_line(line) {
            buf.push_str(line);
            buf.push('\n');
        }
    }
    buf.push_str(SEPARATOR);
    buf.push('\n');
    buf
}
