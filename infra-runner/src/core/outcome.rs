//! Outcome taxonomy shared with the provisioning pipeline.
//!
//! Codes are published: downstream jobs persist them and branch on them. A code
//! is never renumbered or reused for a different meaning. `10002` is retired.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classified result of one Terraform invocation, or of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    PluginError,
    ApplyNotSpecified,
    UnknownResource,
    GenericFailure,
    /// No recognised marker in the log. Always a failure.
    Unclassified,
    RetryableError,
    VmCoreQuota,
}

impl Outcome {
    pub const ALL: [Outcome; 8] = [
        Outcome::Success,
        Outcome::PluginError,
        Outcome::ApplyNotSpecified,
        Outcome::UnknownResource,
        Outcome::GenericFailure,
        Outcome::Unclassified,
        Outcome::RetryableError,
        Outcome::VmCoreQuota,
    ];

    /// Stable external code reported to the pipeline.
    pub const fn code(self) -> u32 {
        match self {
            Outcome::Success => 10000,
            Outcome::PluginError => 10001,
            Outcome::ApplyNotSpecified => 10003,
            Outcome::UnknownResource => 10004,
            Outcome::GenericFailure => 10005,
            Outcome::Unclassified => 10006,
            Outcome::RetryableError => 10007,
            Outcome::VmCoreQuota => 10008,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::PluginError => "plugin configuration invalid",
            Outcome::ApplyNotSpecified => "apply not specified, no action taken",
            Outcome::UnknownResource => "unknown resource",
            Outcome::GenericFailure => "unhandled failure",
            Outcome::Unclassified => "unclassified output",
            Outcome::RetryableError => "retryable error",
            Outcome::VmCoreQuota => "VM core quota exceeded",
        }
    }

    pub const fn is_success(self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// Look up an outcome by its external code.
    pub fn from_code(code: u32) -> Option<Outcome> {
        Outcome::ALL.into_iter().find(|outcome| outcome.code() == code)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.code())
    }
}
