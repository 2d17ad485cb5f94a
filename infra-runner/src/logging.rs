//! Tracing setup for the runner.
//!
//! Tracing is diagnostics on stderr. The pipeline-facing output (plan summary,
//! attempt notices, diagnostic dumps, the final code) goes through `report` to
//! stdout and is never filtered.

use std::env;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter directives read before falling back to `RUST_LOG`.
pub const LOG_ENV: &str = "INFRA_RUNNER_LOG";

/// Step starts, timeouts and retries from this crate; only warnings from
/// everything else.
pub const DEFAULT_FILTER: &str = "warn,infra_runner=info";

/// Install the stderr subscriber.
///
/// ```bash
/// INFRA_RUNNER_LOG=infra_runner=debug infra-runner --apply
/// ```
pub fn init() {
    let directives = env::var(LOG_ENV)
        .or_else(|_| env::var(EnvFilter::DEFAULT_ENV))
        .ok();

    tracing_subscriber::registry()
        .with(filter_for(directives.as_deref()))
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

/// Blank or unparsable directives fall back to [`DEFAULT_FILTER`] so a typo
/// never silences the run.
fn filter_for(directives: Option<&str>) -> EnvFilter {
    directives
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn default_filter_reports_runner_info() {
        assert_eq!(filter_for(None).max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn operator_directives_win() {
        assert_eq!(
            filter_for(Some("infra_runner=debug")).max_level_hint(),
            Some(LevelFilter::DEBUG)
        );
    }

    #[test]
    fn blank_or_invalid_directives_use_default() {
        for directives in ["", "   ", "infra_runner=loud"] {
            assert_eq!(
                filter_for(Some(directives)).max_level_hint(),
                Some(LevelFilter::INFO),
                "directives {directives:?}"
            );
        }
    }
}
