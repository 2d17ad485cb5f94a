//! Operator-facing output for classified invocations.
//!
//! Everything here is product output written to the caller's writer (stdout in
//! the CLI). Developer diagnostics go through `tracing` instead.

use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::classifier::{Review, headline, render_diagnostic};
use crate::core::outcome::Outcome;
use crate::core::types::CapturedLog;

/// Write what an operator needs to see for one classified invocation.
///
/// Success echoes the completion line. Anything else gets a headline, when the
/// outcome has one, and the full filtered log.
pub fn write_review<W: Write>(out: &mut W, log: &CapturedLog, review: &Review<'_>) -> Result<()> {
    write_outcome(out, log, review.outcome, review.matched_line)
}

pub fn write_outcome<W: Write>(
    out: &mut W,
    log: &CapturedLog,
    outcome: Outcome,
    matched_line: Option<&str>,
) -> Result<()> {
    if outcome.is_success() {
        if let Some(line) = matched_line {
            writeln!(out, "{line}").context("write operator output")?;
        }
        out.flush().context("flush operator output")?;
        return Ok(());
    }
    if let Some(text) = headline(outcome) {
        writeln!(out, "{text}").context("write operator output")?;
    }
    out.write_all(render_diagnostic(log).as_bytes())
        .context("write operator output")?;
    out.flush().context("flush operator output")?;
    Ok(())
}

/// Machine-readable summary of a finished run, printed with `--json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeReport {
    pub outcome: Outcome,
    pub code: u32,
    pub label: &'static str,
}

impl From<Outcome> for OutcomeReport {
    fn from(outcome: Outcome) -> Self {
        Self {
            outcome,
            code: outcome.code(),
            label: outcome.label(),
        }
    }
}

/// Write one operator line and flush, so progress shows during long steps.
pub fn say<W: Write>(out: &mut W, line: impl AsRef<str>) -> Result<()> {
    writeln!(out, "{}", line.as_ref()).context("write operator output")?;
    out.flush().context("flush operator output")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classifier::Classifier;
    use crate::core::types::Action;

    fn render(lines: &[&str]) -> String {
        let log = CapturedLog::from_lines(lines.iter().copied());
        let review = Classifier::default().review(&log, Action::Create);
        let mut out = Vec::new();
        write_review(&mut out, &log, &review).expect("write");
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn outcome_report_serializes_code_and_label() {
        let json = serde_json::to_value(OutcomeReport::from(Outcome::RetryableError))
            .expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "outcome": "retryable_error",
                "code": 10007,
                "label": "retryable error",
            })
        );
    }

    #[test]
    fn success_echoes_completion_line_only() {
        let text = render(&["noise", "Apply complete! Resources: 1 added, 0 changed, 0 destroyed."]);
        assert_eq!(
            text,
            "Apply complete! Resources: 1 added, 0 changed, 0 destroyed.\n"
        );
    }

    /// Holds writes back until `flush`.
    #[derive(Default)]
    struct BufferedSink {
        pending: Vec<u8>,
        flushed: Vec<u8>,
    }

    impl Write for BufferedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.pending.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.append(&mut self.pending);
            Ok(())
        }
    }

    #[test]
    fn every_outcome_leaves_output_flushed() {
        let log = CapturedLog::from_lines(["Apply complete! Resources: 1 added."]);
        for outcome in Outcome::ALL {
            let mut sink = BufferedSink::default();
            write_outcome(&mut sink, &log, outcome, log.lines().first().map(String::as_str))
                .expect("write");
            assert!(sink.pending.is_empty(), "{outcome:?} left output unflushed");
            assert!(!sink.flushed.is_empty(), "{outcome:?} wrote nothing");
        }
    }

    #[test]
    fn failure_prints_headline_and_dump() {
        let text = render(&["Refreshing state...", "Error: unknown resource azurerm_x"]);
        assert!(text.starts_with("Terraform unknown resource error 10004\n"));
        assert!(text.contains("Error: unknown resource azurerm_x"));
        assert!(!text.contains("Refreshing state"));
    }

    #[test]
    fn unclassified_still_dumps_every_line() {
        let text = render(&["panic: runtime error", "goroutine 1 [running]:"]);
        assert!(text.contains("did not match any known pattern 10006"));
        assert!(text.contains("panic: runtime error\n"));
        assert!(text.contains("goroutine 1 [running]:\n"));
    }
}
