// Run report rendering.
//
// TTY -> one human-readable line. Piped/redirected -> one JSON object.
// `--json` forces JSON regardless of terminal.

use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::sequencer::Verdict;

const ANSI_RED: &str = "\x1b[31m";
const ANSI_GREEN: &str = "\x1b[32m";
const ANSI_RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    /// JSON if `--json` was passed or stdout is not a TTY.
    pub fn detect(json_flag: bool) -> Self {
        if json_flag {
            return Self::Json;
        }
        Self::detect_from_terminal(io::stdout().is_terminal())
    }

    /// Testable variant that takes an explicit `is_tty` flag.
    pub fn detect_from_terminal(is_tty: bool) -> Self {
        if is_tty {
            Self::Human
        } else {
            Self::Json
        }
    }
}

/// Outcome of one harness run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub server_url: String,
    pub verdict: Verdict,
    /// Steps that were started, including the one that ended the run.
    pub steps_run: usize,
    pub total_steps: usize,
    /// Name of the step that did not pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn human_line(&self, color: bool) -> String {
        let (label, paint) = match self.verdict {
            Verdict::Passed => ("PASSED", ANSI_GREEN),
            Verdict::Failed => ("FAILED", ANSI_RED),
            Verdict::TimedOut => ("TIMED OUT", ANSI_RED),
        };
        let label =
            if color { format!("{paint}{label}{ANSI_RESET}") } else { label.to_string() };

        let mut line = format!(
            "{label} {}/{} steps against {} in {}ms",
            self.steps_run, self.total_steps, self.server_url, self.elapsed_ms
        );
        if let Some(step) = &self.failed_step {
            line.push_str(&format!(" (stopped at {step})"));
        }
        line
    }
}

pub fn print_report(format: OutputFormat, report: &RunReport) -> io::Result<()> {
    let color = io::stdout().is_terminal();
    write_report(&mut io::stdout().lock(), format, report, color)
}

/// Write a report to a provided writer (useful for testing).
pub fn write_report<W: Write>(
    writer: &mut W,
    format: OutputFormat,
    report: &RunReport,
    color: bool,
) -> io::Result<()> {
    match format {
        OutputFormat::Human => writeln!(writer, "{}", report.human_line(color)),
        OutputFormat::Json => {
            serde_json::to_writer(&mut *writer, report).map_err(io::Error::other)?;
            writeln!(writer)
        }
    }
}

/// Write an error that prevented the run to stderr.
pub fn print_error(format: OutputFormat, error: &anyhow::Error) {
    let message = format!("{error:#}");
    let mut err = io::stderr().lock();
    match format {
        OutputFormat::Human => {
            let _ = if io::stderr().is_terminal() {
                writeln!(err, "{ANSI_RED}error:{ANSI_RESET} {message}")
            } else {
                writeln!(err, "error: {message}")
            };
        }
        OutputFormat::Json => {
            let obj = serde_json::json!({ "error": { "message": message } });
            let _ = serde_json::to_writer(&mut err, &obj);
            let _ = writeln!(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(verdict: Verdict, failed_step: Option<&str>) -> RunReport {
        let started_at = Utc::now();
        RunReport {
            run_id: Uuid::nil(),
            server_url: "https://127.0.0.1:9980".into(),
            verdict,
            steps_run: 6,
            total_steps: 10,
            failed_step: failed_step.map(str::to_owned),
            started_at,
            finished_at: started_at,
            elapsed_ms: 42,
        }
    }

    #[test]
    fn detect_tty_returns_human() {
        assert_eq!(OutputFormat::detect_from_terminal(true), OutputFormat::Human);
    }

    #[test]
    fn detect_pipe_returns_json() {
        assert_eq!(OutputFormat::detect_from_terminal(false), OutputFormat::Json);
    }

    #[test]
    fn detect_json_flag_overrides_tty() {
        assert_eq!(OutputFormat::detect(true), OutputFormat::Json);
    }

    #[test]
    fn human_line_names_stopping_step() {
        let mut buf = Vec::new();
        write_report(&mut buf, OutputFormat::Human, &report(Verdict::Failed, Some("users_count")), false)
            .unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "FAILED 6/10 steps against https://127.0.0.1:9980 in 42ms (stopped at users_count)\n"
        );
    }

    #[test]
    fn human_line_colors_only_on_request() {
        let passed = report(Verdict::Passed, None);
        assert!(passed.human_line(true).starts_with(ANSI_GREEN));
        assert!(passed.human_line(false).starts_with("PASSED"));
    }

    #[test]
    fn json_report_is_one_line() {
        let mut buf = Vec::new();
        write_report(&mut buf, OutputFormat::Json, &report(Verdict::TimedOut, Some("docs_count")), true)
            .unwrap();
        let output = String::from_utf8(buf).unwrap();
        assert_eq!(output.lines().count(), 1);

        let parsed: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(parsed["verdict"], "timed_out");
        assert_eq!(parsed["failed_step"], "docs_count");
        assert_eq!(parsed["steps_run"], 6);
    }

    #[test]
    fn passing_report_omits_failed_step() {
        let value = serde_json::to_value(report(Verdict::Passed, None)).unwrap();
        assert!(value.get("failed_step").is_none());
    }
}
