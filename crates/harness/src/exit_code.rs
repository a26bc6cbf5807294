// Process exit codes for adminprobe.
//
//   0 = every step passed
//   1 = a step failed
//   2 = usage/configuration error
//   3 = a step or the whole run timed out

use std::process;

use crate::config::ConfigError;
use crate::sequencer::Verdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Passed = 0,
    Failed = 1,
    Usage = 2,
    TimedOut = 3,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_verdict(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Passed => Self::Passed,
            Verdict::Failed => Self::Failed,
            Verdict::TimedOut => Self::TimedOut,
        }
    }

    /// Map an error that stopped the run before it started.
    pub fn from_error(err: &anyhow::Error) -> Self {
        if err.chain().any(|cause| cause.downcast_ref::<ConfigError>().is_some()) {
            Self::Usage
        } else {
            Self::Failed
        }
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code() as u8)
    }
}
