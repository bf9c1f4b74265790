use crate::error::DriverError;
use model::state::ExtractionState;
use std::{fmt, time::Duration};

/// Process exit status for a finished run, one per [`RunOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Done = 0,
    Aborted = 1,
    /// 128 + SIGINT, what a shell reports for an interrupted command.
    Cancelled = 130,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<RunOutcome> for ExitCode {
    fn from(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::Done => ExitCode::Done,
            RunOutcome::Aborted => ExitCode::Aborted,
            RunOutcome::Cancelled => ExitCode::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The stream ended and the final checkpoint was attempted.
    Done,
    /// A fatal condition stopped the run.
    Aborted,
    /// The host cancelled the run between pages.
    Cancelled,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Done => f.write_str("done"),
            RunOutcome::Aborted => f.write_str("aborted"),
            RunOutcome::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Summary of one driver run.
#[derive(Debug)]
pub struct RunReport {
    pub job_id: String,
    pub outcome: RunOutcome,
    pub pages_fetched: u64,
    pub pages_written: u64,
    pub checkpoints_saved: u64,
    pub sink_failures: u64,
    pub checkpoint_failures: u64,
    /// State as last known to the driver (not necessarily persisted).
    pub final_state: ExtractionState,
    pub error: Option<DriverError>,
    pub elapsed: Duration,
}

impl RunReport {
    pub(crate) fn new(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            outcome: RunOutcome::Done,
            pages_fetched: 0,
            pages_written: 0,
            checkpoints_saved: 0,
            sink_failures: 0,
            checkpoint_failures: 0,
            final_state: ExtractionState::fresh(),
            error: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Done
    }

    pub fn exit_code(&self) -> ExitCode {
        self.outcome.into()
    }

    /// `Err` for aborted runs, carrying the fatal error.
    pub fn into_result(mut self) -> Result<RunReport, DriverError> {
        match self.error.take() {
            Some(err) if self.outcome == RunOutcome::Aborted => Err(err),
            other => {
                self.error = other;
                Ok(self)
            }
        }
    }
}
