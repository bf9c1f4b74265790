use serde::Deserialize;

/// What the driver does when a page or checkpoint write fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteFailurePolicy {
    /// Log a warning and keep extracting.
    #[default]
    Continue,
    /// Abort the job.
    Abort,
}

impl WriteFailurePolicy {
    pub fn is_fatal(self) -> bool {
        matches!(self, WriteFailurePolicy::Abort)
    }
}
