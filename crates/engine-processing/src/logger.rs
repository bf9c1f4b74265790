use std::{fmt::Display, sync::Arc};
use tracing::{Span, error, info, info_span, warn};
use tracing_subscriber::EnvFilter;

/// Log handle for one extraction job.
///
/// Every event carries the job id and, where one applies, the page number,
/// so all events for a page can be filtered on `page=<n>`.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: Arc<str>,
}

impl JobLogger {
    pub fn new(job_id: &str) -> Self {
        Self {
            job_id: Arc::from(job_id),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Span covering the whole run.
    pub fn run_span(&self) -> Span {
        info_span!("extraction", job = %self.job_id)
    }

    /// Span for one page. Events from code that knows nothing about pages,
    /// such as the retry loop, inherit the tag from it.
    pub fn page_span(&self, page: u64) -> Span {
        info_span!("page", page)
    }

    pub fn info(&self, page: u64, message: impl Display) {
        info!(job = %self.job_id, page, "{message}");
    }

    pub fn warn(&self, page: u64, message: impl Display) {
        warn!(job = %self.job_id, page, "{message}");
    }

    pub fn error(&self, page: u64, message: impl Display) {
        error!(job = %self.job_id, page, "{message}");
    }
}

/// Installs a `fmt` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Does nothing if the host already installed a subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
