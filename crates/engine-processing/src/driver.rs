use crate::{
    error::DriverError,
    executor::RequestExecutor,
    logger::JobLogger,
    report::{RunOutcome, RunReport},
};
use chrono::Utc;
use connectors::{
    error::ApiErrorKind,
    http::{HttpTransport, PaginationScheme, ResponseClassifier, ReqwestTransport},
};
use engine_config::settings::ExtractionSettings;
use engine_core::{
    blob::BlobStore,
    error::StateStoreError,
    sink::{BlobPageSink, PageSink},
    state::{BlobCheckpointStore, CheckpointStore},
};
use model::{
    pagination::page::{Page, PageRequest},
    state::ExtractionState,
};
use std::{fmt, sync::Arc, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug};

/// Where the driver is in its per-page cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverPhase {
    Init,
    Resuming,
    Starting,
    Fetching,
    Persisting,
    Checkpointing,
    Done,
    Aborted,
    Cancelled,
}

impl DriverPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DriverPhase::Done | DriverPhase::Aborted | DriverPhase::Cancelled
        )
    }
}

impl fmt::Display for DriverPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverPhase::Init => "init",
            DriverPhase::Resuming => "resuming",
            DriverPhase::Starting => "starting",
            DriverPhase::Fetching => "fetching",
            DriverPhase::Persisting => "persisting",
            DriverPhase::Checkpointing => "checkpointing",
            DriverPhase::Done => "done",
            DriverPhase::Aborted => "aborted",
            DriverPhase::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Whether an abort should still try to persist the in-memory state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FinalSave {
    Attempt,
    Skip,
}

/// Pagination state machine.
///
/// Loads the checkpoint, then loops fetch → persist → advance, saving the
/// state every `checkpoint_stride` pages and once more when the run ends.
/// The state only advances after the page went through the sink, so a
/// restarted process re-fetches at most one stride of pages.
pub struct ExtractionDriver<T, C, P> {
    settings: ExtractionSettings,
    executor: RequestExecutor<T, C, P>,
    sink: Arc<dyn PageSink>,
    checkpoints: Arc<dyn CheckpointStore>,
    log: JobLogger,
    cancel: CancellationToken,
    phase: DriverPhase,
}

impl<T, C, P> ExtractionDriver<T, C, P>
where
    T: HttpTransport,
    C: ResponseClassifier,
    P: PaginationScheme,
{
    pub fn new(
        settings: ExtractionSettings,
        executor: RequestExecutor<T, C, P>,
        sink: Arc<dyn PageSink>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        let log = JobLogger::new(&settings.job_id);
        let cancel = CancellationToken::new();

        Self {
            executor: executor.with_cancellation(cancel.clone()),
            settings,
            sink,
            checkpoints,
            log,
            cancel,
            phase: DriverPhase::Init,
        }
    }

    /// Driver writing pages and the checkpoint to one blob store under the
    /// configured prefix.
    pub fn over_blob_store<B>(
        settings: ExtractionSettings,
        transport: T,
        classifier: C,
        pagination: P,
        blobs: Arc<B>,
    ) -> Self
    where
        B: BlobStore + 'static,
    {
        let executor = RequestExecutor::new(&settings, transport, classifier, pagination);
        let prefix = settings.prefix().to_string();
        let sink = Arc::new(BlobPageSink::new(blobs.clone(), prefix.clone()));
        let checkpoints = Arc::new(BlobCheckpointStore::new(blobs, &prefix));

        Self::new(settings, executor, sink, checkpoints)
    }

    /// Lets the host stop the run between pages or during a backoff.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.executor = self.executor.with_cancellation(cancel.clone());
        self.cancel = cancel;
        self
    }

    pub fn with_logger(mut self, log: JobLogger) -> Self {
        self.log = log;
        self
    }

    pub fn phase(&self) -> DriverPhase {
        self.phase
    }

    pub async fn run(&mut self) -> RunReport {
        let span = self.log.run_span();
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&mut self) -> RunReport {
        let started = Instant::now();
        let mut report = RunReport::new(&self.settings.job_id);
        self.transition(DriverPhase::Init);

        if let Err(err) = self.settings.validate() {
            let state = ExtractionState::fresh();
            return self
                .abort(report, state, err.into(), FinalSave::Skip, started)
                .await;
        }

        let mut state = match self.resume().await {
            Ok(state) => state,
            Err(err) => {
                // Resuming from an unknown position risks silent data loss, and
                // saving would overwrite the unreadable checkpoint.
                let state = ExtractionState::fresh();
                return self
                    .abort(report, state, err, FinalSave::Skip, started)
                    .await;
            }
        };

        if state.is_complete() {
            self.transition(DriverPhase::Done);
            self.log.info(
                state.page_number,
                "Checkpoint marks the stream as fully extracted, nothing to fetch",
            );
            report.outcome = RunOutcome::Done;
            report.final_state = state;
            report.elapsed = started.elapsed();
            return report;
        }

        loop {
            if self.cancel.is_cancelled() {
                return self.cancelled(report, state, started).await;
            }

            let page_number = state.page_number;

            self.transition(DriverPhase::Fetching);
            let request = PageRequest::new(page_number, state.cursor.clone());
            let page = match self
                .executor
                .fetch(&request)
                .instrument(self.log.page_span(page_number))
                .await
            {
                Ok(page) => page,
                Err(err) if err.kind == ApiErrorKind::Cancelled => {
                    return self.cancelled(report, state, started).await;
                }
                Err(source) => {
                    let err = DriverError::Fetch {
                        page_number,
                        source,
                    };
                    return self
                        .abort(report, state, err, FinalSave::Attempt, started)
                        .await;
                }
            };
            report.pages_fetched += 1;

            self.transition(DriverPhase::Persisting);
            if let Err(err) = self.persist(&page, &mut report).await {
                return self
                    .abort(report, state, err, FinalSave::Attempt, started)
                    .await;
            }

            self.transition(DriverPhase::Checkpointing);
            if let Some(next) = &page.next_cursor
                && self.settings.leaks_credential(next)
            {
                let err = DriverError::CredentialInCursor { page_number };
                return self
                    .abort(report, state, err, FinalSave::Attempt, started)
                    .await;
            }

            state.advance(page.next_cursor.as_deref());

            if page.is_last() {
                self.transition(DriverPhase::Done);
                self.log.info(
                    page_number,
                    format_args!("Reached end of stream after {page_number} pages"),
                );
                return self.finish(report, state, started).await;
            }

            if state.page_number % self.settings.checkpoint_stride == 0
                && let Err(err) = self.checkpoint(&mut state, &mut report).await
            {
                return self
                    .abort(report, state, err, FinalSave::Skip, started)
                    .await;
            }
        }
    }

    async fn resume(&mut self) -> Result<ExtractionState, DriverError> {
        match self.checkpoints.load().await {
            Ok(state) => {
                self.transition(DriverPhase::Resuming);
                self.log.info(
                    state.page_number,
                    format_args!("Resuming from page {}", state.page_number),
                );
                Ok(state)
            }
            Err(StateStoreError::NotFound) => {
                self.transition(DriverPhase::Starting);
                self.log.info(1, "No checkpoint found, starting fresh");
                Ok(ExtractionState::fresh())
            }
            Err(err) => Err(DriverError::CheckpointLoad(err)),
        }
    }

    async fn persist(&self, page: &Page, report: &mut RunReport) -> Result<(), DriverError> {
        let page_number = page.page_number;

        match self.sink.write(page_number, page.raw_payload.clone()).await {
            Ok(()) => {
                report.pages_written += 1;
                self.log.info(
                    page_number,
                    format_args!("Persisted page ({} bytes)", page.size_bytes()),
                );
                Ok(())
            }
            Err(source) if self.settings.sink_failure.is_fatal() => {
                report.sink_failures += 1;
                Err(DriverError::PageWrite {
                    page_number,
                    source,
                })
            }
            Err(err) => {
                report.sink_failures += 1;
                self.log
                    .warn(page_number, format_args!("{err}; continuing extraction"));
                Ok(())
            }
        }
    }

    /// Saves `state`, stamping it on success. Failures are only fatal under
    /// an abort policy.
    async fn checkpoint(
        &self,
        state: &mut ExtractionState,
        report: &mut RunReport,
    ) -> Result<(), DriverError> {
        let mut snapshot = state.clone();
        snapshot.mark_saved(Utc::now());

        match self.checkpoints.save(&snapshot).await {
            Ok(()) => {
                *state = snapshot;
                report.checkpoints_saved += 1;
                self.log.info(
                    state.page_number,
                    format_args!("Checkpoint saved at page {}", state.page_number),
                );
                Ok(())
            }
            Err(source) if self.settings.checkpoint_failure.is_fatal() => {
                report.checkpoint_failures += 1;
                Err(DriverError::CheckpointSave {
                    page_number: state.page_number,
                    source,
                })
            }
            Err(err) => {
                report.checkpoint_failures += 1;
                self.log.warn(
                    state.page_number,
                    format_args!("{err}; continuing, a restart may redo more pages"),
                );
                Ok(())
            }
        }
    }

    async fn finish(
        &mut self,
        mut report: RunReport,
        mut state: ExtractionState,
        started: Instant,
    ) -> RunReport {
        if let Err(err) = self.checkpoint(&mut state, &mut report).await {
            return self
                .abort(report, state, err, FinalSave::Skip, started)
                .await;
        }

        report.outcome = RunOutcome::Done;
        report.final_state = state;
        report.elapsed = started.elapsed();
        report
    }

    async fn cancelled(
        &mut self,
        mut report: RunReport,
        mut state: ExtractionState,
        started: Instant,
    ) -> RunReport {
        self.transition(DriverPhase::Cancelled);
        self.log.info(
            state.page_number,
            "Cancellation requested, saving state and stopping",
        );

        // A failed save is already counted; cancellation wins either way.
        let _ = self.checkpoint(&mut state, &mut report).await;

        report.outcome = RunOutcome::Cancelled;
        report.final_state = state;
        report.elapsed = started.elapsed();
        report
    }

    async fn abort(
        &mut self,
        mut report: RunReport,
        mut state: ExtractionState,
        err: DriverError,
        save: FinalSave,
        started: Instant,
    ) -> RunReport {
        self.transition(DriverPhase::Aborted);
        let page = err.page_number().unwrap_or(state.page_number);
        self.log.error(page, format_args!("Extraction aborted: {err}"));

        if save == FinalSave::Attempt {
            let _ = self.checkpoint(&mut state, &mut report).await;
        }

        report.outcome = RunOutcome::Aborted;
        report.final_state = state;
        report.error = Some(err);
        report.elapsed = started.elapsed();
        report
    }

    fn transition(&mut self, next: DriverPhase) {
        debug!(from = %self.phase, to = %next, "Driver transition");
        self.phase = next;
    }
}

impl<C, P> ExtractionDriver<ReqwestTransport, C, P>
where
    C: ResponseClassifier,
    P: PaginationScheme,
{
    /// Driver over a real HTTP client honoring `request_timeout`.
    pub fn over_http<B>(
        settings: ExtractionSettings,
        classifier: C,
        pagination: P,
        blobs: Arc<B>,
    ) -> Result<Self, DriverError>
    where
        B: BlobStore + 'static,
    {
        let transport = ReqwestTransport::new(settings.request_timeout)?;
        Ok(Self::over_blob_store(settings, transport, classifier, pagination, blobs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::http::{JsonCursorPagination, StatusClassifier};
    use engine_core::blob::memory::MemoryBlobStore;

    #[test]
    fn phase_names() {
        assert_eq!(DriverPhase::Checkpointing.to_string(), "checkpointing");
        assert!(DriverPhase::Cancelled.is_terminal());
        assert!(!DriverPhase::Fetching.is_terminal());
    }

    #[tokio::test]
    async fn http_driver_starts_in_init() {
        let settings = ExtractionSettings::new("ads", "https://graph.example.com/v19.0/act_1/ads");
        let driver = ExtractionDriver::over_http(
            settings,
            StatusClassifier::new(),
            JsonCursorPagination::default(),
            Arc::new(MemoryBlobStore::new()),
        )
        .unwrap();

        assert_eq!(driver.phase(), DriverPhase::Init);
    }
}
