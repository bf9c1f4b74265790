use bytes::Bytes;
use connectors::{
    error::{ApiError, ApiErrorKind},
    http::{HttpTransport, PaginationScheme, ResponseClassifier},
};
use engine_config::settings::ExtractionSettings;
use engine_core::retry::{BackoffPolicy, RetryDisposition, RetryError};
use model::pagination::page::{Page, PageRequest};
use tokio_util::sync::CancellationToken;

/// Fetches one page, retrying throttled and transient failures.
///
/// Generic over the transport, the response classifier and the pagination
/// scheme so one retry loop serves APIs that throttle via HTTP 429 as well as
/// those that wrap throttling in an error body. Keeps no state between calls.
pub struct RequestExecutor<T, C, P> {
    transport: T,
    classifier: C,
    pagination: P,
    settings: ExtractionSettings,
    backoff: BackoffPolicy,
    cancel: CancellationToken,
}

impl<T, C, P> RequestExecutor<T, C, P>
where
    T: HttpTransport,
    C: ResponseClassifier,
    P: PaginationScheme,
{
    pub fn new(settings: &ExtractionSettings, transport: T, classifier: C, pagination: P) -> Self {
        Self {
            transport,
            classifier,
            pagination,
            backoff: BackoffPolicy::new(
                settings.max_retries,
                settings.base_delay,
                settings.max_delay,
            ),
            settings: settings.clone(),
            cancel: CancellationToken::new(),
        }
    }

    /// Abandons backoff sleeps once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    pub async fn fetch(&self, request: &PageRequest) -> Result<Page, ApiError> {
        let query = self.settings.base_query(&request.cursor);

        let result = self
            .backoff
            .run(|| self.attempt(&query), Self::disposition, &self.cancel)
            .await;

        match result {
            Ok((raw_payload, next_cursor)) => Ok(Page {
                page_number: request.page_number,
                raw_payload,
                next_cursor,
            }),
            Err(RetryError::Fatal(err)) => Err(err),
            Err(RetryError::AttemptsExceeded(err)) => Err(ApiError {
                kind: ApiErrorKind::Fatal,
                retry_after: None,
                message: format!(
                    "retry limit exceeded after {} attempts: {}",
                    self.backoff.max_retries, err.message
                ),
                status: err.status,
            }),
            Err(RetryError::Cancelled(err)) => Err(ApiError::cancelled(format!(
                "cancelled while backing off: {}",
                err.message
            ))),
        }
    }

    /// One HTTP round trip: a fresh request, its body read once.
    async fn attempt(
        &self,
        query: &[(String, String)],
    ) -> Result<(Bytes, Option<String>), ApiError> {
        let response = self
            .transport
            .get(&self.settings.base_url, query)
            .await
            .map_err(|e| ApiError::fatal(format!("transport failure: {e}")))?;

        if let Some(err) = self.classifier.classify(&response) {
            return Err(err);
        }

        let next_cursor = self.pagination.next_cursor(&response.body)?;
        Ok((response.body, next_cursor))
    }

    fn disposition(err: &ApiError) -> RetryDisposition {
        if err.kind.is_recoverable() {
            RetryDisposition::Retry {
                hint: err.retry_after,
            }
        } else {
            RetryDisposition::Stop
        }
    }
}
