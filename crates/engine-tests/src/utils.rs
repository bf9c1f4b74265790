use crate::{ACCESS_TOKEN, BASE_URL, JOB_ID};
use async_trait::async_trait;
use connectors::{
    error::TransportError,
    http::{HttpTransport, JsonCursorPagination, RawResponse, StatusClassifier},
};
use engine_config::settings::{ExtractionSettings, credential::Credential};
use engine_core::blob::BlobStore;
use engine_processing::driver::ExtractionDriver;
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio_util::sync::CancellationToken;

pub type TestDriver = ExtractionDriver<Arc<PagedApi>, StatusClassifier, JsonCursorPagination>;

/// Cursor token that addresses `page`.
pub fn cursor_for(page: u64) -> String {
    format!("c{page}")
}

/// Body of page `page` out of `total`, in Graph API shape.
pub fn page_body(page: u64, total: u64) -> String {
    if page < total {
        format!(
            r#"{{"data":[{{"id":"{page}"}}],"paging":{{"cursors":{{"after":"{}"}},"next":"{BASE_URL}?after={}"}}}}"#,
            cursor_for(page + 1),
            cursor_for(page + 1)
        )
    } else {
        format!(
            r#"{{"data":[{{"id":"{page}"}}],"paging":{{"cursors":{{"before":"{}"}}}}}}"#,
            cursor_for(page)
        )
    }
}

/// In-process cursor-paginated API.
///
/// Serves `total` pages addressed by `after=c<n>` (no cursor means page 1).
/// Responses queued with [`PagedApi::fail_page`] are served for a page before
/// its real body. Every request is recorded.
pub struct PagedApi {
    total: u64,
    failures: Mutex<HashMap<u64, VecDeque<RawResponse>>>,
    cursor_override: Mutex<HashMap<u64, String>>,
    requests: Mutex<Vec<Vec<(String, String)>>>,
    cancel_on: Mutex<Option<(u64, CancellationToken)>>,
    hang_on: Mutex<Option<u64>>,
}

impl PagedApi {
    pub fn new(total: u64) -> Arc<Self> {
        Arc::new(Self {
            total,
            failures: Mutex::default(),
            cursor_override: Mutex::default(),
            requests: Mutex::default(),
            cancel_on: Mutex::default(),
            hang_on: Mutex::default(),
        })
    }

    /// Serves `response` for `page` before the real body, once per call.
    pub fn fail_page(&self, page: u64, response: RawResponse) {
        self.failures
            .lock()
            .unwrap()
            .entry(page)
            .or_default()
            .push_back(response);
    }

    /// Page `page` advertises `cursor` as its next cursor instead of `c<page+1>`.
    pub fn override_next_cursor(&self, page: u64, cursor: impl Into<String>) {
        self.cursor_override
            .lock()
            .unwrap()
            .insert(page, cursor.into());
    }

    /// Fires `token` once page `page` has been served.
    pub fn cancel_after(&self, page: u64, token: CancellationToken) {
        *self.cancel_on.lock().unwrap() = Some((page, token));
    }

    /// Requests for `page` never complete, like a process killed mid-fetch.
    pub fn hang_on(&self, page: Option<u64>) {
        *self.hang_on.lock().unwrap() = page;
    }

    pub fn requests(&self) -> Vec<Vec<(String, String)>> {
        self.requests.lock().unwrap().clone()
    }

    /// Pages requested, in order, including retries.
    pub fn requested_pages(&self) -> Vec<u64> {
        self.requests().iter().map(|q| page_of(q)).collect()
    }

    fn body_for(&self, page: u64) -> String {
        let body = page_body(page, self.total);
        match self.cursor_override.lock().unwrap().get(&page) {
            Some(next) => body.replace(&cursor_for(page + 1), next),
            None => body,
        }
    }
}

fn page_of(query: &[(String, String)]) -> u64 {
    query
        .iter()
        .find(|(k, _)| k == "after")
        .and_then(|(_, v)| v.strip_prefix('c'))
        .and_then(|n| n.parse().ok())
        .unwrap_or(1)
}

#[async_trait]
impl HttpTransport for PagedApi {
    async fn get(
        &self,
        _url: &str,
        query: &[(String, String)],
    ) -> Result<RawResponse, TransportError> {
        self.requests.lock().unwrap().push(query.to_vec());
        let page = page_of(query);

        let hang = *self.hang_on.lock().unwrap() == Some(page);
        if hang {
            std::future::pending::<()>().await;
        }

        if page > self.total {
            return Ok(RawResponse::new(400, "cursor out of range"));
        }

        if let Some(failure) = self
            .failures
            .lock()
            .unwrap()
            .get_mut(&page)
            .and_then(VecDeque::pop_front)
        {
            return Ok(failure);
        }

        if let Some((at, token)) = self.cancel_on.lock().unwrap().as_ref()
            && *at == page
        {
            token.cancel();
        }

        Ok(RawResponse::new(200, self.body_for(page)))
    }
}

pub fn throttled() -> RawResponse {
    RawResponse::new(429, r#"{"error":{"message":"rate limited"}}"#)
}

pub fn settings() -> ExtractionSettings {
    ExtractionSettings::new(JOB_ID, BASE_URL)
        .with_param("fields", "id,name")
        .with_credential(Credential::access_token(ACCESS_TOKEN))
        .with_backoff(Duration::from_millis(1), Duration::from_millis(5))
        .with_max_retries(3)
}

pub fn driver<B>(settings: ExtractionSettings, api: Arc<PagedApi>, blobs: Arc<B>) -> TestDriver
where
    B: BlobStore + 'static,
{
    ExtractionDriver::over_blob_store(
        settings,
        api,
        StatusClassifier::new(),
        JsonCursorPagination::default(),
        blobs,
    )
}

pub fn page_key(page: u64) -> String {
    format!("{JOB_ID}/{page}.json")
}

pub fn state_key() -> String {
    format!("{JOB_ID}/_state.json")
}

/// Parsed checkpoint object.
pub fn read_checkpoint(bytes: &[u8]) -> serde_json::Value {
    serde_json::from_slice(bytes).expect("checkpoint is JSON")
}
