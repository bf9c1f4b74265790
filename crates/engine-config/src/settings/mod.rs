use crate::error::ConfigError;
use model::pagination::cursor::Cursor;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

pub mod credential;
pub mod policy;

pub use credential::Credential;
pub use policy::WriteFailurePolicy;

const DEFAULT_CURSOR_PARAM: &str = "after";
const DEFAULT_STRIDE: u64 = 100;
const DEFAULT_MAX_RETRIES: u32 = 5;

/// Configuration for one extraction job.
///
/// Built programmatically by the host. Everything here is trusted input: the
/// request for every page is rebuilt from these settings plus the current
/// cursor.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Job identity; also the default blob key prefix.
    pub job_id: String,

    /// Endpoint serving the paged collection.
    pub base_url: String,

    /// Fixed query parameters sent with every request (fields, filters, ...).
    pub query: Vec<(String, String)>,

    /// Access credential, set programmatically only.
    #[serde(skip)]
    pub credential: Option<Credential>,

    /// Query parameter that carries the cursor.
    pub cursor_param: String,

    /// Optional `limit` sent with every request.
    pub page_size: Option<u32>,

    /// Blob key prefix for pages and the checkpoint.
    pub prefix: Option<String>,

    /// Pages between checkpoint saves.
    pub checkpoint_stride: u64,

    /// Attempts per page before giving up on a recoverable error.
    pub max_retries: u32,

    #[serde(with = "millis")]
    pub base_delay: Duration,

    /// Ceiling for exponential backoff. Server hints are not capped.
    #[serde(with = "millis")]
    pub max_delay: Duration,

    #[serde(with = "millis")]
    pub request_timeout: Duration,

    pub sink_failure: WriteFailurePolicy,
    pub checkpoint_failure: WriteFailurePolicy,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            job_id: String::new(),
            base_url: String::new(),
            query: Vec::new(),
            credential: None,
            cursor_param: DEFAULT_CURSOR_PARAM.to_string(),
            page_size: None,
            prefix: None,
            checkpoint_stride: DEFAULT_STRIDE,
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            request_timeout: Duration::from_secs(30),
            sink_failure: WriteFailurePolicy::Continue,
            checkpoint_failure: WriteFailurePolicy::Continue,
        }
    }
}

impl ExtractionSettings {
    pub fn new(job_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn with_cursor_param(mut self, param: impl Into<String>) -> Self {
        self.cursor_param = param.into();
        self
    }

    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_checkpoint_stride(mut self, stride: u64) -> Self {
        self.checkpoint_stride = stride;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_sink_failure(mut self, policy: WriteFailurePolicy) -> Self {
        self.sink_failure = policy;
        self
    }

    pub fn with_checkpoint_failure(mut self, policy: WriteFailurePolicy) -> Self {
        self.checkpoint_failure = policy;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.job_id.trim().is_empty() {
            return Err(ConfigError::EmptyJobId);
        }

        Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;

        if self.checkpoint_stride == 0 {
            return Err(ConfigError::ZeroStride);
        }

        if self.base_delay > self.max_delay {
            return Err(ConfigError::DelayAboveCeiling {
                base_ms: self.base_delay.as_millis(),
                max_ms: self.max_delay.as_millis(),
            });
        }

        if let Some(cred) = &self.credential {
            if cred.is_empty() {
                return Err(ConfigError::EmptyCredential(cred.param().to_string()));
            }
            if cred.param() == self.cursor_param {
                return Err(ConfigError::ReservedParam(cred.param().to_string()));
            }
        }

        if let Some((key, _)) = self.query.iter().find(|(k, _)| *k == self.cursor_param) {
            return Err(ConfigError::ReservedParam(key.clone()));
        }

        Ok(())
    }

    /// Blob key prefix; defaults to the job id.
    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or(&self.job_id)
    }

    /// Full query for the page addressed by `cursor`.
    pub fn base_query(&self, cursor: &Cursor) -> Vec<(String, String)> {
        let mut query = self.query.clone();

        if let Some(limit) = self.page_size {
            query.push(("limit".to_string(), limit.to_string()));
        }

        if let Some(cred) = &self.credential {
            query.push((cred.param().to_string(), cred.expose().to_string()));
        }

        if let Cursor::After(token) = cursor {
            query.push((self.cursor_param.clone(), token.clone()));
        }

        query
    }

    /// Whether `text` embeds the configured credential.
    pub fn leaks_credential(&self, text: &str) -> bool {
        self.credential
            .as_ref()
            .is_some_and(|cred| cred.appears_in(text))
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
