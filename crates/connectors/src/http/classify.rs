use crate::{error::ApiError, http::transport::RawResponse};
use serde_json::Value;
use std::{ops::RangeInclusive, time::Duration};

const EXCERPT_LEN: usize = 200;

/// Decides whether a response is usable and, if not, how to treat it.
pub trait ResponseClassifier: Send + Sync {
    /// `None` means the response carries a page.
    fn classify(&self, response: &RawResponse) -> Option<ApiError>;
}

/// Classifies purely on HTTP status.
///
/// 2xx is success and 429 is throttling (honoring `Retry-After`). Server
/// errors are only retried when `retry_server_errors` is set; everything else
/// is fatal.
#[derive(Debug, Clone, Default)]
pub struct StatusClassifier {
    pub retry_server_errors: bool,
}

impl StatusClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retrying_server_errors() -> Self {
        Self {
            retry_server_errors: true,
        }
    }
}

impl ResponseClassifier for StatusClassifier {
    fn classify(&self, response: &RawResponse) -> Option<ApiError> {
        let status = response.status;

        if response.is_success() {
            return None;
        }

        let err = match status {
            429 => ApiError::rate_limited("HTTP 429 Too Many Requests", response.retry_after()),
            500..=599 if self.retry_server_errors => ApiError::transient(format!(
                "HTTP {status}: {}",
                response.body_excerpt(EXCERPT_LEN)
            )),
            _ => ApiError::fatal(format!(
                "HTTP {status}: {}",
                response.body_excerpt(EXCERPT_LEN)
            )),
        };

        Some(err.with_status(status))
    }
}

/// Classifier for Graph-style APIs that report errors as
/// `{"error": {"code": N, "message": "..."}}`, often with a 200 or 400
/// status, and signal throttling through the error code.
#[derive(Debug, Clone)]
pub struct GraphApiClassifier {
    throttle_codes: Vec<RangeInclusive<i64>>,
    transient_codes: Vec<i64>,
    status: StatusClassifier,
}

impl Default for GraphApiClassifier {
    fn default() -> Self {
        Self {
            // app, user, page, custom and business-use-case limits
            throttle_codes: vec![4..=4, 17..=17, 32..=32, 613..=613, 80000..=80014],
            transient_codes: vec![1, 2],
            status: StatusClassifier::default(),
        }
    }
}

impl GraphApiClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_throttle_codes(mut self, codes: Vec<RangeInclusive<i64>>) -> Self {
        self.throttle_codes = codes;
        self
    }

    pub fn with_transient_codes(mut self, codes: Vec<i64>) -> Self {
        self.transient_codes = codes;
        self
    }

    pub fn with_status_classifier(mut self, status: StatusClassifier) -> Self {
        self.status = status;
        self
    }

    fn is_throttle(&self, code: i64) -> bool {
        self.throttle_codes.iter().any(|r| r.contains(&code))
    }

    /// Wait suggested by the usage header, in minutes until access returns.
    fn usage_hint(response: &RawResponse) -> Option<Duration> {
        let raw = response.header("x-business-use-case-usage")?;
        let usage: Value = serde_json::from_str(raw).ok()?;

        let minutes = usage
            .as_object()?
            .values()
            .filter_map(Value::as_array)
            .flatten()
            .filter_map(|entry| entry.get("estimated_time_to_regain_access")?.as_u64())
            .max()?;

        let secs = minutes.checked_mul(60)?;
        (secs > 0).then(|| Duration::from_secs(secs))
    }
}

impl ResponseClassifier for GraphApiClassifier {
    fn classify(&self, response: &RawResponse) -> Option<ApiError> {
        let error = serde_json::from_slice::<Value>(&response.body)
            .ok()
            .and_then(|body| body.get("error").cloned())
            .filter(Value::is_object);

        let Some(error) = error else {
            return self.status.classify(response);
        };

        let code = error.get("code").and_then(Value::as_i64).unwrap_or(-1);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("no message");
        let text = format!("API error {code}: {message}");

        let err = if response.status == 429 || self.is_throttle(code) {
            let hint = response.retry_after().or_else(|| Self::usage_hint(response));
            ApiError::rate_limited(text, hint)
        } else if self.transient_codes.contains(&code) {
            ApiError::transient(text)
        } else {
            ApiError::fatal(text)
        };

        Some(err.with_status(response.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiErrorKind;

    fn kind(c: &dyn ResponseClassifier, res: &RawResponse) -> Option<ApiErrorKind> {
        c.classify(res).map(|e| e.kind)
    }

    #[test]
    fn status_classifier_table() {
        let c = StatusClassifier::new();
        assert_eq!(kind(&c, &RawResponse::new(200, "{}")), None);
        assert_eq!(
            kind(&c, &RawResponse::new(429, "")),
            Some(ApiErrorKind::RateLimited)
        );
        assert_eq!(kind(&c, &RawResponse::new(503, "")), Some(ApiErrorKind::Fatal));
        assert_eq!(kind(&c, &RawResponse::new(400, "")), Some(ApiErrorKind::Fatal));
        assert_eq!(kind(&c, &RawResponse::new(404, "")), Some(ApiErrorKind::Fatal));

        let retrying = StatusClassifier::retrying_server_errors();
        assert_eq!(
            kind(&retrying, &RawResponse::new(503, "")),
            Some(ApiErrorKind::Transient)
        );
    }

    #[test]
    fn status_429_carries_retry_after() {
        let res = RawResponse::new(429, "").with_header("Retry-After", "12");
        let err = StatusClassifier::new().classify(&res).unwrap();
        assert_eq!(err.retry_after, Some(Duration::from_secs(12)));
        assert_eq!(err.status, Some(429));
    }

    #[test]
    fn fatal_message_includes_body() {
        let res = RawResponse::new(400, "{\"error\":\"bad field\"}");
        let err = StatusClassifier::new().classify(&res).unwrap();
        assert!(err.message.contains("HTTP 400"));
        assert!(err.message.contains("bad field"));
    }

    #[test]
    fn graph_throttle_code_inside_200() {
        let body = r#"{"error":{"code":17,"message":"User request limit reached"}}"#;
        let err = GraphApiClassifier::new()
            .classify(&RawResponse::new(200, body))
            .unwrap();
        assert_eq!(err.kind, ApiErrorKind::RateLimited);
        assert!(err.message.contains("User request limit reached"));
    }

    #[test]
    fn graph_business_use_case_range() {
        let body = r#"{"error":{"code":80004,"message":"too many calls"}}"#;
        let c = GraphApiClassifier::new();
        assert_eq!(
            kind(&c, &RawResponse::new(400, body)),
            Some(ApiErrorKind::RateLimited)
        );
    }

    #[test]
    fn graph_usage_header_becomes_hint() {
        let body = r#"{"error":{"code":80000,"message":"slow down"}}"#;
        let res = RawResponse::new(400, body).with_header(
            "X-Business-Use-Case-Usage",
            r#"{"123":[{"type":"ads_insights","call_count":100,"estimated_time_to_regain_access":3}]}"#,
        );
        let err = GraphApiClassifier::new().classify(&res).unwrap();
        assert_eq!(err.retry_after, Some(Duration::from_secs(180)));
    }

    #[test]
    fn graph_usage_header_overflow_gives_no_hint() {
        let body = r#"{"error":{"code":80000,"message":"slow down"}}"#;
        let res = RawResponse::new(400, body).with_header(
            "X-Business-Use-Case-Usage",
            r#"{"1":[{"estimated_time_to_regain_access":18446744073709551615}]}"#,
        );
        let err = GraphApiClassifier::new().classify(&res).unwrap();
        assert_eq!(err.kind, ApiErrorKind::RateLimited);
        assert_eq!(err.retry_after, None);
    }

    #[test]
    fn graph_other_codes() {
        let c = GraphApiClassifier::new();
        let transient = r#"{"error":{"code":2,"message":"Service temporarily unavailable"}}"#;
        let fatal = r#"{"error":{"code":100,"message":"Invalid parameter"}}"#;

        assert_eq!(
            kind(&c, &RawResponse::new(500, transient)),
            Some(ApiErrorKind::Transient)
        );
        assert_eq!(
            kind(&c, &RawResponse::new(400, fatal)),
            Some(ApiErrorKind::Fatal)
        );
    }

    #[test]
    fn graph_falls_back_to_status() {
        let c = GraphApiClassifier::new();
        assert_eq!(kind(&c, &RawResponse::new(200, r#"{"data":[]}"#)), None);
        assert_eq!(
            kind(&c, &RawResponse::new(429, "<html>slow down</html>")),
            Some(ApiErrorKind::RateLimited)
        );
        assert_eq!(
            kind(&c, &RawResponse::new(502, "bad gateway")),
            Some(ApiErrorKind::Fatal)
        );
    }
}
