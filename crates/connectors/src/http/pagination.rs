use crate::error::ApiError;
use serde_json::Value;

/// Extracts the continuation cursor from a successful page body.
pub trait PaginationScheme: Send + Sync {
    /// `Ok(None)` marks the last page.
    fn next_cursor(&self, body: &[u8]) -> Result<Option<String>, ApiError>;
}

/// Cursor pagination read from JSON pointers.
///
/// The defaults match Graph-style bodies:
/// `{"data": [...], "paging": {"cursors": {"after": "..."}, "next": "..."}}`,
/// where a missing `paging.next` means there is nothing after this page.
/// Only the bare cursor is returned, never the `next` URL, which embeds the
/// access token.
#[derive(Debug, Clone)]
pub struct JsonCursorPagination {
    cursor_pointer: String,
    end_marker_pointer: Option<String>,
}

impl Default for JsonCursorPagination {
    fn default() -> Self {
        Self {
            cursor_pointer: "/paging/cursors/after".to_string(),
            end_marker_pointer: Some("/paging/next".to_string()),
        }
    }
}

impl JsonCursorPagination {
    pub fn new(cursor_pointer: impl Into<String>) -> Self {
        Self {
            cursor_pointer: cursor_pointer.into(),
            end_marker_pointer: None,
        }
    }

    /// Treats the page as the last one when `pointer` is absent or null. When
    /// it is present the cursor must be too, otherwise the body is malformed.
    pub fn with_end_marker(mut self, pointer: impl Into<String>) -> Self {
        self.end_marker_pointer = Some(pointer.into());
        self
    }
}

impl PaginationScheme for JsonCursorPagination {
    fn next_cursor(&self, body: &[u8]) -> Result<Option<String>, ApiError> {
        let json: Value = serde_json::from_slice(body)
            .map_err(|e| ApiError::fatal(format!("malformed response: {e}")))?;

        if let Some(marker) = &self.end_marker_pointer
            && json.pointer(marker).is_none_or(Value::is_null)
        {
            return Ok(None);
        }

        let cursor = json
            .pointer(&self.cursor_pointer)
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        // Past this point the end marker, if configured, says more pages exist.
        if cursor.is_none() && self.end_marker_pointer.is_some() {
            return Err(ApiError::fatal(
                "malformed response: next page advertised without a cursor",
            ));
        }

        Ok(cursor)
    }
}
