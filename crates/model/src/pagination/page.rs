use crate::pagination::cursor::Cursor;
use bytes::Bytes;

/// Descriptor of the next fetch.
///
/// Holds only the page number and the continuation cursor. The full query is
/// assembled from trusted settings at send time, so a request never carries
/// the credential around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page_number: u64,
    pub cursor: Cursor,
}

impl PageRequest {
    pub fn new(page_number: u64, cursor: Cursor) -> Self {
        Self {
            page_number,
            cursor,
        }
    }
}

/// One fetched unit of the stream.
#[derive(Debug, Clone)]
pub struct Page {
    pub page_number: u64,
    pub raw_payload: Bytes,
    /// `None` marks the end of the stream.
    pub next_cursor: Option<String>,
}

impl Page {
    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }

    pub fn size_bytes(&self) -> usize {
        self.raw_payload.len()
    }
}
