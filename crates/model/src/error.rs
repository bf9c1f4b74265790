use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("checkpoint record is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("checkpoint record has invalid page number {0}; page numbers start at 1")]
    InvalidPageNumber(u64),
}
