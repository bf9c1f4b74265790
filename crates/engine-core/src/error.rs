use model::error::RecordError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Object '{0}' not found")]
    NotFound(String),

    #[error("I/O error on object '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid object key '{0}'")]
    InvalidKey(String),

    #[error("Sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Injected failure for object '{0}'")]
    Injected(String),
}

impl BlobError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BlobError::NotFound(_))
    }
}

#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("No checkpoint found")]
    NotFound,

    #[error("Failed to load checkpoint: {0}")]
    LoadCheckpoint(#[source] BlobError),

    #[error("Failed to save checkpoint: {0}")]
    SaveCheckpoint(#[source] BlobError),

    #[error("Checkpoint is corrupt: {0}")]
    Corrupt(#[from] RecordError),
}

impl StateStoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StateStoreError::NotFound)
    }
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to write page {page_number}: {source}")]
    Write {
        page_number: u64,
        #[source]
        source: BlobError,
    },
}
