use connectors::error::{ApiError, TransportError};
use engine_config::error::ConfigError;
use engine_core::error::{SinkError, StateStoreError};
use thiserror::Error;

/// Reasons an extraction run stops before the end of the stream.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Invalid extraction settings: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to set up HTTP transport: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to load checkpoint: {0}")]
    CheckpointLoad(#[source] StateStoreError),

    #[error("Fetch failed at page {page_number}: {source}")]
    Fetch {
        page_number: u64,
        #[source]
        source: ApiError,
    },

    #[error("Failed to persist page {page_number}: {source}")]
    PageWrite {
        page_number: u64,
        #[source]
        source: SinkError,
    },

    #[error("Failed to save checkpoint at page {page_number}: {source}")]
    CheckpointSave {
        page_number: u64,
        #[source]
        source: StateStoreError,
    },

    #[error("Cursor returned with page {page_number} embeds the access credential")]
    CredentialInCursor { page_number: u64 },
}

impl DriverError {
    /// Page the run was working on when it stopped, if any.
    pub fn page_number(&self) -> Option<u64> {
        match self {
            DriverError::Config(_)
            | DriverError::Transport(_)
            | DriverError::CheckpointLoad(_) => None,
            DriverError::Fetch { page_number, .. }
            | DriverError::PageWrite { page_number, .. }
            | DriverError::CheckpointSave { page_number, .. }
            | DriverError::CredentialInCursor { page_number } => Some(*page_number),
        }
    }
}
