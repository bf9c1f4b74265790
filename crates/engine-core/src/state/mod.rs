use crate::error::StateStoreError;
use async_trait::async_trait;
use model::state::ExtractionState;

pub mod blob_store;

pub use blob_store::BlobCheckpointStore;

/// Durable home of one job's [`ExtractionState`].
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Loads the last saved state. [`StateStoreError::NotFound`] on a
    /// first run is expected and not an error condition for callers.
    async fn load(&self) -> Result<ExtractionState, StateStoreError>;

    /// Persists `state`. A failed save leaves the previous checkpoint intact.
    async fn save(&self, state: &ExtractionState) -> Result<(), StateStoreError>;
}
