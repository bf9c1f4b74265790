use crate::{
    blob::{BlobStore, checkpoint_key},
    error::{BlobError, StateStoreError},
    state::CheckpointStore,
};
use async_trait::async_trait;
use bytes::Bytes;
use model::state::ExtractionState;

/// Checkpoint store that keeps the state as a JSON object in a blob store.
pub struct BlobCheckpointStore<B> {
    store: B,
    key: String,
}

impl<B: BlobStore> BlobCheckpointStore<B> {
    pub fn new(store: B, prefix: &str) -> Self {
        Self {
            store,
            key: checkpoint_key(prefix),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl<B: BlobStore> CheckpointStore for BlobCheckpointStore<B> {
    async fn load(&self) -> Result<ExtractionState, StateStoreError> {
        let bytes = match self.store.get_object(&self.key).await {
            Ok(bytes) => bytes,
            Err(BlobError::NotFound(_)) => return Err(StateStoreError::NotFound),
            Err(err) => return Err(StateStoreError::LoadCheckpoint(err)),
        };

        Ok(ExtractionState::from_json(&bytes)?)
    }

    async fn save(&self, state: &ExtractionState) -> Result<(), StateStoreError> {
        let bytes = state.to_json()?;

        self.store
            .put_object(&self.key, Bytes::from(bytes))
            .await
            .map_err(StateStoreError::SaveCheckpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::memory::MemoryBlobStore;
    use model::pagination::cursor::Cursor;
    use std::sync::Arc;

    #[tokio::test]
    async fn first_run_is_not_found() {
        let store = BlobCheckpointStore::new(MemoryBlobStore::new(), "job");
        assert!(store.load().await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn saves_and_loads() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let store = BlobCheckpointStore::new(blobs.clone(), "job");

        let state = ExtractionState::new(41, Cursor::After("QVFIUmx".into()));
        store.save(&state).await.unwrap();

        assert_eq!(store.key(), "job/_state.json");
        assert!(blobs.contains("job/_state.json"));
        assert_eq!(store.load().await.unwrap(), state);
    }

    #[tokio::test]
    async fn failed_save_keeps_previous_checkpoint() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let store = BlobCheckpointStore::new(blobs.clone(), "job");

        let first = ExtractionState::new(3, Cursor::After("c3".into()));
        store.save(&first).await.unwrap();

        blobs.fail_puts_matching("job/_state");
        let err = store
            .save(&ExtractionState::new(9, Cursor::After("c9".into())))
            .await
            .unwrap_err();
        assert!(matches!(err, StateStoreError::SaveCheckpoint(_)));

        assert_eq!(store.load().await.unwrap(), first);
    }

    #[tokio::test]
    async fn corrupt_object_is_reported() {
        let blobs = Arc::new(MemoryBlobStore::new());
        blobs.insert("job/_state.json", "{\"after\":");
        let store = BlobCheckpointStore::new(blobs, "job");

        assert!(matches!(
            store.load().await,
            Err(StateStoreError::Corrupt(_))
        ));
    }
}
