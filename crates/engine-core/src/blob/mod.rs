use crate::error::BlobError;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

pub mod fs;
pub mod memory;
pub mod sled_store;

/// Durable key/value object store.
///
/// `put_object` must replace an object atomically: a concurrent or later
/// reader sees either the previous bytes or the new ones, never a mix.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put_object(&self, key: &str, bytes: Bytes) -> Result<(), BlobError>;
    async fn get_object(&self, key: &str) -> Result<Bytes, BlobError>;
}

#[async_trait]
impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    async fn put_object(&self, key: &str, bytes: Bytes) -> Result<(), BlobError> {
        (**self).put_object(key, bytes).await
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, BlobError> {
        (**self).get_object(key).await
    }
}

/// Key of the page object, `"{prefix}/{page_number}.json"`.
pub fn page_key(prefix: &str, page_number: u64) -> String {
    format!("{prefix}/{page_number}.json")
}

/// Key of the checkpoint object, `"{prefix}/_state.json"`.
pub fn checkpoint_key(prefix: &str) -> String {
    format!("{prefix}/_state.json")
}
