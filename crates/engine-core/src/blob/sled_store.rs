use crate::{blob::BlobStore, error::BlobError};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

/// Blob store backed by an embedded sled database.
pub struct SledBlobStore {
    db: sled::Db,
}

impl SledBlobStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BlobError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Wraps an already opened database, e.g. one shared with other trees.
    pub fn from_db(db: sled::Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BlobStore for SledBlobStore {
    async fn put_object(&self, key: &str, bytes: Bytes) -> Result<(), BlobError> {
        // Single-key inserts are atomic in sled; flushing makes them durable.
        self.db.insert(key.as_bytes(), bytes.as_ref())?;
        self.db.flush_async().await?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, BlobError> {
        match self.db.get(key.as_bytes())? {
            Some(value) => Ok(Bytes::copy_from_slice(&value)),
            None => Err(BlobError::NotFound(key.to_string())),
        }
    }
}
