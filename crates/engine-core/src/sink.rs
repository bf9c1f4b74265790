use crate::{
    blob::{BlobStore, page_key},
    error::SinkError,
};
use async_trait::async_trait;
use bytes::Bytes;

/// Durable destination for raw page payloads.
#[async_trait]
pub trait PageSink: Send + Sync {
    /// Writes one page. Writing the same page number again overwrites it.
    async fn write(&self, page_number: u64, raw_payload: Bytes) -> Result<(), SinkError>;
}

/// Writes each page to `"{prefix}/{page_number}.json"`.
pub struct BlobPageSink<B> {
    store: B,
    prefix: String,
}

impl<B: BlobStore> BlobPageSink<B> {
    pub fn new(store: B, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    pub fn key_for(&self, page_number: u64) -> String {
        page_key(&self.prefix, page_number)
    }
}

#[async_trait]
impl<B: BlobStore> PageSink for BlobPageSink<B> {
    async fn write(&self, page_number: u64, raw_payload: Bytes) -> Result<(), SinkError> {
        self.store
            .put_object(&self.key_for(page_number), raw_payload)
            .await
            .map_err(|source| SinkError::Write {
                page_number,
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::memory::MemoryBlobStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn rewriting_a_page_overwrites() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let sink = BlobPageSink::new(blobs.clone(), "ads");

        sink.write(2, Bytes::from_static(b"first")).await.unwrap();
        sink.write(2, Bytes::from_static(b"second")).await.unwrap();

        assert_eq!(blobs.keys(), vec!["ads/2.json".to_string()]);
        assert_eq!(blobs.get("ads/2.json").unwrap(), "second");
    }

    #[tokio::test]
    async fn failure_names_the_page() {
        let blobs = Arc::new(MemoryBlobStore::new());
        blobs.fail_puts_matching("ads/");
        let sink = BlobPageSink::new(blobs, "ads");

        let err = sink.write(5, Bytes::from_static(b"x")).await.unwrap_err();
        assert!(matches!(err, SinkError::Write { page_number: 5, .. }));
    }
}
