use crate::{blob::BlobStore, error::BlobError};
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

#[derive(Default)]
struct Inner {
    objects: HashMap<String, Bytes>,
    puts: HashMap<String, usize>,
    failing: Vec<String>,
}

/// In-process blob store.
///
/// Besides backing tests and dry runs, it can be told to reject writes for
/// keys under a prefix, which is how write-failure policies are exercised.
#[derive(Default)]
pub struct MemoryBlobStore {
    inner: Mutex<Inner>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every `put_object` whose key starts with `prefix` fail.
    pub fn fail_puts_matching(&self, prefix: impl Into<String>) {
        self.lock().failing.push(prefix.into());
    }

    pub fn clear_failures(&self) {
        self.lock().failing.clear();
    }

    /// Stores an object directly, bypassing failure injection.
    pub fn insert(&self, key: impl Into<String>, bytes: impl Into<Bytes>) {
        self.lock().objects.insert(key.into(), bytes.into());
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.lock().objects.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().objects.contains_key(key)
    }

    /// Sorted keys of every stored object.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().objects.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Successful writes to `key` so far.
    pub fn put_count(&self, key: &str) -> usize {
        self.lock().puts.get(key).copied().unwrap_or(0)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put_object(&self, key: &str, bytes: Bytes) -> Result<(), BlobError> {
        let mut inner = self.lock();

        if inner.failing.iter().any(|p| key.starts_with(p.as_str())) {
            return Err(BlobError::Injected(key.to_string()));
        }

        inner.objects.insert(key.to_string(), bytes);
        *inner.puts.entry(key.to_string()).or_default() += 1;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, BlobError> {
        self.lock()
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(key.to_string()))
    }
}
