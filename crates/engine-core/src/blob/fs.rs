use crate::{blob::BlobStore, error::BlobError};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt};

/// Blob store over a local directory.
///
/// Each object is a file under `root`. Writes land in a temporary sibling
/// and are renamed into place, so a crash mid-write never leaves a truncated
/// object behind.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, BlobError> {
        let rel = Path::new(key);
        let is_plain = !key.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !is_plain {
            return Err(BlobError::InvalidKey(key.to_string()));
        }

        Ok(self.root.join(rel))
    }

    async fn replace(tmp: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = fs::File::create(tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(tmp, path).await
    }

    /// Makes the rename itself durable.
    #[cfg(unix)]
    async fn sync_dir(dir: &Path) -> std::io::Result<()> {
        fs::File::open(dir).await?.sync_all().await
    }

    #[cfg(not(unix))]
    async fn sync_dir(_dir: &Path) -> std::io::Result<()> {
        Ok(())
    }

    fn io_err(key: &str) -> impl FnOnce(std::io::Error) -> BlobError + '_ {
        move |source| BlobError::Io {
            key: key.to_string(),
            source,
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put_object(&self, key: &str, bytes: Bytes) -> Result<(), BlobError> {
        let path = self.path_for(key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(Self::io_err(key))?;
        }

        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);

        if let Err(e) = Self::replace(&tmp, &path, &bytes).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(Self::io_err(key)(e));
        }

        if let Some(parent) = path.parent() {
            Self::sync_dir(parent).await.map_err(Self::io_err(key))?;
        }

        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, BlobError> {
        let path = self.path_for(key)?;

        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(key.to_string()))
            }
            Err(e) => Err(Self::io_err(key)(e)),
        }
    }
}
