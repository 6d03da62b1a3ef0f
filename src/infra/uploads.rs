//! Image blob storage.
//!
//! The core persists URL references only; the bytes live behind
//! [`ImageStore`]. The bundled implementation writes to a local media
//! directory served as static files, which is enough for single-node
//! deployments.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::instrument;
use uuid::Uuid;

use super::error::InfraError;

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Stores the bytes and returns the public URL to persist.
    async fn store(&self, bytes: Bytes, content_type: &str) -> Result<String, InfraError>;

    /// Removes a previously stored image. Unknown URLs are a no-op.
    async fn remove(&self, url: &str) -> Result<(), InfraError>;
}

/// Stores images under a local directory, served under a URL prefix.
pub struct FsImageStore {
    media_dir: PathBuf,
    url_prefix: String,
}

impl FsImageStore {
    pub fn new(media_dir: PathBuf, url_prefix: impl Into<String>) -> Self {
        Self {
            media_dir,
            url_prefix: url_prefix.into(),
        }
    }

    fn extension_for(content_type: &str) -> Result<&'static str, InfraError> {
        match content_type {
            "image/png" => Ok("png"),
            "image/jpeg" => Ok("jpg"),
            "image/webp" => Ok("webp"),
            "image/gif" => Ok("gif"),
            "image/svg+xml" => Ok("svg"),
            other => Err(InfraError::upstream(format!(
                "unsupported image content type: {other}"
            ))),
        }
    }

    /// Maps a public URL back to a file name, rejecting anything that is
    /// not a bare name under the prefix.
    fn file_name_for<'a>(&self, url: &'a str) -> Option<&'a str> {
        let name = url.strip_prefix(&self.url_prefix)?.trim_start_matches('/');
        if name.is_empty() || name.contains('/') || name.contains("..") {
            return None;
        }
        Some(name)
    }
}

#[async_trait]
impl ImageStore for FsImageStore {
    #[instrument(skip(self, bytes))]
    async fn store(&self, bytes: Bytes, content_type: &str) -> Result<String, InfraError> {
        let extension = Self::extension_for(content_type)?;
        let file_name = format!("{}.{extension}", Uuid::new_v4());

        tokio::fs::create_dir_all(&self.media_dir).await?;
        tokio::fs::write(self.media_dir.join(&file_name), &bytes).await?;

        Ok(format!("{}/{file_name}", self.url_prefix))
    }

    #[instrument(skip(self))]
    async fn remove(&self, url: &str) -> Result<(), InfraError> {
        let Some(file_name) = self.file_name_for(url) else {
            return Ok(());
        };
        match tokio::fs::remove_file(self.media_dir.join(file_name)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
