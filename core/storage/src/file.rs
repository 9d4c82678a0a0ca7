//! Handle to one stored object.

use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::debug;

use skyshelf_common::{Error, ObjectPath, Result};

use crate::adapter::StorageAdapter;
use crate::credentials::ProviderConfig;

/// A stored object, addressed by path within its directory.
///
/// The handle keeps the adapter it came from for lazy lookups. Size and
/// content are cached after the first fetch and are not refreshed.
pub struct StoredFile {
    adapter: StorageAdapter,
    config: ProviderConfig,
    path: ObjectPath,
    key: String,
    size: RwLock<Option<u64>>,
    content: RwLock<Option<Bytes>>,
}

impl StoredFile {
    pub(crate) fn new(
        adapter: StorageAdapter,
        config: ProviderConfig,
        path: ObjectPath,
        size: Option<u64>,
        content: Option<Bytes>,
    ) -> Self {
        let key = path.as_key();
        Self {
            adapter,
            config,
            path,
            key,
            size: RwLock::new(size),
            content: RwLock::new(content),
        }
    }

    /// Key of the object, e.g. `uploads/bar.txt`.
    pub fn path(&self) -> &str {
        &self.key
    }

    pub fn object_path(&self) -> &ObjectPath {
        &self.path
    }

    /// Directory (bucket) holding the object.
    pub fn directory(&self) -> &str {
        self.config.directory()
    }

    pub fn is_public(&self) -> bool {
        self.config.is_public()
    }

    /// Object length as of the last fetch.
    ///
    /// # Errors
    /// - `Error::NotFound` if the object is gone and no size is cached
    pub async fn size(&self) -> Result<u64> {
        if let Some(size) = *self.size.read().await {
            return Ok(size);
        }

        let info = self
            .adapter
            .connection()
            .head_object(self.directory(), &self.path)
            .await?
            .ok_or_else(|| self.not_found())?;

        *self.size.write().await = Some(info.size);
        Ok(info.size)
    }

    /// Object content, fetched once and then served from cache.
    ///
    /// # Errors
    /// - `Error::NotFound` if the object is gone and nothing is cached
    pub async fn read(&self) -> Result<Bytes> {
        if let Some(content) = self.content.read().await.as_ref() {
            debug!(key = %self.key, "Serving cached content");
            return Ok(content.clone());
        }

        let data = self
            .adapter
            .connection()
            .get_object(self.directory(), &self.path)
            .await?;

        *self.size.write().await = Some(data.len() as u64);
        *self.content.write().await = Some(data.clone());
        Ok(data)
    }

    /// Whether the object currently exists remotely.
    pub async fn exists(&self) -> Result<bool> {
        Ok(self
            .adapter
            .connection()
            .head_object(self.directory(), &self.path)
            .await?
            .is_some())
    }

    /// Delete the object. Later `read` and `size` calls fail with `NotFound`.
    pub async fn delete(&self) -> Result<()> {
        self.adapter.delete_in(self.directory(), &self.path).await?;
        *self.size.write().await = None;
        *self.content.write().await = None;
        Ok(())
    }

    /// Public URL under the configuration this handle was created with.
    pub fn public_url(&self) -> Option<String> {
        self.adapter.public_url(&self.key, &self.config)
    }

    fn not_found(&self) -> Error {
        Error::NotFound(format!("Object not found: {}/{}", self.directory(), self.key))
    }
}

impl std::fmt::Debug for StoredFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredFile")
            .field("provider", &self.adapter.provider())
            .field("directory", &self.directory())
            .field("path", &self.key)
            .field("public", &self.is_public())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{Credentials, GoogleCredentials};
    use crate::memory::MemoryConnection;
    use crate::provider::Connection;
    use skyshelf_common::Secret;
    use std::sync::Arc;

    fn adapter() -> (StorageAdapter, MemoryConnection) {
        let config = ProviderConfig::new(
            Credentials::Google(GoogleCredentials {
                access_key_id: "id".to_string(),
                secret_access_key: Secret::new("secret"),
            }),
            "bucket",
        )
        .unwrap();
        let conn = MemoryConnection::new();
        (StorageAdapter::new(config, Arc::new(conn.clone())), conn)
    }

    #[tokio::test]
    async fn test_read_uses_cache_after_store() {
        let (adapter, conn) = adapter();
        let file = adapter
            .store(&b"this is stuff"[..], "uploads/bar.txt", adapter.config())
            .await
            .unwrap();

        // Remove behind the handle's back: cached content still answers.
        conn.delete_object("bucket", file.object_path()).await.unwrap();
        assert_eq!(&file.read().await.unwrap()[..], b"this is stuff");
        assert_eq!(file.size().await.unwrap(), 13);
        assert!(!file.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_size_is_not_live() {
        let (adapter, _) = adapter();
        let config = adapter.config().clone();
        adapter.store(&b"short"[..], "a.txt", &config).await.unwrap();

        let file = adapter.retrieve("a.txt").await.unwrap();
        adapter.store(&b"much longer"[..], "a.txt", &config).await.unwrap();

        assert_eq!(file.size().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_delete_then_read_fails() {
        let (adapter, _) = adapter();
        let file = adapter
            .store(&b"this is stuff"[..], "uploads/bar.txt", adapter.config())
            .await
            .unwrap();

        file.delete().await.unwrap();

        assert!(file.read().await.unwrap_err().is_not_found());
        assert!(file.size().await.unwrap_err().is_not_found());
        assert!(adapter.retrieve("uploads/bar.txt").await.unwrap_err().is_not_found());
        file.delete().await.unwrap();
    }

    #[tokio::test]
    async fn test_public_url_follows_handle_config() {
        let (adapter, _) = adapter();
        let private = adapter.config().clone().with_public(false);

        let file = adapter.store(&b"x"[..], "a.txt", &private).await.unwrap();
        assert!(!file.is_public());
        assert!(file.public_url().is_none());

        let public = adapter.store(&b"x"[..], "b.txt", adapter.config()).await.unwrap();
        assert_eq!(
            public.public_url().as_deref(),
            Some("https://commondatastorage.googleapis.com/bucket/b.txt")
        );
    }
}
