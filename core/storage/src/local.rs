//! Local filesystem connection.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::provider::{Connection, ObjectInfo, PutOptions};
use skyshelf_common::{Error, ObjectPath, Result};

/// Local filesystem connection.
///
/// Directories map to folders under `root` and objects to files below
/// them, so `uploads/bar.txt` in `bucket` lives at `root/bucket/uploads/bar.txt`.
pub struct LocalConnection {
    root: PathBuf,
}

impl LocalConnection {
    /// Create a new local connection with the given root directory.
    ///
    /// # Postconditions
    /// - Root directory is created if it doesn't exist
    ///
    /// # Errors
    /// - Permission denied
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        // Create root if it doesn't exist (sync for constructor)
        if !root.exists() {
            std::fs::create_dir_all(&root)?;
        }

        Ok(Self { root })
    }

    fn directory_path(&self, directory: &str) -> PathBuf {
        self.root.join(directory)
    }

    fn object_path(&self, directory: &str, path: &ObjectPath) -> PathBuf {
        let mut fs_path = self.directory_path(directory);
        for component in path.components() {
            fs_path.push(component);
        }
        fs_path
    }

    fn object_info(key: String, fs_meta: &std::fs::Metadata) -> ObjectInfo {
        let modified: DateTime<Utc> = fs_meta
            .modified()
            .map(|t| t.into())
            .unwrap_or_else(|_| Utc::now());

        ObjectInfo {
            key,
            size: fs_meta.len(),
            last_modified: modified,
            etag: Some(format!("{}-{}", modified.timestamp(), fs_meta.len())),
            public: false,
            attributes: BTreeMap::new(),
        }
    }

    async fn require_directory(&self, directory: &str) -> Result<PathBuf> {
        let dir_path = self.directory_path(directory);
        if !fs::try_exists(&dir_path).await? {
            return Err(Error::NotFound(format!("Directory not found: {}", directory)));
        }
        Ok(dir_path)
    }

    /// Remove now-empty folders between a deleted file and its directory.
    async fn prune_empty_parents(&self, dir_path: &Path, file_path: &Path) {
        let mut current = file_path.parent();
        while let Some(folder) = current {
            if folder == dir_path || !folder.starts_with(dir_path) {
                break;
            }
            if fs::remove_dir(folder).await.is_err() {
                break;
            }
            debug!(folder = %folder.display(), "Pruned empty folder");
            current = folder.parent();
        }
    }
}

fn not_found_or_io(e: std::io::Error, what: impl FnOnce() -> String) -> Error {
    if e.kind() == ErrorKind::NotFound {
        Error::NotFound(what())
    } else {
        Error::Io(e)
    }
}

#[async_trait]
impl Connection for LocalConnection {
    fn name(&self) -> &str {
        "local"
    }

    async fn create_directory(&self, directory: &str, _public: bool) -> Result<()> {
        fs::create_dir_all(self.directory_path(directory)).await?;
        Ok(())
    }

    async fn delete_directory(&self, directory: &str) -> Result<()> {
        let dir_path = self.require_directory(directory).await?;

        let mut entries = fs::read_dir(&dir_path).await?;
        if entries.next_entry().await?.is_some() {
            return Err(Error::InvalidInput(format!(
                "Directory not empty: {}",
                directory
            )));
        }

        fs::remove_dir(&dir_path).await?;
        Ok(())
    }

    async fn put_object(
        &self,
        directory: &str,
        path: &ObjectPath,
        data: Bytes,
        options: &PutOptions,
    ) -> Result<ObjectInfo> {
        self.require_directory(directory).await?;
        let fs_path = self.object_path(directory, path);

        if let Some(parent) = fs_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&fs_path, &data).await?;

        let fs_meta = fs::metadata(&fs_path).await?;
        let mut info = Self::object_info(path.as_key(), &fs_meta);
        info.attributes = options.attributes.clone();
        Ok(info)
    }

    async fn get_object(&self, directory: &str, path: &ObjectPath) -> Result<Bytes> {
        let fs_path = self.object_path(directory, path);

        if fs::metadata(&fs_path).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Err(Error::InvalidInput(format!("Not an object: {}", path)));
        }

        let data = fs::read(&fs_path)
            .await
            .map_err(|e| not_found_or_io(e, || format!("Object not found: {}/{}", directory, path)))?;
        Ok(Bytes::from(data))
    }

    async fn head_object(&self, directory: &str, path: &ObjectPath) -> Result<Option<ObjectInfo>> {
        let fs_path = self.object_path(directory, path);

        match fs::metadata(&fs_path).await {
            Ok(meta) if meta.is_file() => Ok(Some(Self::object_info(path.as_key(), &meta))),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn delete_object(&self, directory: &str, path: &ObjectPath) -> Result<()> {
        let dir_path = self.directory_path(directory);
        let fs_path = self.object_path(directory, path);

        fs::remove_file(&fs_path)
            .await
            .map_err(|e| not_found_or_io(e, || format!("Object not found: {}/{}", directory, path)))?;

        self.prune_empty_parents(&dir_path, &fs_path).await;
        Ok(())
    }

    async fn list_objects(&self, directory: &str) -> Result<Vec<ObjectInfo>> {
        let dir_path = self.require_directory(directory).await?;

        let mut results = Vec::new();
        let mut pending = vec![(dir_path, Vec::<String>::new())];

        while let Some((folder, prefix)) = pending.pop() {
            let mut entries = fs::read_dir(&folder).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().to_string();
                let mut components = prefix.clone();
                components.push(name);

                let fs_meta = entry.metadata().await?;
                if fs_meta.is_dir() {
                    pending.push((entry.path(), components));
                } else {
                    results.push(Self::object_info(components.join("/"), &fs_meta));
                }
            }
        }

        results.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(results)
    }
}
