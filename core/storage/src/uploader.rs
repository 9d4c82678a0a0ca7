//! Mapping from uploader identifiers to object paths.

/// The uploader side of a store: decides where an identifier lives.
pub trait Uploader: Send + Sync {
    /// Directory prefix for stored files.
    fn store_dir(&self) -> &str {
        "uploads"
    }

    /// Full object path for `identifier`.
    fn store_path(&self, identifier: &str) -> String {
        let dir = self.store_dir().trim_matches('/');
        if dir.is_empty() {
            identifier.to_string()
        } else {
            format!("{}/{}", dir, identifier)
        }
    }
}

/// Uploader that stores everything under one fixed prefix.
#[derive(Debug, Clone)]
pub struct DirectoryUploader {
    store_dir: String,
}

impl DirectoryUploader {
    pub fn new(store_dir: impl Into<String>) -> Self {
        Self {
            store_dir: store_dir.into(),
        }
    }
}

impl Default for DirectoryUploader {
    fn default() -> Self {
        Self::new("uploads")
    }
}

impl Uploader for DirectoryUploader {
    fn store_dir(&self) -> &str {
        &self.store_dir
    }
}
