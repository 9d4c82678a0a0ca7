//! In-memory connection used as the mock provider.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use skyshelf_common::{Error, ObjectPath, Result};
use crate::provider::{Connection, ObjectInfo, PutOptions};

/// Failure the mock should simulate on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Behave as if the provider cannot be reached.
    Unreachable,
    /// Behave as if the provider rejected the credentials.
    Unauthorized,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    info: ObjectInfo,
}

#[derive(Debug, Default)]
struct Directory {
    public: bool,
    objects: BTreeMap<String, StoredObject>,
}

/// In-memory connection.
///
/// Useful for testing and for dry runs. All data is stored in memory
/// and lost on drop. Clones share the same state, the way every mocked
/// client of one provider sees the same buckets.
#[derive(Clone, Default)]
pub struct MemoryConnection {
    directories: Arc<RwLock<HashMap<String, Directory>>>,
    fault: Arc<RwLock<Option<Fault>>>,
}

impl MemoryConnection {
    /// Create a new empty memory connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail with `fault`, or clear it with `None`.
    pub fn set_fault(&self, fault: Option<Fault>) {
        *self.fault.write().unwrap_or_else(|e| e.into_inner()) = fault;
    }

    /// Whether a directory currently exists.
    pub fn has_directory(&self, directory: &str) -> bool {
        self.read().contains_key(directory)
    }

    fn check_fault(&self) -> Result<()> {
        match *self.fault.read().unwrap_or_else(|e| e.into_inner()) {
            Some(Fault::Unreachable) => {
                Err(Error::Connection("Mock provider is unreachable".to_string()))
            }
            Some(Fault::Unauthorized) => {
                Err(Error::Auth("Mock provider rejected the credentials".to_string()))
            }
            None => Ok(()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Directory>> {
        self.directories.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Directory>> {
        self.directories.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_directory(&self, directory: &str, public: bool) -> Result<()> {
        self.check_fault()?;
        self.write()
            .entry(directory.to_string())
            .or_insert_with(|| Directory {
                public,
                objects: BTreeMap::new(),
            });
        Ok(())
    }

    async fn delete_directory(&self, directory: &str) -> Result<()> {
        self.check_fault()?;
        let mut directories = self.write();

        match directories.get(directory) {
            Some(dir) if !dir.objects.is_empty() => Err(Error::InvalidInput(format!(
                "Directory not empty: {}",
                directory
            ))),
            Some(_) => {
                directories.remove(directory);
                Ok(())
            }
            None => Err(Error::NotFound(format!("Directory not found: {}", directory))),
        }
    }

    async fn put_object(
        &self,
        directory: &str,
        path: &ObjectPath,
        data: Bytes,
        options: &PutOptions,
    ) -> Result<ObjectInfo> {
        self.check_fault()?;
        let mut directories = self.write();
        let dir = directories
            .get_mut(directory)
            .ok_or_else(|| Error::NotFound(format!("Directory not found: {}", directory)))?;

        let key = path.as_key();
        let info = ObjectInfo {
            key: key.clone(),
            size: data.len() as u64,
            last_modified: Utc::now(),
            etag: Some(Uuid::new_v4().to_string()),
            public: options.public || dir.public,
            attributes: options.attributes.clone(),
        };

        dir.objects.insert(
            key,
            StoredObject {
                data,
                info: info.clone(),
            },
        );

        Ok(info)
    }

    async fn get_object(&self, directory: &str, path: &ObjectPath) -> Result<Bytes> {
        self.check_fault()?;
        self.read()
            .get(directory)
            .and_then(|dir| dir.objects.get(&path.as_key()))
            .map(|object| object.data.clone())
            .ok_or_else(|| Error::NotFound(format!("Object not found: {}/{}", directory, path)))
    }

    async fn head_object(&self, directory: &str, path: &ObjectPath) -> Result<Option<ObjectInfo>> {
        self.check_fault()?;
        Ok(self
            .read()
            .get(directory)
            .and_then(|dir| dir.objects.get(&path.as_key()))
            .map(|object| object.info.clone()))
    }

    async fn delete_object(&self, directory: &str, path: &ObjectPath) -> Result<()> {
        self.check_fault()?;
        self.write()
            .get_mut(directory)
            .and_then(|dir| dir.objects.remove(&path.as_key()))
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("Object not found: {}/{}", directory, path)))
    }

    async fn list_objects(&self, directory: &str) -> Result<Vec<ObjectInfo>> {
        self.check_fault()?;
        let directories = self.read();
        let dir = directories
            .get(directory)
            .ok_or_else(|| Error::NotFound(format!("Directory not found: {}", directory)))?;

        Ok(dir.objects.values().map(|object| object.info.clone()).collect())
    }
}
