//! Provider catalogue and the connection capability trait.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use skyshelf_common::{Error, ObjectPath, Result};

/// Supported storage providers.
///
/// The set is closed: adding a provider means adding a variant here,
/// a credentials struct, and a connection for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    Aws,
    Google,
    Local,
    Rackspace,
}

impl Provider {
    /// All providers, in resolution order.
    pub const ALL: [Provider; 4] = [
        Provider::Aws,
        Provider::Google,
        Provider::Local,
        Provider::Rackspace,
    ];

    /// Display name, as used in credential files.
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Aws => "AWS",
            Provider::Google => "Google",
            Provider::Local => "Local",
            Provider::Rackspace => "Rackspace",
        }
    }

    /// Credential keys that must be present to use this provider.
    pub fn required_keys(&self) -> &'static [&'static str] {
        match self {
            Provider::Aws => &["aws_access_key_id", "aws_secret_access_key"],
            Provider::Google => &[
                "google_storage_access_key_id",
                "google_storage_secret_access_key",
            ],
            Provider::Local => &["local_root"],
            Provider::Rackspace => &["rackspace_api_key", "rackspace_username"],
        }
    }

    /// Credential keys picked up when present.
    pub fn optional_keys(&self) -> &'static [&'static str] {
        match self {
            Provider::Aws => &["aws_region", "aws_endpoint"],
            Provider::Google => &[],
            Provider::Local => &[],
            Provider::Rackspace => &["rackspace_cdn_url"],
        }
    }

    /// Whether objects on this provider can be reached over a public URL
    /// without a custom host.
    pub fn supports_public_urls(&self) -> bool {
        !matches!(self, Provider::Local)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Provider::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidInput(format!("Unknown provider: {}", s)))
    }
}

/// Metadata for a stored object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Object key within its directory.
    pub key: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
    /// ETag or revision ID.
    pub etag: Option<String>,
    /// Whether the object is publicly readable.
    pub public: bool,
    /// Extra attributes stored with the object (content type, cache control, ...).
    pub attributes: BTreeMap<String, String>,
}

/// Per-upload options forwarded to the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    pub public: bool,
    pub attributes: BTreeMap<String, String>,
}

/// Capability interface to a provider client.
///
/// Implementations own their network or filesystem handle and translate
/// provider failures into the common error taxonomy:
/// `Auth` for rejected credentials, `Connection` for transport failures,
/// `NotFound` for missing objects or directories.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the connection name (e.g., "memory", "local", "s3").
    fn name(&self) -> &str;

    /// Create a directory (bucket). Succeeds if it already exists.
    async fn create_directory(&self, directory: &str, public: bool) -> Result<()>;

    /// Delete an empty directory.
    ///
    /// # Errors
    /// - Directory not found
    /// - Directory not empty
    async fn delete_directory(&self, directory: &str) -> Result<()>;

    /// Write an object, replacing any previous content at the same key.
    ///
    /// # Errors
    /// - Directory not found
    /// - Network/I/O errors
    /// - Authentication errors
    async fn put_object(
        &self,
        directory: &str,
        path: &ObjectPath,
        data: Bytes,
        options: &PutOptions,
    ) -> Result<ObjectInfo>;

    /// Read an object's content.
    ///
    /// # Errors
    /// - Object not found
    async fn get_object(&self, directory: &str, path: &ObjectPath) -> Result<Bytes>;

    /// Look up an object's metadata, `None` when absent.
    async fn head_object(&self, directory: &str, path: &ObjectPath) -> Result<Option<ObjectInfo>>;

    /// Delete an object.
    ///
    /// # Errors
    /// - Object not found (callers decide whether that matters)
    async fn delete_object(&self, directory: &str, path: &ObjectPath) -> Result<()>;

    /// List all objects in a directory.
    async fn list_objects(&self, directory: &str) -> Result<Vec<ObjectInfo>>;
}
