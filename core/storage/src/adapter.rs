//! The uniform storage adapter.

use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use skyshelf_common::{Error, ObjectPath, Result};

use crate::credentials::{Credentials, ProviderConfig};
use crate::file::StoredFile;
use crate::provider::{Connection, Provider, PutOptions};
use crate::registry::{open_connection, ConnectionMode};
use crate::uploader::Uploader;

/// Characters left as-is in URL path segments (RFC 3986 unreserved).
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Store, retrieve, delete and address objects on one provider.
///
/// Cloning is cheap; clones share the connection and the set of
/// directories already prepared for writes.
#[derive(Clone)]
pub struct StorageAdapter {
    config: ProviderConfig,
    connection: Arc<dyn Connection>,
    prepared: Arc<Mutex<HashSet<String>>>,
}

impl StorageAdapter {
    /// Wrap an existing connection.
    pub fn new(config: ProviderConfig, connection: Arc<dyn Connection>) -> Self {
        Self {
            config,
            connection,
            prepared: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Open the connection for `config` and wrap it.
    ///
    /// # Errors
    /// - No client available for the provider in this mode
    /// - Connection setup failed
    pub async fn connect(config: ProviderConfig, mode: ConnectionMode) -> Result<Self> {
        let connection = open_connection(&config, mode).await?;
        Ok(Self::new(config, connection))
    }

    pub fn provider(&self) -> Provider {
        self.config.provider()
    }

    /// Configuration this adapter was built with.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// The shared provider connection.
    pub fn connection(&self) -> Arc<dyn Connection> {
        Arc::clone(&self.connection)
    }

    /// Upload `file` to `path`.
    ///
    /// `config` carries the per-call settings: target directory, visibility,
    /// host for URLs and extra attributes. It must be for the same provider.
    ///
    /// # Postconditions
    /// - Object exists at `path`, replacing any earlier version
    ///
    /// # Errors
    /// - `Error::Connection` if the provider is unreachable
    /// - `Error::Auth` if the credentials are rejected
    /// - `Error::InvalidInput` for a bad path or a config for another provider
    pub async fn store(
        &self,
        file: impl Into<Bytes>,
        path: &str,
        config: &ProviderConfig,
    ) -> Result<StoredFile> {
        if config.provider() != self.provider() {
            return Err(Error::InvalidInput(format!(
                "Adapter for {} cannot store with a {} configuration",
                self.provider(),
                config.provider()
            )));
        }

        let object_path = ObjectPath::parse(path)?;
        let data: Bytes = file.into();
        let size = data.len() as u64;

        self.prepare_directory(config.directory(), config.is_public())
            .await?;

        let options = PutOptions {
            public: config.is_public(),
            attributes: config.attributes().clone(),
        };
        let directory = config.directory();
        match self
            .connection
            .put_object(directory, &object_path, data.clone(), &options)
            .await
        {
            Ok(_) => {}
            // The directory was removed behind our back; recreate it once.
            Err(e) if e.is_not_found() => {
                debug!(provider = %self.provider(), directory, "Directory vanished, recreating");
                self.prepared.lock().await.remove(directory);
                self.prepare_directory(directory, config.is_public()).await?;
                self.connection
                    .put_object(directory, &object_path, data.clone(), &options)
                    .await?;
            }
            Err(e) => return Err(e),
        }

        info!(
            provider = %self.provider(),
            directory = config.directory(),
            key = %object_path,
            size,
            "Stored object"
        );

        Ok(StoredFile::new(
            self.clone(),
            config.clone(),
            object_path,
            Some(size),
            Some(data),
        ))
    }

    /// Get a handle to the object at `path` in this adapter's directory.
    ///
    /// The size is looked up now; content is fetched on first read.
    ///
    /// # Errors
    /// - `Error::NotFound` if there is no object at `path`
    pub async fn retrieve(&self, path: &str) -> Result<StoredFile> {
        let object_path = ObjectPath::parse(path)?;
        let directory = self.config.directory();

        let info = self
            .connection
            .head_object(directory, &object_path)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("Object not found: {}/{}", directory, object_path))
            })?;

        debug!(directory, key = %object_path, size = info.size, "Retrieved object");

        Ok(StoredFile::new(
            self.clone(),
            self.config.clone(),
            object_path,
            Some(info.size),
            None,
        ))
    }

    /// Delete the object at `path`. Succeeds if it is already gone.
    ///
    /// # Errors
    /// - `Error::Connection` on provider failure
    pub async fn delete(&self, path: &str) -> Result<()> {
        let object_path = ObjectPath::parse(path)?;
        self.delete_in(self.config.directory(), &object_path).await
    }

    /// Public URL for `path`, if it has one.
    ///
    /// Private configurations have none. A configured host always wins;
    /// otherwise the provider's own URL scheme applies.
    pub fn public_url(&self, path: &str, config: &ProviderConfig) -> Option<String> {
        if !config.is_public() {
            return None;
        }

        let object_path = ObjectPath::parse(path).ok()?;
        let key = object_path.as_key();

        if let Some(host) = config.host() {
            return Some(format!("{}/{}", host, key));
        }

        if !config.provider().supports_public_urls() {
            return None;
        }

        let encoded = object_path
            .components()
            .iter()
            .map(|c| utf8_percent_encode(c, SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/");
        let directory = config.directory();

        match config.credentials() {
            Credentials::Aws(_) if is_dns_compatible_bucket(directory) => {
                Some(format!("https://{}.s3.amazonaws.com/{}", directory, encoded))
            }
            Credentials::Aws(_) => Some(format!(
                "https://s3.amazonaws.com/{}/{}",
                directory, encoded
            )),
            Credentials::Google(_) => Some(format!(
                "https://commondatastorage.googleapis.com/{}/{}",
                directory, encoded
            )),
            Credentials::Rackspace(rackspace) => rackspace
                .cdn_url
                .as_deref()
                .map(|cdn| format!("{}/{}", cdn.trim_end_matches('/'), encoded)),
            Credentials::Local(_) => None,
        }
    }

    /// Store `file` under the uploader's path for `identifier`.
    pub async fn store_for(
        &self,
        uploader: &dyn Uploader,
        identifier: &str,
        file: impl Into<Bytes>,
    ) -> Result<StoredFile> {
        let path = uploader.store_path(identifier);
        self.store(file, &path, &self.config).await
    }

    /// Retrieve the object the uploader stores for `identifier`.
    pub async fn retrieve_for(&self, uploader: &dyn Uploader, identifier: &str) -> Result<StoredFile> {
        self.retrieve(&uploader.store_path(identifier)).await
    }

    pub(crate) async fn delete_in(&self, directory: &str, path: &ObjectPath) -> Result<()> {
        match self.connection.delete_object(directory, path).await {
            Ok(()) => {
                info!(provider = %self.provider(), directory, key = %path, "Deleted object");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!(directory, key = %path, "Delete of missing object ignored");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn prepare_directory(&self, directory: &str, public: bool) -> Result<()> {
        let mut prepared = self.prepared.lock().await;
        if prepared.contains(directory) {
            return Ok(());
        }

        self.connection.create_directory(directory, public).await?;
        debug!(provider = %self.provider(), directory, "Directory ready");
        prepared.insert(directory.to_string());
        Ok(())
    }
}

/// Whether `name` can be used as a virtual-hosted S3 bucket subdomain.
///
/// 3 to 63 characters of lowercase letters, digits, dots and hyphens,
/// starting and ending with a letter or digit, with no empty or
/// hyphen-edged labels and not shaped like an IPv4 address.
pub fn is_dns_compatible_bucket(name: &str) -> bool {
    if !(3..=63).contains(&name.len()) {
        return false;
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'.' || b == b'-')
    {
        return false;
    }

    let labels: Vec<&str> = name.split('.').collect();
    let labels_ok = labels
        .iter()
        .all(|label| !label.is_empty() && !label.starts_with('-') && !label.ends_with('-'));
    if !labels_ok {
        return false;
    }

    let looks_like_ip = labels.len() == 4
        && labels
            .iter()
            .all(|label| label.len() <= 3 && label.bytes().all(|b| b.is_ascii_digit()));
    !looks_like_ip
}
