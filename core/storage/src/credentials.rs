//! Typed per-provider credentials and the provider configuration.

use std::collections::BTreeMap;

use skyshelf_common::{Error, Result, Secret};

use crate::provider::Provider;

/// Amazon S3 credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: Secret,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services.
    pub endpoint: Option<String>,
}

/// Google Cloud Storage interoperability (HMAC) credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleCredentials {
    pub access_key_id: String,
    pub secret_access_key: Secret,
}

/// Local filesystem "credentials": just the storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCredentials {
    pub root: String,
}

/// Rackspace Cloud Files credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RackspaceCredentials {
    pub username: String,
    pub api_key: Secret,
    /// CDN base used for public URLs.
    pub cdn_url: Option<String>,
}

/// Credentials for exactly one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Aws(AwsCredentials),
    Google(GoogleCredentials),
    Local(LocalCredentials),
    Rackspace(RackspaceCredentials),
}

impl Credentials {
    /// Build credentials for `provider` from a loose key/value map.
    ///
    /// # Errors
    /// - `Error::Auth` naming the first required key that is missing or empty
    pub fn from_map(provider: Provider, map: &BTreeMap<String, String>) -> Result<Self> {
        let required = |key: &str| -> Result<String> {
            map.get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| {
                    Error::Auth(format!(
                        "{} credentials are missing '{}'",
                        provider.name(),
                        key
                    ))
                })
        };
        let optional = |key: &str| map.get(key).filter(|v| !v.is_empty()).cloned();

        let credentials = match provider {
            Provider::Aws => Credentials::Aws(AwsCredentials {
                access_key_id: required("aws_access_key_id")?,
                secret_access_key: Secret::new(required("aws_secret_access_key")?),
                region: optional("aws_region"),
                endpoint: optional("aws_endpoint"),
            }),
            Provider::Google => Credentials::Google(GoogleCredentials {
                access_key_id: required("google_storage_access_key_id")?,
                secret_access_key: Secret::new(required("google_storage_secret_access_key")?),
            }),
            Provider::Local => Credentials::Local(LocalCredentials {
                root: required("local_root")?,
            }),
            Provider::Rackspace => Credentials::Rackspace(RackspaceCredentials {
                username: required("rackspace_username")?,
                api_key: Secret::new(required("rackspace_api_key")?),
                cdn_url: optional("rackspace_cdn_url"),
            }),
        };

        Ok(credentials)
    }

    /// The provider these credentials belong to.
    pub fn provider(&self) -> Provider {
        match self {
            Credentials::Aws(_) => Provider::Aws,
            Credentials::Google(_) => Provider::Google,
            Credentials::Local(_) => Provider::Local,
            Credentials::Rackspace(_) => Provider::Rackspace,
        }
    }
}

/// Everything needed to talk to one provider on behalf of an uploader.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    credentials: Credentials,
    directory: String,
    host: Option<String>,
    public: bool,
    attributes: BTreeMap<String, String>,
}

impl ProviderConfig {
    /// Create a configuration targeting `directory`, public by default.
    ///
    /// # Errors
    /// - Directory is empty or contains a separator
    pub fn new(credentials: Credentials, directory: impl Into<String>) -> Result<Self> {
        let directory = directory.into();
        if directory.is_empty() {
            return Err(Error::InvalidInput("Directory cannot be empty".to_string()));
        }
        if directory.contains('/') || directory.contains('\\') {
            return Err(Error::InvalidInput(format!(
                "Directory cannot contain separators: {}",
                directory
            )));
        }
        if directory == "." || directory == ".." {
            return Err(Error::InvalidInput(format!(
                "Directory cannot be {:?}",
                directory
            )));
        }

        Ok(Self {
            credentials,
            directory,
            host: None,
            public: true,
            attributes: BTreeMap::new(),
        })
    }

    /// Root public URLs at a custom host such as `http://cdn.example.com`.
    ///
    /// # Errors
    /// - Host is not an absolute URL
    pub fn with_host(mut self, host: impl Into<String>) -> Result<Self> {
        let host = host.into();
        url::Url::parse(&host)
            .map_err(|e| Error::InvalidInput(format!("Invalid host '{}': {}", host, e)))?;
        self.host = Some(host.trim_end_matches('/').to_string());
        Ok(self)
    }

    /// Drop any custom host.
    pub fn without_host(mut self) -> Self {
        self.host = None;
        self
    }

    /// Mark stored objects public or private.
    pub fn with_public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    /// Add an attribute forwarded with every upload.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn provider(&self) -> Provider {
        self.credentials.provider()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn is_public(&self) -> bool {
        self.public
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }
}
