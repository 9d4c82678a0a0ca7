//! Credential resolution: which providers can be used, and how.

use std::collections::BTreeMap;
use tracing::{debug, warn};

use skyshelf_common::{Error, Result};

use crate::credentials::{Credentials, ProviderConfig};
use crate::provider::Provider;
use crate::registry::ConnectionMode;

/// Providers exercised against the in-memory mock.
const MOCK_PROVIDERS: [Provider; 2] = [Provider::Aws, Provider::Google];

/// Turns loose credential sets into validated provider configurations.
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    mode: ConnectionMode,
    directory: String,
    host: Option<String>,
    public: bool,
    attributes: BTreeMap<String, String>,
}

impl CredentialResolver {
    /// Resolver targeting `directory`, public, without a custom host.
    pub fn new(mode: ConnectionMode, directory: impl Into<String>) -> Self {
        Self {
            mode,
            directory: directory.into(),
            host: None,
            public: true,
            attributes: BTreeMap::new(),
        }
    }

    /// # Errors
    /// - Host is not an absolute URL
    pub fn with_host(mut self, host: impl Into<String>) -> Result<Self> {
        let host = host.into();
        url::Url::parse(&host)
            .map_err(|e| Error::InvalidInput(format!("Invalid host '{}': {}", host, e)))?;
        self.host = Some(host);
        Ok(self)
    }

    pub fn with_public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn mode(&self) -> ConnectionMode {
        self.mode
    }

    /// Configurations for every provider `source` fully covers, in
    /// provider order.
    ///
    /// In mock mode the source is ignored and AWS and Google are returned
    /// with placeholder credentials. Incomplete credential sets are skipped.
    pub fn resolve(&self, source: &BTreeMap<String, String>) -> Vec<ProviderConfig> {
        let mut configs = Vec::new();

        for provider in Provider::ALL {
            let credentials = match self.mode {
                ConnectionMode::Mock if MOCK_PROVIDERS.contains(&provider) => {
                    Credentials::from_map(provider, &placeholder_credentials(provider))
                }
                ConnectionMode::Mock => continue,
                ConnectionMode::Live => match select_credentials(provider, source) {
                    Some(selected) => Credentials::from_map(provider, &selected),
                    None => continue,
                },
            };

            match credentials.and_then(|c| self.build_config(c)) {
                Ok(config) => configs.push(config),
                Err(e) => warn!(%provider, error = %e, "Skipping provider"),
            }
        }

        debug!(count = configs.len(), mode = ?self.mode, "Resolved providers");
        configs
    }

    fn build_config(&self, credentials: Credentials) -> Result<ProviderConfig> {
        let mut config = ProviderConfig::new(credentials, self.directory.clone())?
            .with_public(self.public);
        if let Some(host) = &self.host {
            config = config.with_host(host.clone())?;
        }
        for (key, value) in &self.attributes {
            config = config.with_attribute(key.clone(), value.clone());
        }
        Ok(config)
    }
}

/// Every key mapped to its own name, as the mock accepts anything.
fn placeholder_credentials(provider: Provider) -> BTreeMap<String, String> {
    provider
        .required_keys()
        .iter()
        .map(|key| (key.to_string(), key.to_string()))
        .collect()
}

/// The subset of `source` relevant to `provider`, if it is complete.
fn select_credentials(
    provider: Provider,
    source: &BTreeMap<String, String>,
) -> Option<BTreeMap<String, String>> {
    let present = |key: &str| source.get(key).map(|v| !v.is_empty()).unwrap_or(false);

    let required = provider.required_keys();
    let found = required.iter().filter(|key| present(key)).count();
    if found < required.len() {
        if found > 0 {
            debug!(%provider, found, required = required.len(), "Partial credentials skipped");
        }
        return None;
    }

    Some(
        required
            .iter()
            .chain(provider.optional_keys())
            .filter(|key| present(key))
            .map(|key| (key.to_string(), source[*key].clone()))
            .collect(),
    )
}
