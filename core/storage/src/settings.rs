//! Environment-driven settings and credential file loading.

use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tracing::debug;

use skyshelf_common::{Error, Result};

use crate::provider::Provider;
use crate::registry::ConnectionMode;
use crate::resolver::CredentialResolver;

pub const ENV_MOCK: &str = "SKYSHELF_MOCK";
pub const ENV_DIRECTORY: &str = "SKYSHELF_DIRECTORY";
pub const ENV_HOST: &str = "SKYSHELF_HOST";
pub const ENV_PUBLIC: &str = "SKYSHELF_PUBLIC";
pub const ENV_CREDENTIALS: &str = "SKYSHELF_CREDENTIALS";
pub const ENV_CREDENTIAL_GROUP: &str = "SKYSHELF_CREDENTIAL_GROUP";

const DEFAULT_GROUP: &str = "skyshelf";
const DEFAULT_CREDENTIALS_FILE: &str = ".skyshelf.json";

/// Runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub mode: ConnectionMode,
    /// Directory (bucket) name shared by every provider.
    pub directory: String,
    pub host: Option<String>,
    pub public: bool,
    pub credentials_path: Option<PathBuf>,
    pub credential_group: String,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`.
    ///
    /// Mock mode is the default; only `SKYSHELF_MOCK=false` goes live.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mode = match lookup(ENV_MOCK).as_deref() {
            Some("false") => ConnectionMode::Live,
            _ => ConnectionMode::Mock,
        };

        let directory = lookup(ENV_DIRECTORY)
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| format!("skyshelf{}", Utc::now().timestamp()));

        let public = !matches!(lookup(ENV_PUBLIC).as_deref(), Some("false"));

        let credentials_path = lookup(ENV_CREDENTIALS)
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(DEFAULT_CREDENTIALS_FILE)));

        Self {
            mode,
            directory,
            host: lookup(ENV_HOST).filter(|h| !h.is_empty()),
            public,
            credentials_path,
            credential_group: lookup(ENV_CREDENTIAL_GROUP)
                .unwrap_or_else(|| DEFAULT_GROUP.to_string()),
        }
    }

    /// Build the credential resolver these settings describe.
    ///
    /// # Errors
    /// - Host is not an absolute URL
    pub fn resolver(&self) -> Result<CredentialResolver> {
        let mut resolver = CredentialResolver::new(self.mode, self.directory.clone())
            .with_public(self.public);
        if let Some(host) = &self.host {
            resolver = resolver.with_host(host.clone())?;
        }
        Ok(resolver)
    }
}

/// Load the flat credential map for `settings`.
///
/// Reads the configured group from the JSON credentials file, then lets
/// upper-cased environment variables (`AWS_ACCESS_KEY_ID`, ...) override
/// individual keys. A missing file is treated as empty.
///
/// # Errors
/// - `Error::Serialization` if the file is not a JSON object of string maps
/// - `Error::Io` if the file exists but cannot be read
pub fn load_credentials(
    settings: &Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<BTreeMap<String, String>> {
    let mut credentials = match &settings.credentials_path {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(text) => parse_credentials_group(&text, &settings.credential_group)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No credentials file");
                BTreeMap::new()
            }
            Err(e) => return Err(Error::Io(e)),
        },
        None => BTreeMap::new(),
    };

    for provider in Provider::ALL {
        for key in provider
            .required_keys()
            .iter()
            .chain(provider.optional_keys())
        {
            if let Some(value) = lookup(&key.to_ascii_uppercase()).filter(|v| !v.is_empty()) {
                debug!(key, "Credential taken from environment");
                credentials.insert(key.to_string(), value);
            }
        }
    }

    Ok(credentials)
}

/// Extract one group from `{ "<group>": { "<key>": "<value>" } }`.
fn parse_credentials_group(text: &str, group: &str) -> Result<BTreeMap<String, String>> {
    let groups: HashMap<String, Value> = serde_json::from_str(text)?;

    match groups.get(group) {
        Some(value) => Ok(serde_json::from_value(value.clone())?),
        None => {
            debug!(group, "Credential group not present");
            Ok(BTreeMap::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup_from(&[]));
        assert_eq!(settings.mode, ConnectionMode::Mock);
        assert!(settings.directory.starts_with("skyshelf"));
        assert!(settings.public);
        assert!(settings.host.is_none());
        assert_eq!(settings.credential_group, "skyshelf");
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup_from(&[
            (ENV_MOCK, "false"),
            (ENV_DIRECTORY, "my-bucket"),
            (ENV_HOST, "http://foo.bar"),
            (ENV_PUBLIC, "false"),
            (ENV_CREDENTIALS, "/etc/skyshelf.json"),
            (ENV_CREDENTIAL_GROUP, "ci"),
        ]));

        assert_eq!(settings.mode, ConnectionMode::Live);
        assert_eq!(settings.directory, "my-bucket");
        assert_eq!(settings.host.as_deref(), Some("http://foo.bar"));
        assert!(!settings.public);
        assert_eq!(settings.credentials_path, Some(PathBuf::from("/etc/skyshelf.json")));
        assert_eq!(settings.credential_group, "ci");
    }

    #[test]
    fn test_any_other_mock_value_stays_mocked() {
        let settings = Settings::from_lookup(lookup_from(&[(ENV_MOCK, "0")]));
        assert_eq!(settings.mode, ConnectionMode::Mock);
    }

    #[test]
    fn test_load_credentials_group_and_env_override() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("creds.json");
        std::fs::write(
            &path,
            r#"{
                "skyshelf": { "aws_access_key_id": "FILE", "aws_secret_access_key": "file-secret" },
                "other": { "local_root": "/nope" }
            }"#,
        )
        .unwrap();

        let mut settings = Settings::from_lookup(lookup_from(&[]));
        settings.credentials_path = Some(path);

        let creds = load_credentials(&settings, lookup_from(&[("AWS_ACCESS_KEY_ID", "ENV")])).unwrap();
        assert_eq!(creds.get("aws_access_key_id").map(String::as_str), Some("ENV"));
        assert_eq!(creds.get("aws_secret_access_key").map(String::as_str), Some("file-secret"));
        assert!(!creds.contains_key("local_root"));
    }

    #[test]
    fn test_empty_env_value_keeps_file_value() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("creds.json");
        std::fs::write(
            &path,
            r#"{ "skyshelf": { "aws_access_key_id": "FILE", "aws_secret_access_key": "file-secret" } }"#,
        )
        .unwrap();

        let mut settings = Settings::from_lookup(lookup_from(&[]));
        settings.credentials_path = Some(path);

        let creds = load_credentials(
            &settings,
            lookup_from(&[("AWS_ACCESS_KEY_ID", ""), ("GOOGLE_STORAGE_ACCESS_KEY_ID", "")]),
        )
        .unwrap();
        assert_eq!(creds.get("aws_access_key_id").map(String::as_str), Some("FILE"));
        assert!(!creds.contains_key("google_storage_access_key_id"));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let mut settings = Settings::from_lookup(lookup_from(&[]));
        settings.credentials_path = Some(temp.path().join("absent.json"));

        assert!(load_credentials(&settings, lookup_from(&[])).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_file_is_serialization_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("creds.json");
        std::fs::write(&path, r#"{ "skyshelf": { "aws_access_key_id": 42 } }"#).unwrap();

        let mut settings = Settings::from_lookup(lookup_from(&[]));
        settings.credentials_path = Some(path);

        let result = load_credentials(&settings, lookup_from(&[]));
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_resolver_from_settings() {
        let settings = Settings::from_lookup(lookup_from(&[
            (ENV_DIRECTORY, "bucket"),
            (ENV_HOST, "http://foo.bar"),
        ]));
        let configs = settings.resolver().unwrap().resolve(&BTreeMap::new());

        assert_eq!(configs.len(), 2);
        assert!(configs.iter().all(|c| c.host() == Some("http://foo.bar")));
    }
}
