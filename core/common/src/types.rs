//! Common types used throughout Skyshelf.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// Key of a stored object, relative to its directory (bucket).
///
/// Keys use '/' as separator and never start or end with one, so
/// `uploads/bar.txt` is the canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectPath {
    components: Vec<String>,
}

impl ObjectPath {
    /// Create a path from string components.
    ///
    /// # Errors
    /// - Returns error if there are no components
    /// - Returns error if any component is empty, `.`, `..`, or contains a separator
    pub fn from_components(components: Vec<String>) -> crate::Result<Self> {
        if components.is_empty() {
            return Err(crate::Error::InvalidInput(
                "Object path cannot be empty".to_string(),
            ));
        }
        for comp in &components {
            validate_component(comp)?;
        }
        Ok(Self { components })
    }

    /// Parse a key such as `uploads/bar.txt`.
    ///
    /// Leading and trailing slashes are ignored.
    pub fn parse(path: &str) -> crate::Result<Self> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Err(crate::Error::InvalidInput(format!(
                "Object path cannot be empty: {:?}",
                path
            )));
        }

        let components: Vec<String> = trimmed.split('/').map(String::from).collect();
        Self::from_components(components)
    }

    /// Get the parent path, if any.
    pub fn parent(&self) -> Option<Self> {
        if self.components.len() <= 1 {
            None
        } else {
            let mut components = self.components.clone();
            components.pop();
            Some(Self { components })
        }
    }

    /// Get the file name (last component).
    pub fn name(&self) -> &str {
        self.components
            .last()
            .map(|s| s.as_str())
            .unwrap_or_default()
    }

    /// Join this path with a child component.
    pub fn join(&self, child: &str) -> crate::Result<Self> {
        validate_component(child)?;
        let mut components = self.components.clone();
        components.push(child.to_string());
        Ok(Self { components })
    }

    /// Get the path components.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// The provider-facing key.
    pub fn as_key(&self) -> String {
        self.components.join("/")
    }
}

fn validate_component(comp: &str) -> crate::Result<()> {
    if comp.is_empty() {
        return Err(crate::Error::InvalidInput(
            "Path component cannot be empty".to_string(),
        ));
    }
    if comp == "." || comp == ".." {
        return Err(crate::Error::InvalidInput(format!(
            "Path component cannot be {:?}",
            comp
        )));
    }
    if comp.contains('/') || comp.contains('\\') {
        return Err(crate::Error::InvalidInput(
            "Path component cannot contain separators".to_string(),
        ));
    }
    Ok(())
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_key())
    }
}

/// Credential value that zeroizes on drop and never prints itself.
#[derive(Clone, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the plain value for handing to a provider client.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED; {} chars])", self.0.chars().count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_object_path_parse() {
        let path = ObjectPath::parse("uploads/bar.txt").unwrap();
        assert_eq!(path.components(), &["uploads", "bar.txt"]);
        assert_eq!(path.as_key(), "uploads/bar.txt");
        assert_eq!(path.to_string(), "uploads/bar.txt");
    }

    #[test]
    fn test_object_path_trims_slashes() {
        let path = ObjectPath::parse("/uploads/bar.txt/").unwrap();
        assert_eq!(path.as_key(), "uploads/bar.txt");
    }

    #[test]
    fn test_object_path_rejects_empty() {
        assert!(ObjectPath::parse("").is_err());
        assert!(ObjectPath::parse("/").is_err());
        assert!(ObjectPath::parse("uploads//bar.txt").is_err());
    }

    #[test]
    fn test_object_path_rejects_traversal() {
        assert!(ObjectPath::parse("uploads/../etc/passwd").is_err());
        assert!(ObjectPath::parse("./bar.txt").is_err());
    }

    #[test]
    fn test_object_path_join_and_parent() {
        let path = ObjectPath::parse("uploads").unwrap().join("bar.txt").unwrap();
        assert_eq!(path.as_key(), "uploads/bar.txt");
        assert_eq!(path.name(), "bar.txt");
        assert_eq!(path.parent().unwrap().as_key(), "uploads");
        assert!(path.parent().unwrap().parent().is_none());
        assert!(path.join("a/b").is_err());
    }

    #[test]
    fn test_secret_is_redacted() {
        let secret = Secret::new("hunter2");
        assert_eq!(secret.expose(), "hunter2");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
    }

    proptest! {
        #[test]
        fn prop_parse_accepts_canonical_keys(parts in prop::collection::vec("[a-z0-9_-]{1,8}", 1..5)) {
            let key = parts.join("/");
            let path = ObjectPath::parse(&key).unwrap();
            prop_assert_eq!(path.as_key(), key);
            prop_assert_eq!(path.components().len(), parts.len());
        }

        #[test]
        fn prop_surrounding_slashes_are_ignored(parts in prop::collection::vec("[a-z0-9.]{1,8}", 1..4)) {
            prop_assume!(parts.iter().all(|p| p != "." && p != ".."));
            let key = parts.join("/");
            let padded = format!("/{}/", key);
            prop_assert_eq!(ObjectPath::parse(&padded).unwrap(), ObjectPath::parse(&key).unwrap());
        }
    }
}
