use serde::{Deserialize, Serialize};
use std::{fs::read_to_string, path::Path};

use crate::error::OmeError;

/// What to do when an ID-reference names an identifier no element carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DanglingPolicy {
    /// Treat the relation as unset.
    #[default]
    Absent,
    /// Fail with [`OmeError::DanglingReference`].
    Error,
}

/// What to do when an ID-reference matches more than one element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail with [`OmeError::AmbiguousReference`].
    #[default]
    Error,
    /// Resolve to the first match in document order.
    FirstMatch,
}

/// Resolution policies for a document.
///
/// ```toml
/// dangling_references = "error"
/// duplicate_identifiers = "first_match"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub dangling_references: DanglingPolicy,
    pub duplicate_identifiers: DuplicatePolicy,
}

impl ResolverConfig {
    pub fn strict() -> Self {
        ResolverConfig {
            dangling_references: DanglingPolicy::Error,
            duplicate_identifiers: DuplicatePolicy::Error,
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, OmeError> {
        Ok(toml::from_str(text)?)
    }

    /// Read the config at `path`, falling back to defaults when the file does not exist.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, OmeError> {
        tracing::debug!("Attempting to read resolver config from: {:?}", path.as_ref());
        if !path.as_ref().exists() {
            tracing::debug!("Config file not found, using default resolver policies.");
            return Ok(ResolverConfig::default());
        }
        ResolverConfig::from_toml_str(&read_to_string(path)?)
    }

    pub fn to_toml_string(&self) -> Result<String, OmeError> {
        Ok(toml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.dangling_references, DanglingPolicy::Absent);
        assert_eq!(config.duplicate_identifiers, DuplicatePolicy::Error);
        assert_eq!(ResolverConfig::from_toml_str("").unwrap(), config);
    }

    #[test]
    fn test_partial_file() {
        let config = ResolverConfig::from_toml_str(r#"duplicate_identifiers = "first_match""#)
            .unwrap();
        assert_eq!(config.duplicate_identifiers, DuplicatePolicy::FirstMatch);
        assert_eq!(config.dangling_references, DanglingPolicy::Absent);
        assert!(ResolverConfig::from_toml_str(r#"dangling_references = "maybe""#).is_err());
    }

    #[test]
    fn test_from_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("resolver.toml");
        assert_eq!(
            ResolverConfig::from_path(&path).unwrap(),
            ResolverConfig::default()
        );
        std::fs::write(&path, ResolverConfig::strict().to_toml_string().unwrap()).unwrap();
        assert_eq!(
            ResolverConfig::from_path(&path).unwrap(),
            ResolverConfig::strict()
        );
    }
}
