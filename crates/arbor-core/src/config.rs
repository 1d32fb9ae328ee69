use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use arbor_util::errors::ArborError;

use crate::dependency::scope;

/// Resolver configuration loaded from `arbor.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub collect: CollectConfig,

    #[serde(default)]
    pub update: UpdateConfig,

    #[serde(default)]
    pub repositories: BTreeMap<String, RepositoryConfig>,
}

/// Graph collection settings from `[collect]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectConfig {
    /// Scopes dropped from transitive dependencies. Direct dependencies are
    /// always kept regardless of scope.
    #[serde(default = "default_excluded_scopes", rename = "excluded-scopes")]
    pub excluded_scopes: Vec<String>,
    #[serde(default, rename = "include-optional")]
    pub include_optional: bool,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            excluded_scopes: default_excluded_scopes(),
            include_optional: false,
        }
    }
}

fn default_excluded_scopes() -> Vec<String> {
    vec![scope::TEST.to_string(), scope::PROVIDED.to_string()]
}

/// Staleness settings from `[update]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Overrides every repository's update policy when set.
    #[serde(default)]
    pub policy: Option<String>,
    #[serde(default = "default_true", rename = "not-found-caching")]
    pub not_found_caching: bool,
    #[serde(default, rename = "transfer-error-caching")]
    pub transfer_error_caching: bool,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            policy: None,
            not_found_caching: true,
            transfer_error_caching: false,
        }
    }
}

/// A remote repository from `[repositories.<id>]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub url: String,
    #[serde(default = "default_true")]
    pub releases: bool,
    #[serde(default = "default_true")]
    pub snapshots: bool,
    #[serde(default = "default_update_policy", rename = "release-policy")]
    pub release_policy: String,
    #[serde(default = "default_update_policy", rename = "snapshot-policy")]
    pub snapshot_policy: String,
}

fn default_true() -> bool {
    true
}

fn default_update_policy() -> String {
    "daily".to_string()
}

impl ResolverConfig {
    /// Load the configuration from `path`, or return defaults if the file doesn't exist.
    pub fn load(path: &Path) -> miette::Result<Self> {
        if !path.is_file() {
            tracing::debug!("No resolver config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| ArborError::Config {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        Ok(Self::from_toml_str(&content)?)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ArborError> {
        toml::from_str(content).map_err(|e| ArborError::Config {
            message: format!("Failed to parse resolver config: {e}"),
        })
    }

    /// Returns the default path to the user's config file.
    pub fn default_path() -> PathBuf {
        dirs_path().join("config.toml")
    }
}

/// Returns the path to the Arbor data directory (`~/.arbor/`).
pub fn dirs_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".arbor")
}
