//! Gateway configuration.
//!
//! Loaded from TOML. Every field has a default, so an empty file is a
//! valid configuration:
//!
//! ```toml
//! [cache]
//! role_ttl_secs = 3600
//!
//! [[mounts]]
//! path = "/gh"
//! [mounts.driver]
//! kind = "releases"
//! repo_structure = "/rg:BurntSushi/ripgrep"
//! show_all_versions = true
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration loading error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub cache: CacheConfig,
    pub listing: ListingConfig,
    pub mounts: Vec<MountConfig>,
}

impl GatewayConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Add a mount.
    pub fn with_mount(mut self, path: impl Into<String>, driver: DriverConfig) -> Self {
        self.mounts.push(MountConfig {
            path: path.into(),
            driver,
        });
        self
    }
}

/// Role and user cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub role_ttl_secs: u64,
    pub user_ttl_secs: u64,
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            role_ttl_secs: 3600,
            user_ttl_secs: 3600,
            max_capacity: 10_000,
        }
    }
}

impl CacheConfig {
    pub fn role_ttl(&self) -> Duration {
        Duration::from_secs(self.role_ttl_secs)
    }

    pub fn user_ttl(&self) -> Duration {
        Duration::from_secs(self.user_ttl_secs)
    }
}

/// Registry-level listing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Backends listed at once by registry-wide operations.
    pub max_concurrency: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self { max_concurrency: 8 }
    }
}

/// One configured mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountConfig {
    pub path: String,
    #[serde(default)]
    pub driver: DriverConfig,
}

/// Driver selection and its settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DriverConfig {
    #[default]
    Memory,
    Releases(ReleasesConfig),
}

/// Release-archive driver settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleasesConfig {
    /// One `path:owner/name` (or bare `owner/name`) per line.
    pub repo_structure: String,
    /// One directory per release instead of the latest assets.
    pub show_all_versions: bool,
    /// List repository files (readme, license) beside the assets.
    pub show_readme: bool,
    /// Fetch points concurrently; only honored with a token.
    pub concurrent_requests: bool,
    pub token: String,
    /// Replaces the upstream host in download links when set.
    pub proxy: String,
    pub max_concurrency: usize,
}

impl Default for ReleasesConfig {
    fn default() -> Self {
        Self {
            repo_structure: String::new(),
            show_all_versions: false,
            show_readme: false,
            concurrent_requests: false,
            token: String::new(),
            proxy: String::new(),
            max_concurrency: 8,
        }
    }
}

impl ReleasesConfig {
    pub fn new(repo_structure: impl Into<String>) -> Self {
        Self {
            repo_structure: repo_structure.into(),
            ..Default::default()
        }
    }

    /// List every release as its own directory.
    pub fn with_all_versions(mut self) -> Self {
        self.show_all_versions = true;
        self
    }

    /// Fan out with `token`, at most `max` requests at once.
    pub fn with_concurrency(mut self, token: impl Into<String>, max: usize) -> Self {
        self.concurrent_requests = true;
        self.token = token.into();
        self.max_concurrency = max;
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = proxy.into();
        self
    }

    pub fn with_readme(mut self) -> Self {
        self.show_readme = true;
        self
    }
}
