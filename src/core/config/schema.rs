//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Validation
//!
//! Config values are validated after parsing to ensure they conform to
//! expected formats (e.g., trunk must be a valid branch name).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::BranchName;

/// Top-level configuration file.
///
/// # Example
///
/// ```toml
/// [vcs]
/// url = "https://review.example.com/registry-regulations"
/// username = "registry-bot"
/// trunk = "master"
/// repositories_root = "/var/lib/regstore/repositories"
///
/// [review]
/// url = "https://review.example.com"
/// username = "registry-bot"
/// project = "registry-regulations"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Version-control remote settings
    pub vcs: VcsConfig,

    /// Code-review server settings
    pub review: ReviewConfig,
}

impl ConfigFile {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.vcs.validate()?;
        self.review.validate()
    }
}

/// Version-control remote settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct VcsConfig {
    /// Canonical repository URL
    pub url: Option<String>,

    /// Username embedded into the push URL
    pub username: Option<String>,

    /// Password embedded into the push URL
    pub password: Option<String>,

    /// Trunk branch name (default: "master")
    pub trunk: Option<String>,

    /// Remote name inside each clone (default: "origin")
    pub remote: Option<String>,

    /// Directory holding one clone per version
    pub repositories_root: Option<PathBuf>,

    /// Attempts for clone/fetch/push on transient transport errors (default: 3)
    pub retry_attempts: Option<u32>,

    /// Base backoff between attempts in milliseconds (default: 200)
    pub retry_backoff_ms: Option<u64>,

    /// Committer name used when amending
    pub committer_name: Option<String>,

    /// Committer email used when amending
    pub committer_email: Option<String>,
}

impl VcsConfig {
    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.url {
            if url.trim().is_empty() {
                return Err(ConfigError::InvalidValue("vcs.url cannot be empty".into()));
            }
        }

        if let Some(trunk) = &self.trunk {
            BranchName::new(trunk).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid trunk branch name: {}", e))
            })?;
        }

        if let Some(remote) = &self.remote {
            if remote.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "vcs.remote cannot be empty".to_string(),
                ));
            }
        }

        if self.retry_attempts == Some(0) {
            return Err(ConfigError::InvalidValue(
                "vcs.retry_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Code-review server settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ReviewConfig {
    /// Base URL of the review server
    pub url: Option<String>,

    /// Account used for REST calls
    pub username: Option<String>,

    /// HTTP password of that account
    pub password: Option<String>,

    /// Project holding the registry repository
    pub project: Option<String>,
}

impl ReviewConfig {
    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.url {
            if url.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "review.url cannot be empty".into(),
                ));
            }
        }
        if let Some(project) = &self.project {
            if project.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "review.project cannot be empty".into(),
                ));
            }
        }
        Ok(())
    }
}
