//! core::config
//!
//! Configuration schema and loading.
//!
//! # Locations
//!
//! Searched in order, first hit wins:
//! 1. An explicit path (e.g. `--config`)
//! 2. `$REGSTORE_CONFIG` if set
//! 3. `$XDG_CONFIG_HOME/regstore/config.toml`
//! 4. `~/.regstore/config.toml`
//!
//! Missing files are not an error; defaults are used. Secrets can be
//! supplied through `$REGSTORE_VCS_PASSWORD` and `$REGSTORE_REVIEW_PASSWORD`,
//! which override the file.
//!
//! # Example
//!
//! ```no_run
//! use regstore::core::config::Config;
//!
//! let config = Config::load(None).unwrap();
//! println!("Trunk branch: {}", config.trunk());
//! println!("Remote: {}", config.remote());
//! ```

pub mod schema;

pub use schema::{ConfigFile, ReviewConfig, VcsConfig};

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::types::BranchName;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "REGSTORE_CONFIG";
/// Environment variable overriding `vcs.password`.
pub const VCS_PASSWORD_ENV: &str = "REGSTORE_VCS_PASSWORD";
/// Environment variable overriding `review.password`.
pub const REVIEW_PASSWORD_ENV: &str = "REGSTORE_REVIEW_PASSWORD";

const DEFAULT_TRUNK: &str = "master";
const DEFAULT_REMOTE: &str = "origin";
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 200;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("missing required config value: {0}")]
    MissingValue(&'static str),

    #[error("no data directory available for repositories_root")]
    NoDataDir,
}

/// Loaded configuration with defaults applied through accessors.
#[derive(Debug, Clone)]
pub struct Config {
    /// Raw file contents (after env overrides)
    pub file: ConfigFile,
    trunk: BranchName,
    loaded_from: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_file(ConfigFile::default(), None)
            .expect("default configuration is valid")
    }
}

impl Config {
    /// Load configuration, starting from `explicit` if given.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read or parsed,
    /// or if a value fails validation. An explicit path that does not exist
    /// is a read error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let (mut file, path) = match explicit {
            Some(path) => (Self::read_file(path)?, Some(path.to_path_buf())),
            None => match Self::locate() {
                Some(path) => (Self::read_file(&path)?, Some(path)),
                None => (ConfigFile::default(), None),
            },
        };

        if let Ok(password) = std::env::var(VCS_PASSWORD_ENV) {
            file.vcs.password = Some(password);
        }
        if let Ok(password) = std::env::var(REVIEW_PASSWORD_ENV) {
            file.review.password = Some(password);
        }

        Self::from_file(file, path)
    }

    /// Build a configuration from already-parsed contents.
    pub fn from_file(file: ConfigFile, loaded_from: Option<PathBuf>) -> Result<Self, ConfigError> {
        file.validate()?;
        let trunk = BranchName::new(file.vcs.trunk.as_deref().unwrap_or(DEFAULT_TRUNK))
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        Ok(Self {
            file,
            trunk,
            loaded_from,
        })
    }

    fn locate() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("regstore/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        let path = dirs::home_dir()?.join(".regstore/config.toml");
        path.exists().then_some(path)
    }

    fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Canonical repository URL.
    pub fn vcs_url(&self) -> Result<&str, ConfigError> {
        self.file
            .vcs
            .url
            .as_deref()
            .ok_or(ConfigError::MissingValue("vcs.url"))
    }

    /// Username and password for the repository, if configured.
    pub fn vcs_credentials(&self) -> Option<(&str, &str)> {
        let vcs = &self.file.vcs;
        Some((vcs.username.as_deref()?, vcs.password.as_deref().unwrap_or("")))
    }

    /// Trunk branch. Defaults to "master".
    pub fn trunk(&self) -> &BranchName {
        &self.trunk
    }

    /// Remote name inside each clone. Defaults to "origin".
    pub fn remote(&self) -> &str {
        self.file.vcs.remote.as_deref().unwrap_or(DEFAULT_REMOTE)
    }

    /// Root directory of the per-version clones.
    ///
    /// Defaults to `<data_local_dir>/regstore/repositories`.
    pub fn repositories_root(&self) -> Result<PathBuf, ConfigError> {
        if let Some(root) = &self.file.vcs.repositories_root {
            return Ok(root.clone());
        }
        dirs::data_local_dir()
            .map(|dir| dir.join("regstore/repositories"))
            .ok_or(ConfigError::NoDataDir)
    }

    /// Attempts for clone/fetch/push. Defaults to 3.
    pub fn retry_attempts(&self) -> u32 {
        self.file.vcs.retry_attempts.unwrap_or(DEFAULT_RETRY_ATTEMPTS)
    }

    /// Base backoff between attempts. Defaults to 200ms.
    pub fn retry_backoff(&self) -> std::time::Duration {
        std::time::Duration::from_millis(
            self.file
                .vcs
                .retry_backoff_ms
                .unwrap_or(DEFAULT_RETRY_BACKOFF_MS),
        )
    }

    /// Committer identity used when amending.
    ///
    /// Falls back to the VCS username, then to "regstore".
    pub fn committer(&self) -> (String, String) {
        let vcs = &self.file.vcs;
        let name = vcs
            .committer_name
            .clone()
            .or_else(|| vcs.username.clone())
            .unwrap_or_else(|| "regstore".to_string());
        let email = vcs
            .committer_email
            .clone()
            .unwrap_or_else(|| format!("{}@localhost", name));
        (name, email)
    }

    /// Base URL of the review server.
    pub fn review_url(&self) -> Result<&str, ConfigError> {
        self.file
            .review
            .url
            .as_deref()
            .ok_or(ConfigError::MissingValue("review.url"))
    }

    /// Review project holding the repository.
    pub fn review_project(&self) -> Result<&str, ConfigError> {
        self.file
            .review
            .project
            .as_deref()
            .ok_or(ConfigError::MissingValue("review.project"))
    }

    /// Path of the loaded config file, if any.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_without_file() {
        let config = Config::default();
        assert_eq!(config.trunk().as_str(), "master");
        assert_eq!(config.remote(), "origin");
        assert_eq!(config.retry_attempts(), 3);
        assert_eq!(config.retry_backoff().as_millis(), 200);
        assert!(config.vcs_url().is_err());
        assert!(config.vcs_credentials().is_none());
        assert!(config.loaded_from().is_none());
    }

    #[test]
    fn load_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            r#"
            [vcs]
            url = "file:///srv/regs.git"
            trunk = "main"
            repositories_root = "/tmp/regstore"

            [review]
            url = "http://review.local"
            project = "regs"
            "#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.trunk().as_str(), "main");
        assert_eq!(config.vcs_url().unwrap(), "file:///srv/regs.git");
        assert_eq!(
            config.repositories_root().unwrap(),
            PathBuf::from("/tmp/regstore")
        );
        assert_eq!(config.review_project().unwrap(), "regs");
        assert_eq!(config.loaded_from(), Some(path.as_path()));
    }

    #[test]
    fn explicit_missing_path_is_error() {
        let temp = TempDir::new().unwrap();
        let result = Config::load(Some(&temp.path().join("nope.toml")));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[vcs\nurl = ").unwrap();

        let result = Config::load(Some(&path));
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn committer_falls_back_to_username() {
        let file = ConfigFile {
            vcs: VcsConfig {
                username: Some("bot".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let config = Config::from_file(file, None).unwrap();
        assert_eq!(
            config.committer(),
            ("bot".to_string(), "bot@localhost".to_string())
        );
        assert_eq!(config.vcs_credentials(), Some(("bot", "")));
    }

    #[test]
    fn invalid_values_rejected() {
        let file = ConfigFile {
            vcs: VcsConfig {
                trunk: Some("a b".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(Config::from_file(file, None).is_err());
    }
}
