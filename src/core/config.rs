//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! The configuration surface is a single immutable record, resolved once per
//! process and injected into the orchestrator. Two scopes exist:
//!
//! - **User**: user-level settings
//! - **Repo**: repository-level overrides
//!
//! # Precedence
//!
//! Values are resolved in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. User config file
//! 3. Repo config file
//!
//! # Locations
//!
//! User config, searched in order:
//! 1. `$REVIEW_FOLLOW_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/review-follow/config.toml`
//! 3. `~/.config/review-follow/config.toml`
//!
//! Repo config: `<git-dir>/review-follow/config.toml`.
//!
//! # Example
//!
//! ```
//! use review_follow::core::config::Configuration;
//!
//! let cfg = Configuration::default();
//! assert_eq!(cfg.review_branch.as_str(), "refs/heads/review");
//! assert_eq!(cfg.review_target_trailer, "Review-Target");
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::core::types::{RefName, TypeError};

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value for '{field}': {source}")]
    InvalidRef { field: &'static str, source: TypeError },

    #[error("trailer key '{0}' must be alphanumeric with dashes")]
    InvalidTrailerKey(String),
}

/// On-disk configuration file. All fields optional; unknown fields rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    follow_branch: Option<String>,
    review_branch: Option<String>,
    review_target_trailer: Option<String>,
    review_files_trailer: Option<String>,
    version_prefix: Option<String>,
    version_drop_prefix: Option<String>,
}

impl ConfigFile {
    fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Overlay `other` on top of `self`.
    fn merge(self, other: ConfigFile) -> ConfigFile {
        ConfigFile {
            follow_branch: other.follow_branch.or(self.follow_branch),
            review_branch: other.review_branch.or(self.review_branch),
            review_target_trailer: other.review_target_trailer.or(self.review_target_trailer),
            review_files_trailer: other.review_files_trailer.or(self.review_files_trailer),
            version_prefix: other.version_prefix.or(self.version_prefix),
            version_drop_prefix: other.version_drop_prefix.or(self.version_drop_prefix),
        }
    }
}

/// Resolved configuration record.
///
/// Immutable once constructed; injected into the orchestrator and never
/// re-read mid-update.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Branch a change follows in follow mode.
    pub follow_branch: RefName,
    /// Destination branch changes must be on for updates to apply.
    pub review_branch: RefName,
    /// Trailer key naming the review target.
    pub review_target_trailer: String,
    /// Trailer key holding the review file filter lines.
    pub review_files_trailer: String,
    /// Only refs with this prefix qualify as version labels.
    pub version_prefix: String,
    /// Prefix stripped from a resolved version label.
    pub version_drop_prefix: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            follow_branch: RefName::new("refs/heads/master").expect("valid default"),
            review_branch: RefName::new("refs/heads/review").expect("valid default"),
            review_target_trailer: "Review-Target".to_string(),
            review_files_trailer: "Review-Files".to_string(),
            version_prefix: "refs/tags/".to_string(),
            version_drop_prefix: "refs/tags/".to_string(),
        }
    }
}

impl Configuration {
    /// Load configuration, overlaying user and repo files on the defaults.
    ///
    /// `git_dir` is the repository's `.git` directory (or the repository
    /// itself when bare); `None` skips the repo scope. Missing files are not
    /// an error.
    pub fn load(git_dir: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_from(Self::user_config_path().as_deref(), git_dir)
    }

    /// Load with an explicit user-scope path. Scopes without a file are
    /// skipped.
    fn load_from(user_path: Option<&Path>, git_dir: Option<&Path>) -> Result<Self, ConfigError> {
        let mut file = ConfigFile::default();

        if let Some(path) = user_path {
            if path.exists() {
                file = file.merge(ConfigFile::read(path)?);
            }
        }

        if let Some(git_dir) = git_dir {
            let path = git_dir.join("review-follow/config.toml");
            if path.exists() {
                file = file.merge(ConfigFile::read(&path)?);
            }
        }

        Self::resolve(file)
    }

    /// The user-scope config path, honoring `$REVIEW_FOLLOW_CONFIG`.
    fn user_config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("REVIEW_FOLLOW_CONFIG") {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("review-follow/config.toml"))
    }

    fn resolve(file: ConfigFile) -> Result<Self, ConfigError> {
        let defaults = Configuration::default();

        let follow_branch = match file.follow_branch {
            Some(name) => RefName::new(name).map_err(|e| ConfigError::InvalidRef {
                field: "follow_branch",
                source: e,
            })?,
            None => defaults.follow_branch,
        };
        let review_branch = match file.review_branch {
            Some(name) => RefName::new(name).map_err(|e| ConfigError::InvalidRef {
                field: "review_branch",
                source: e,
            })?,
            None => defaults.review_branch,
        };

        let review_target_trailer = file
            .review_target_trailer
            .unwrap_or(defaults.review_target_trailer);
        let review_files_trailer = file
            .review_files_trailer
            .unwrap_or(defaults.review_files_trailer);
        for key in [&review_target_trailer, &review_files_trailer] {
            let valid = !key.is_empty()
                && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
            if !valid {
                return Err(ConfigError::InvalidTrailerKey(key.clone()));
            }
        }

        Ok(Self {
            follow_branch,
            review_branch,
            review_target_trailer,
            review_files_trailer,
            version_prefix: file.version_prefix.unwrap_or(defaults.version_prefix),
            version_drop_prefix: file
                .version_drop_prefix
                .unwrap_or(defaults.version_drop_prefix),
        })
    }
}
