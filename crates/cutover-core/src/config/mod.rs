//! Pipeline configuration
//!
//! A [`DeployConfig`] is resolved once per invocation from stacked
//! [`ConfigLayer`]s (defaults, global file, project file, environment,
//! command-line flags) and is never mutated afterwards.

pub mod env;
pub mod parser;
pub mod paths;
pub mod schema;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub use env::layer_from_env;
pub use parser::{parse_config_file, parse_config_str};
pub use paths::{config_paths, load_file_layers};
pub use schema::ConfigLayer;

pub const DEFAULT_DEPLOYMENTS_DIR: &str = ".deployments";
pub const DEFAULT_REVISION: &str = "HEAD";
pub const DEFAULT_COMPOSER_PATH: &str = "composer";
pub const DEFAULT_INSTALL_COMMAND: &str = "install";

/// Which half of the pipeline an invocation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseSelector {
    /// Fetch, link, install (and activate unless waiting for other servers)
    #[default]
    Fetch,
    /// Activate a release produced by an earlier fetch phase
    Activate,
}

impl PhaseSelector {
    pub fn as_str(self) -> &'static str {
        match self {
            PhaseSelector::Fetch => "FETCH",
            PhaseSelector::Activate => "ACTIVATE",
        }
    }
}

impl std::str::FromStr for PhaseSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FETCH" | "GIT_ARCHIVE" => Ok(PhaseSelector::Fetch),
            "ACTIVATE" => Ok(PhaseSelector::Activate),
            _ => Err(Error::InvalidPhase(s.to_string())),
        }
    }
}

impl std::fmt::Display for PhaseSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable, fully resolved pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployConfig {
    pub repository_url: Option<String>,
    pub revision: String,
    pub deployments_dir: PathBuf,
    pub exclude_paths: Vec<String>,
    pub current_link: Option<PathBuf>,
    pub project_root: Option<PathBuf>,
    pub managed_symlinks: Vec<String>,
    pub composer_path: PathBuf,
    pub install_command: Option<String>,
    pub post_activation_command: Option<String>,
    /// Number of releases to keep; 0 keeps everything
    pub retain: usize,
    /// Stop after install and wait for an external ACTIVATE invocation
    pub wait_all_servers: bool,
    pub phase: PhaseSelector,
    pub release_dir: Option<PathBuf>,
    pub git_path: PathBuf,
    pub tar_path: PathBuf,
    pub step_timeout: Option<Duration>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            repository_url: None,
            revision: DEFAULT_REVISION.to_string(),
            deployments_dir: PathBuf::from(DEFAULT_DEPLOYMENTS_DIR),
            exclude_paths: Vec::new(),
            current_link: None,
            project_root: None,
            managed_symlinks: Vec::new(),
            composer_path: PathBuf::from(DEFAULT_COMPOSER_PATH),
            install_command: Some(DEFAULT_INSTALL_COMMAND.to_string()),
            post_activation_command: None,
            retain: 0,
            wait_all_servers: true,
            phase: PhaseSelector::Fetch,
            release_dir: None,
            git_path: PathBuf::from("git"),
            tar_path: PathBuf::from("tar"),
            step_timeout: None,
        }
    }
}

impl DeployConfig {
    /// Resolve layers in ascending precedence order on top of the defaults.
    pub fn resolve<I>(layers: I) -> Result<Self>
    where
        I: IntoIterator<Item = ConfigLayer>,
    {
        let merged = layers
            .into_iter()
            .fold(ConfigLayer::default(), |acc, layer| acc.merge(layer));
        Self::default().apply(merged)
    }

    fn apply(mut self, layer: ConfigLayer) -> Result<Self> {
        if let Some(url) = layer.repository_url {
            self.repository_url = non_empty(url);
        }
        if let Some(revision) = layer.revision {
            self.revision = revision;
        }
        if let Some(dir) = layer.deployments_dir {
            self.deployments_dir = dir;
        }
        if let Some(paths) = layer.exclude_paths {
            self.exclude_paths = clean_list(paths);
        }
        if let Some(link) = layer.current_link {
            self.current_link = Some(link);
        }
        if let Some(root) = layer.project_root {
            self.project_root = Some(root);
        }
        if let Some(links) = layer.managed_symlinks {
            self.managed_symlinks = clean_list(links);
        }
        if let Some(path) = layer.composer_path {
            self.composer_path = path;
        }
        if let Some(command) = layer.install_command {
            self.install_command = non_empty(command);
        }
        if let Some(command) = layer.post_activation_command {
            self.post_activation_command = non_empty(command);
        }
        if let Some(retain) = layer.retain {
            self.retain = usize::try_from(retain).unwrap_or(0);
        }
        if let Some(wait) = layer.wait_all_servers {
            self.wait_all_servers = wait;
        }
        if let Some(phase) = layer.phase {
            self.phase = phase.parse()?;
        }
        if let Some(dir) = layer.release_dir {
            self.release_dir = Some(dir);
        }
        if let Some(path) = layer.git_path {
            self.git_path = path;
        }
        if let Some(path) = layer.tar_path {
            self.tar_path = path;
        }
        if let Some(secs) = layer.step_timeout_secs {
            self.step_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        Ok(self)
    }

    /// Check that everything the selected phase needs is present.
    pub fn validate(&self) -> Result<()> {
        self.validate_for(self.phase)
    }

    /// Check that everything `phase` needs is present.
    pub fn validate_for(&self, phase: PhaseSelector) -> Result<()> {
        if self.current_link.is_none() {
            return Err(Error::config(
                "current_link (CURRENT_SYMLINK_PATH) is required",
            ));
        }
        match phase {
            PhaseSelector::Fetch => {
                if self.repository_url.is_none() {
                    return Err(Error::config(
                        "repository_url (REPOSITORY_URL) is required for the FETCH phase",
                    ));
                }
                if !self.managed_symlinks.is_empty() && self.project_root.is_none() {
                    return Err(Error::config(
                        "project_root (PROJECT_PATH) is required when managed_symlinks is set",
                    ));
                }
            }
            PhaseSelector::Activate => {
                if self.release_dir.is_none() {
                    return Err(Error::config(
                        "release_dir is required for the ACTIVATE phase",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Path of the current-release symlink, after validation.
    pub fn current_link(&self) -> Result<&Path> {
        self.current_link
            .as_deref()
            .ok_or_else(|| Error::config("current_link (CURRENT_SYMLINK_PATH) is required"))
    }

    /// Copy of this config targeting the ACTIVATE phase for `release_dir`.
    pub fn for_activation(&self, release_dir: impl Into<PathBuf>) -> Self {
        Self {
            phase: PhaseSelector::Activate,
            release_dir: Some(release_dir.into()),
            ..self.clone()
        }
    }
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a boolean flag value.
pub fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::config(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
