//! Composer invocations inside a release.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::DeployConfig;
use crate::process::{self, StepStatus};
use crate::Result;

/// Flags for the pre-activation install: no prompts, no dev packages,
/// no plugins, no progress output.
pub const INSTALL_FLAGS: &[&str] = &[
    "--no-ansi",
    "--no-interaction",
    "--no-plugins",
    "--no-dev",
    "--no-progress",
    "--no-suggest",
];

/// Flags for the post-activation hook.
pub const POST_ACTIVATION_FLAGS: &[&str] = &["--no-ansi", "--no-interaction", "--no-plugins"];

/// Runs the dependency manager in a release directory.
#[derive(Debug, Clone)]
pub struct DependencyInstaller {
    composer_path: PathBuf,
    timeout: Option<Duration>,
}

impl DependencyInstaller {
    pub fn new(composer_path: impl Into<PathBuf>) -> Self {
        Self {
            composer_path: composer_path.into(),
            timeout: None,
        }
    }

    pub fn from_config(config: &DeployConfig) -> Self {
        Self::new(config.composer_path.clone()).with_timeout(config.step_timeout)
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn install_args(command: &str) -> Vec<String> {
        with_flags(command, INSTALL_FLAGS)
    }

    pub fn post_activation_args(command: &str) -> Vec<String> {
        with_flags(command, POST_ACTIVATION_FLAGS)
    }

    /// Install dependencies before activation; blocks until composer exits.
    pub async fn install(&self, release_dir: &Path, command: &str) -> Result<StepStatus> {
        tracing::info!(command = %command, dir = %release_dir.display(), "Installing dependencies");
        let status = process::run(
            &self.composer_path,
            &Self::install_args(command),
            release_dir,
            self.timeout,
        )
        .await?;
        tracing::info!(status = %status, "Dependency install finished");
        Ok(status)
    }

    /// Run the post-activation subcommand in the live release.
    pub async fn post_activation(&self, release_dir: &Path, command: &str) -> Result<StepStatus> {
        tracing::info!(command = %command, dir = %release_dir.display(), "Running post-activation hook");
        let status = process::run(
            &self.composer_path,
            &Self::post_activation_args(command),
            release_dir,
            self.timeout,
        )
        .await?;
        if !status.success() {
            tracing::warn!(status = %status, "Post-activation hook failed; release stays active");
        }
        Ok(status)
    }
}

fn with_flags(command: &str, flags: &[&str]) -> Vec<String> {
    std::iter::once(command)
        .chain(flags.iter().copied())
        .map(str::to_string)
        .collect()
}
