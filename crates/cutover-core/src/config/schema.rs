//! Configuration schema for cutover.toml
//!
//! The same [`ConfigLayer`] shape is produced by the TOML file, the
//! environment and the command line; every field is optional so layers can
//! be stacked.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One source of configuration values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
    /// Git remote passed to `git archive --remote`
    pub repository_url: Option<String>,

    /// Tree-ish to archive
    pub revision: Option<String>,

    /// Directory holding one subdirectory per release
    pub deployments_dir: Option<PathBuf>,

    /// Paths excluded from extraction
    pub exclude_paths: Option<Vec<String>>,

    /// Symlink pointing at the live release
    pub current_link: Option<PathBuf>,

    /// Directory holding shared paths that releases link to
    pub project_root: Option<PathBuf>,

    /// Release-relative paths linked to `project_root`
    pub managed_symlinks: Option<Vec<String>>,

    pub composer_path: Option<PathBuf>,

    /// Composer subcommand run before activation; empty disables
    pub install_command: Option<String>,

    /// Composer subcommand run after activation; empty disables
    pub post_activation_command: Option<String>,

    /// Releases to keep; zero or negative keeps everything
    pub retain: Option<i64>,

    pub wait_all_servers: Option<bool>,

    /// `FETCH` or `ACTIVATE`
    pub phase: Option<String>,

    /// Release produced by an earlier FETCH phase
    pub release_dir: Option<PathBuf>,

    pub git_path: Option<PathBuf>,

    pub tar_path: Option<PathBuf>,

    /// Per-process timeout in seconds; zero disables
    pub step_timeout_secs: Option<u64>,
}

impl ConfigLayer {
    /// Overlay `higher` on top of `self`; fields set in `higher` win.
    pub fn merge(self, higher: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            repository_url: higher.repository_url.or(self.repository_url),
            revision: higher.revision.or(self.revision),
            deployments_dir: higher.deployments_dir.or(self.deployments_dir),
            exclude_paths: higher.exclude_paths.or(self.exclude_paths),
            current_link: higher.current_link.or(self.current_link),
            project_root: higher.project_root.or(self.project_root),
            managed_symlinks: higher.managed_symlinks.or(self.managed_symlinks),
            composer_path: higher.composer_path.or(self.composer_path),
            install_command: higher.install_command.or(self.install_command),
            post_activation_command: higher
                .post_activation_command
                .or(self.post_activation_command),
            retain: higher.retain.or(self.retain),
            wait_all_servers: higher.wait_all_servers.or(self.wait_all_servers),
            phase: higher.phase.or(self.phase),
            release_dir: higher.release_dir.or(self.release_dir),
            git_path: higher.git_path.or(self.git_path),
            tar_path: higher.tar_path.or(self.tar_path),
            step_timeout_secs: higher.step_timeout_secs.or(self.step_timeout_secs),
        }
    }

    /// Relative paths in this layer are taken relative to `base`.
    ///
    /// Used for file layers so a `cutover.toml` means the same thing
    /// regardless of the working directory.
    pub fn rebase(mut self, base: &std::path::Path) -> ConfigLayer {
        let fix = |p: Option<PathBuf>| p.map(|p| if p.is_relative() { base.join(p) } else { p });
        self.deployments_dir = fix(self.deployments_dir);
        self.current_link = fix(self.current_link);
        self.project_root = fix(self.project_root);
        self.release_dir = fix(self.release_dir);
        self
    }
}
