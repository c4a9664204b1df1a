//! Retention pruning of old releases.
//!
//! Callers only prune after activating the newest release, which is what
//! keeps the live release inside the retention window. The pruner itself
//! does not look at the current link.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::release::list_releases;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PruneFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    /// Release ids that were deleted
    pub removed: Vec<String>,
    pub failed: Vec<PruneFailure>,
}

impl PruneReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RetentionPruner {
    deployments_dir: PathBuf,
    retain: usize,
}

impl RetentionPruner {
    /// `retain == 0` disables pruning.
    pub fn new(deployments_dir: impl Into<PathBuf>, retain: usize) -> Self {
        Self {
            deployments_dir: deployments_dir.into(),
            retain,
        }
    }

    pub fn deployments_dir(&self) -> &Path {
        &self.deployments_dir
    }

    /// Delete the oldest releases so at most `retain` remain.
    ///
    /// Best effort: a directory that cannot be removed is reported and the
    /// pass continues with the next one.
    pub fn prune(&self) -> PruneReport {
        let mut report = PruneReport::default();
        if self.retain == 0 {
            return report;
        }

        let releases = match list_releases(&self.deployments_dir) {
            Ok(releases) => releases,
            Err(err) => {
                tracing::warn!(error = %err, "Could not list releases for pruning");
                report.failed.push(PruneFailure {
                    path: self.deployments_dir.clone(),
                    error: err.to_string(),
                });
                return report;
            }
        };

        if releases.len() <= self.retain {
            return report;
        }

        let excess = releases.len() - self.retain;
        for release in releases.into_iter().take(excess) {
            match std::fs::remove_dir_all(&release.dir) {
                Ok(()) => {
                    tracing::info!(release = %release.id, "Pruned release");
                    report.removed.push(release.id);
                }
                Err(err) => {
                    tracing::warn!(release = %release.id, error = %err, "Failed to prune release");
                    report.failed.push(PruneFailure {
                        path: release.dir,
                        error: err.to_string(),
                    });
                }
            }
        }

        report
    }
}
