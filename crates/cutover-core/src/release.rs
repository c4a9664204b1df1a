//! Release directories.
//!
//! A release lives at `<deployments_dir>/<id>` where `id` is its creation
//! time in milliseconds. Names therefore sort chronologically.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use crate::error::IoContext;
use crate::Result;

/// One materialized copy of the code tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Release {
    pub id: String,
    pub dir: PathBuf,
}

impl Release {
    /// Create a fresh release directory under `root`.
    ///
    /// The returned path is absolute so it can be handed to another process
    /// for the activation phase. An existing directory with the same id is reused rather than
    /// treated as an error.
    pub fn create(root: &Path) -> Result<Self> {
        let id = Utc::now().timestamp_millis().to_string();
        Self::create_with_id(root, id)
    }

    pub fn create_with_id(root: &Path, id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let dir = std::path::absolute(root.join(&id))
            .io_context("Failed to resolve release directory", root)?;
        std::fs::create_dir_all(&dir).io_context("Failed to create release directory", &dir)?;
        tracing::debug!(release = %id, dir = %dir.display(), "Created release directory");
        Ok(Self { id, dir })
    }

    /// Wrap an existing release directory, e.g. one handed back for activation.
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let id = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { id, dir }
    }
}

/// Whether a directory name looks like a release id.
pub fn is_release_id(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit())
}

/// Release directories under `root`, oldest first.
///
/// Only real directories with numeric names are listed; symlinks and other
/// entries (such as a `current` link kept next to the releases) are ignored.
pub fn list_releases(root: &Path) -> Result<Vec<Release>> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(crate::Error::io("Failed to read deployments directory", root, err)),
    };

    let mut releases = Vec::new();
    for entry in entries {
        let entry = entry.io_context("Failed to read deployments directory", root)?;
        let file_type = entry
            .file_type()
            .io_context("Failed to stat release entry", &entry.path())?;
        if !file_type.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_release_id(&name) {
            continue;
        }
        releases.push(Release {
            id: name,
            dir: entry.path(),
        });
    }

    releases.sort_by(|a, b| compare_ids(&a.id, &b.id));
    Ok(releases)
}

/// Numeric order for digit strings without parsing them.
fn compare_ids(a: &str, b: &str) -> std::cmp::Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
