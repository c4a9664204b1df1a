//! Atomic switch of the `current` symlink.
//!
//! The new link is built at `<current>.tmp` and renamed over `<current>`.
//! `rename(2)` replaces the old link in one step, so readers always resolve
//! either the previous release or the new one.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::IoContext;
use crate::links::create_symlink;
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct Activator {
    current_link: PathBuf,
}

impl Activator {
    pub fn new(current_link: impl Into<PathBuf>) -> Self {
        Self {
            current_link: current_link.into(),
        }
    }

    pub fn current_link(&self) -> &Path {
        &self.current_link
    }

    /// Staging path next to the final link, on the same filesystem.
    pub fn temp_link(&self) -> PathBuf {
        let mut name = OsString::from(self.current_link.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Target of the current link, if it exists.
    pub fn current_target(&self) -> Option<PathBuf> {
        std::fs::read_link(&self.current_link).ok()
    }

    /// Point the current link at `release_dir`.
    ///
    /// The final path is never unlinked; a stale staging link from an
    /// interrupted run is replaced.
    pub fn activate(&self, release_dir: &Path) -> Result<()> {
        let target = std::path::absolute(release_dir)
            .io_context("Failed to resolve release directory", release_dir)?;
        let tmp = self.temp_link();

        if let Some(parent) = self.current_link.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .io_context("Failed to create current link directory", parent)?;
        }

        match std::fs::symlink_metadata(&tmp) {
            Ok(meta) if meta.is_dir() => {
                return Err(Error::io(
                    "Refusing to replace a directory at the staging link path",
                    &tmp,
                    std::io::Error::from(std::io::ErrorKind::AlreadyExists),
                ));
            }
            Ok(_) => {
                tracing::debug!(path = %tmp.display(), "Removing stale staging link");
                std::fs::remove_file(&tmp).io_context("Failed to remove stale staging link", &tmp)?;
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(Error::io("Failed to stat staging link", &tmp, err)),
        }

        create_symlink(&target, &tmp).io_context("Failed to create staging link", &tmp)?;
        if let Err(err) = std::fs::rename(&tmp, &self.current_link) {
            let _ = std::fs::remove_file(&tmp);
            return Err(Error::io(
                "Failed to move staging link into place",
                &self.current_link,
                err,
            ));
        }

        tracing::info!(
            current = %self.current_link.display(),
            target = %target.display(),
            "Activated release"
        );
        Ok(())
    }
}
