//! Managed symlinks from a release into shared project paths.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::error::IoContext;
use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkReport {
    /// Entries linked by this run
    pub created: Vec<String>,
    /// Entries whose destination already existed
    pub skipped: Vec<String>,
}

/// Links `<release>/<entry>` to `<project_root>/<entry>` for each entry.
#[derive(Debug, Clone)]
pub struct SymlinkProvisioner {
    project_root: PathBuf,
    entries: Vec<String>,
}

impl SymlinkProvisioner {
    /// `project_root` is made absolute so links stay valid from inside the
    /// release regardless of the working directory.
    pub fn new(project_root: &Path, entries: Vec<String>) -> Result<Self> {
        for entry in &entries {
            ensure_relative_entry(entry)?;
        }
        let project_root = std::path::absolute(project_root)
            .io_context("Failed to resolve project root", project_root)?;
        Ok(Self {
            project_root,
            entries,
        })
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Create missing links. Existing destinations (including dangling
    /// links) are left untouched, so running twice changes nothing.
    pub fn provision(&self, release_dir: &Path) -> Result<LinkReport> {
        let mut report = LinkReport::default();

        for entry in &self.entries {
            let dest = release_dir.join(entry);
            if std::fs::symlink_metadata(&dest).is_ok() {
                tracing::debug!(entry = %entry, "Destination exists, leaving it");
                report.skipped.push(entry.clone());
                continue;
            }

            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)
                    .io_context("Failed to create link parent directory", parent)?;
            }

            let target = self.project_root.join(entry);
            if !target.exists() {
                tracing::warn!(entry = %entry, target = %target.display(), "Link target does not exist");
            }
            create_symlink(&target, &dest).io_context("Failed to create managed symlink", &dest)?;
            tracing::debug!(entry = %entry, target = %target.display(), "Linked");
            report.created.push(entry.clone());
        }

        Ok(report)
    }
}

fn ensure_relative_entry(entry: &str) -> Result<()> {
    let path = Path::new(entry);
    if path.is_absolute() {
        return Err(Error::config(format!(
            "Managed symlink must be relative: {}",
            entry
        )));
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(Error::config(format!(
            "Managed symlink must stay inside the release: {}",
            entry
        )));
    }
    Ok(())
}

#[cfg(unix)]
pub(crate) fn create_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
pub(crate) fn create_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    if target.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}

#[cfg(not(any(unix, windows)))]
pub(crate) fn create_symlink(_target: &Path, _link: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "Symlinks are not supported on this platform",
    ))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("project");
        let release = temp.path().join("releases").join("1700000000000");
        fs::create_dir_all(project.join("storage")).unwrap();
        fs::write(project.join(".env"), "APP_ENV=prod\n").unwrap();
        fs::create_dir_all(&release).unwrap();
        (temp, project, release)
    }

    #[test]
    fn links_point_at_project_paths() {
        let (_temp, project, release) = setup();
        let provisioner =
            SymlinkProvisioner::new(&project, vec!["storage".into(), ".env".into()]).unwrap();

        let report = provisioner.provision(&release).unwrap();

        assert_eq!(report.created, vec!["storage", ".env"]);
        assert_eq!(fs::read_link(release.join("storage")).unwrap(), project.join("storage"));
        assert_eq!(
            fs::read_to_string(release.join(".env")).unwrap(),
            "APP_ENV=prod\n"
        );
    }

    #[test]
    fn second_run_changes_nothing() {
        let (_temp, project, release) = setup();
        let provisioner = SymlinkProvisioner::new(&project, vec!["storage".into()]).unwrap();

        provisioner.provision(&release).unwrap();
        let before = fs::symlink_metadata(release.join("storage")).unwrap();
        let report = provisioner.provision(&release).unwrap();
        let after = fs::symlink_metadata(release.join("storage")).unwrap();

        assert!(report.created.is_empty());
        assert_eq!(report.skipped, vec!["storage"]);
        assert_eq!(before.modified().unwrap(), after.modified().unwrap());
    }

    #[test]
    fn existing_file_is_not_overwritten() {
        let (_temp, project, release) = setup();
        fs::write(release.join(".env"), "from repo\n").unwrap();
        let provisioner = SymlinkProvisioner::new(&project, vec![".env".into()]).unwrap();

        let report = provisioner.provision(&release).unwrap();

        assert_eq!(report.skipped, vec![".env"]);
        assert_eq!(fs::read_to_string(release.join(".env")).unwrap(), "from repo\n");
    }

    #[test]
    fn dangling_link_counts_as_existing() {
        let (_temp, project, release) = setup();
        std::os::unix::fs::symlink("/nonexistent/target", release.join("storage")).unwrap();
        let provisioner = SymlinkProvisioner::new(&project, vec!["storage".into()]).unwrap();

        let report = provisioner.provision(&release).unwrap();
        assert_eq!(report.skipped, vec!["storage"]);
    }

    #[test]
    fn missing_target_still_links() {
        let (_temp, project, release) = setup();
        let provisioner = SymlinkProvisioner::new(&project, vec!["var/uploads".into()]).unwrap();

        let report = provisioner.provision(&release).unwrap();

        assert_eq!(report.created, vec!["var/uploads"]);
        assert!(fs::symlink_metadata(release.join("var/uploads")).is_ok());
    }

    #[test]
    fn rejects_escaping_entries() {
        let project = Path::new("/srv/shop");
        assert!(SymlinkProvisioner::new(project, vec!["../etc".into()]).is_err());
        assert!(SymlinkProvisioner::new(project, vec!["/etc/passwd".into()]).is_err());
    }

    #[test]
    fn link_failure_is_fatal() {
        let (_temp, project, release) = setup();
        fs::write(release.join("var"), "a file where a directory is needed").unwrap();
        let provisioner = SymlinkProvisioner::new(&project, vec!["var/log".into()]).unwrap();

        let err = provisioner.provision(&release).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
