//! Fake git/tar/composer executables for pipeline tests.
//!
//! Tests that write scripts take [`serial`] first: forking while another
//! thread holds a freshly written script open makes exec fail with ETXTBSY.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use cutover_core::config::{ConfigLayer, DeployConfig};
use tempfile::TempDir;

static SERIAL: Mutex<()> = Mutex::new(());

pub fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("write script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod script");
    path
}

/// Everything a deployment needs, rooted in one temp dir.
pub struct Fixture {
    pub temp: TempDir,
    pub bin: PathBuf,
    pub source: PathBuf,
    pub project: PathBuf,
    pub deployments: PathBuf,
    pub current: PathBuf,
    pub composer_log: PathBuf,
    pub tar_marker: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("tempdir");
        let root = temp.path().to_path_buf();
        let fixture = Self {
            bin: root.join("bin"),
            source: root.join("source"),
            project: root.join("project"),
            deployments: root.join("deployments"),
            current: root.join("current"),
            composer_log: root.join("composer.log"),
            tar_marker: root.join("tar-started"),
            temp,
        };
        fs::create_dir_all(&fixture.bin).unwrap();
        fs::create_dir_all(fixture.source.join("src")).unwrap();
        fs::create_dir_all(fixture.source.join("tests")).unwrap();
        fs::write(fixture.source.join("index.php"), "<?php echo 'v1';\n").unwrap();
        fs::write(fixture.source.join("src/App.php"), "<?php class App {}\n").unwrap();
        fs::write(fixture.source.join("tests/AppTest.php"), "<?php\n").unwrap();
        fs::create_dir_all(fixture.project.join("storage")).unwrap();
        fs::write(fixture.project.join(".env"), "APP_ENV=prod\n").unwrap();
        fixture
    }

    /// `git archive` stand-in producing a tar of `source`.
    pub fn git_serving_source(&self) -> PathBuf {
        write_script(
            &self.bin,
            "git",
            &format!("exec tar -cf - -C '{}' .", self.source.display()),
        )
    }

    pub fn git_failing(&self, code: i32) -> PathBuf {
        write_script(
            &self.bin,
            "git",
            &format!("echo 'fatal: remote error' >&2\nexit {}", code),
        )
    }

    /// Emits some bytes, then fails.
    pub fn git_failing_midstream(&self) -> PathBuf {
        write_script(&self.bin, "git", "printf 'partial archive bytes'\nexit 1")
    }

    /// Streams `bytes` of zeros, far more than a pipe buffer holds.
    pub fn git_streaming_bytes(&self, bytes: usize) -> PathBuf {
        write_script(&self.bin, "git", &format!("exec head -c {} /dev/zero", bytes))
    }

    /// Never produces output.
    pub fn git_hanging(&self) -> PathBuf {
        write_script(&self.bin, "git", "exec sleep 5")
    }

    /// Extractor that records it was started and exits without reading.
    pub fn tar_refusing_input(&self, code: i32) -> PathBuf {
        write_script(
            &self.bin,
            "tar",
            &format!("touch '{}'\nexit {}", self.tar_marker.display(), code),
        )
    }

    /// Extractor that records it was started, drains input and exits.
    pub fn tar_recording(&self, code: i32) -> PathBuf {
        write_script(
            &self.bin,
            "tar",
            &format!(
                "touch '{}'\ncat > partial.tar\nexit {}",
                self.tar_marker.display(),
                code
            ),
        )
    }

    /// Composer stand-in logging its arguments; `install` exits with
    /// `install_code`, any other subcommand with `other_code`.
    pub fn composer(&self, install_code: i32, other_code: i32) -> PathBuf {
        write_script(
            &self.bin,
            "composer",
            &format!(
                "echo \"$*\" >> '{log}'\ncase \"$1\" in\n  install) exit {install_code} ;;\n  *) exit {other_code} ;;\nesac",
                log = self.composer_log.display(),
            ),
        )
    }

    pub fn composer_calls(&self) -> Vec<String> {
        fs::read_to_string(&self.composer_log)
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Config wired to the fixture's paths and the system `tar`.
    pub fn config(&self, git: PathBuf, composer: PathBuf) -> DeployConfig {
        DeployConfig::resolve([ConfigLayer {
            repository_url: Some("git@example.com:acme/shop.git".to_string()),
            deployments_dir: Some(self.deployments.clone()),
            current_link: Some(self.current.clone()),
            project_root: Some(self.project.clone()),
            composer_path: Some(composer),
            git_path: Some(git),
            tar_path: Some(PathBuf::from("tar")),
            wait_all_servers: Some(false),
            ..ConfigLayer::default()
        }])
        .expect("fixture config resolves")
    }

    pub fn current_target(&self) -> Option<PathBuf> {
        fs::read_link(&self.current).ok()
    }

    pub fn release_ids(&self) -> Vec<String> {
        cutover_core::release::list_releases(&self.deployments)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect()
    }
}

/// Wait long enough for the next release to get a distinct timestamp.
pub fn next_millisecond() {
    std::thread::sleep(std::time::Duration::from_millis(5));
}
