//! Release fetcher: stream `git archive` into `tar -x` inside a release.
//!
//! The archive is relayed chunk by chunk; a write to the extractor waits
//! for it to drain, so a slow extractor stalls the producer instead of the
//! archive being buffered in memory.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdout};

use crate::config::DeployConfig;
use crate::pipeline::Step;
use crate::process::{self, StepStatus};
use crate::release::Release;
use crate::{Error, Result};

const CHUNK_SIZE: usize = 64 * 1024;

/// Exit statuses of the two fetch processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FetchOutcome {
    pub archive: StepStatus,
    /// `None` when the extractor was never started or was killed because
    /// the archive producer failed
    pub extract: Option<StepStatus>,
}

impl FetchOutcome {
    pub fn success(&self) -> bool {
        self.archive.success() && self.extract.is_some_and(|s| s.success())
    }

    /// Step to blame when the fetch did not succeed.
    ///
    /// An extractor that failed on its own is blamed even if the producer
    /// then died writing into the closed pipe.
    pub fn failed_step(&self) -> Option<Step> {
        match self.extract {
            Some(extract) if !extract.success() => Some(Step::Extract),
            _ if !self.archive.success() => Some(Step::Archive),
            None => Some(Step::Extract),
            Some(_) => None,
        }
    }
}

/// Materializes a revision into a release directory.
#[derive(Debug, Clone)]
pub struct ReleaseFetcher {
    git_path: PathBuf,
    tar_path: PathBuf,
    repository_url: String,
    revision: String,
    exclude_paths: Vec<String>,
    timeout: Option<Duration>,
}

impl ReleaseFetcher {
    pub fn new(repository_url: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            git_path: PathBuf::from("git"),
            tar_path: PathBuf::from("tar"),
            repository_url: repository_url.into(),
            revision: revision.into(),
            exclude_paths: Vec::new(),
            timeout: None,
        }
    }

    pub fn from_config(config: &DeployConfig) -> Result<Self> {
        let url = config
            .repository_url
            .as_deref()
            .ok_or_else(|| Error::config("repository_url (REPOSITORY_URL) is required"))?;
        Ok(Self::new(url, config.revision.as_str())
            .with_tools(config.git_path.clone(), config.tar_path.clone())
            .with_excludes(config.exclude_paths.clone())
            .with_timeout(config.step_timeout))
    }

    pub fn with_tools(mut self, git_path: PathBuf, tar_path: PathBuf) -> Self {
        self.git_path = git_path;
        self.tar_path = tar_path;
        self
    }

    pub fn with_excludes(mut self, exclude_paths: Vec<String>) -> Self {
        self.exclude_paths = exclude_paths;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments for the archive producer.
    pub fn archive_args(&self) -> Vec<String> {
        vec![
            "archive".to_string(),
            "--format=tar".to_string(),
            "--remote".to_string(),
            self.repository_url.clone(),
            "--worktree-attributes".to_string(),
            self.revision.clone(),
        ]
    }

    /// Arguments for the extractor, one `--exclude` per pattern.
    pub fn extract_args(&self) -> Vec<String> {
        let mut args = vec!["-x".to_string(), "-f".to_string(), "-".to_string()];
        args.extend(self.exclude_paths.iter().map(|p| format!("--exclude={}", p)));
        args
    }

    /// Stream the revision into `release.dir`.
    ///
    /// A failed extraction leaves whatever was written in place; the release
    /// is never activated and is left for retention cleanup.
    pub async fn fetch(&self, release: &Release) -> Result<FetchOutcome> {
        tracing::info!(
            release = %release.id,
            repository = %self.repository_url,
            revision = %self.revision,
            "Fetching release"
        );

        let outcome = match self.timeout {
            None => self.stream(release).await?,
            Some(limit) => match tokio::time::timeout(limit, self.stream(release)).await {
                Ok(result) => result?,
                Err(_) => {
                    // Dropping the stream future kills both children.
                    tracing::warn!(
                        release = %release.id,
                        timeout_secs = limit.as_secs(),
                        "Fetch timed out"
                    );
                    FetchOutcome {
                        archive: StepStatus::timed_out(),
                        extract: None,
                    }
                }
            },
        };

        tracing::info!(
            release = %release.id,
            archive = %outcome.archive,
            extract = %outcome
                .extract
                .map(|s| s.to_string())
                .unwrap_or_else(|| "not run".to_string()),
            "Fetch finished"
        );
        Ok(outcome)
    }

    async fn stream(&self, release: &Release) -> Result<FetchOutcome> {
        let mut producer_cmd =
            process::step_command(&self.git_path, &self.archive_args(), &release.dir);
        producer_cmd.stdout(Stdio::piped());
        let mut producer = process::spawn(&mut producer_cmd, &self.git_path)?;
        let mut stdout = take_stdout(&mut producer, &self.git_path)?;

        let mut first = vec![0u8; CHUNK_SIZE];
        let read = stdout
            .read(&mut first)
            .await
            .map_err(|e| Error::io("Failed to read archive stream", &release.dir, e))?;

        if read == 0 {
            drop(stdout);
            let archive = process::wait(&mut producer, &self.git_path, None).await?;
            if !archive.success() {
                return Ok(FetchOutcome {
                    archive,
                    extract: None,
                });
            }
            // Empty archive: let the extractor judge it.
            let mut extractor = self.spawn_extractor(release)?;
            drop(extractor.stdin.take());
            let extract = process::wait(&mut extractor, &self.tar_path, None).await?;
            return Ok(FetchOutcome {
                archive,
                extract: Some(extract),
            });
        }

        let mut extractor = self.spawn_extractor(release)?;
        let mut stdin = extractor.stdin.take().ok_or_else(|| {
            Error::spawn(
                self.tar_path.display().to_string(),
                std::io::Error::other("stdin was not captured"),
            )
        })?;

        let relay = async {
            stdin.write_all(&first[..read]).await?;
            tokio::io::copy(&mut stdout, &mut stdin).await?;
            Ok::<(), std::io::Error>(())
        }
        .await;
        // Closing our read end makes a still-writing producer fail fast.
        drop(stdout);

        match relay {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => {
                // The extractor stopped reading; its own exit decides the step.
                drop(stdin);
                let extract = process::wait(&mut extractor, &self.tar_path, None).await?;
                let archive = process::wait(&mut producer, &self.git_path, None).await?;
                tracing::warn!(
                    release = %release.id,
                    extract = %extract,
                    "Extractor closed its input before the archive ended"
                );
                return Ok(FetchOutcome {
                    archive,
                    extract: Some(extract),
                });
            }
            Err(err) => {
                let _ = producer.kill().await;
                let _ = extractor.kill().await;
                return Err(Error::io("Failed to relay archive stream", &release.dir, err));
            }
        }

        let archive = process::wait(&mut producer, &self.git_path, None).await?;
        if !archive.success() {
            let extract = match extractor.try_wait() {
                Ok(Some(status)) if !status.success() => Some(StepStatus::from(status)),
                _ => {
                    // The extractor must not see EOF on a truncated archive.
                    if let Err(err) = extractor.kill().await {
                        tracing::debug!(error = %err, "Extractor already exited");
                    }
                    None
                }
            };
            return Ok(FetchOutcome { archive, extract });
        }

        drop(stdin);
        let extract = process::wait(&mut extractor, &self.tar_path, None).await?;
        Ok(FetchOutcome {
            archive,
            extract: Some(extract),
        })
    }

    fn spawn_extractor(&self, release: &Release) -> Result<Child> {
        let mut cmd = process::step_command(&self.tar_path, &self.extract_args(), &release.dir);
        cmd.stdin(Stdio::piped());
        process::spawn(&mut cmd, &self.tar_path)
    }
}

fn take_stdout(child: &mut Child, program: &std::path::Path) -> Result<ChildStdout> {
    child.stdout.take().ok_or_else(|| {
        Error::spawn(
            program.display().to_string(),
            std::io::Error::other("stdout was not captured"),
        )
    })
}
