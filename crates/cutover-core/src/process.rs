//! Child process supervision shared by the pipeline steps.
//!
//! Waits suspend on the exit event and are optionally bounded by the
//! configured step timeout, after which the child is killed.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::{Child, Command};

use crate::{Error, Result};

/// Exit status of one executed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepStatus {
    /// Exit code; `None` when the process was terminated by a signal
    pub code: Option<i32>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub timed_out: bool,
}

impl StepStatus {
    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            timed_out: false,
        }
    }

    pub fn timed_out() -> Self {
        Self {
            code: None,
            timed_out: true,
        }
    }

    pub fn success(&self) -> bool {
        !self.timed_out && self.code == Some(0)
    }
}

impl From<ExitStatus> for StepStatus {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            timed_out: false,
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.timed_out, self.code) {
            (true, _) => f.write_str("timed out"),
            (false, Some(code)) => write!(f, "exit {}", code),
            (false, None) => f.write_str("killed by signal"),
        }
    }
}

/// Build a command for a pipeline step.
///
/// The child's stdout is sent to our stderr so structured output on stdout
/// stays clean.
pub fn step_command(program: &Path, args: &[String], cwd: &Path) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(std::io::stderr())
        .kill_on_drop(true);
    cmd
}

pub fn spawn(cmd: &mut Command, program: &Path) -> Result<Child> {
    cmd.spawn()
        .map_err(|e| Error::spawn(program.display().to_string(), e))
}

/// Wait for `child`, killing it once `timeout` elapses.
pub async fn wait(child: &mut Child, program: &Path, timeout: Option<Duration>) -> Result<StepStatus> {
    let Some(limit) = timeout else {
        return child
            .wait()
            .await
            .map(StepStatus::from)
            .map_err(|e| Error::spawn(program.display().to_string(), e));
    };

    match tokio::time::timeout(limit, child.wait()).await {
        Ok(result) => result
            .map(StepStatus::from)
            .map_err(|e| Error::spawn(program.display().to_string(), e)),
        Err(_) => {
            tracing::warn!(
                program = %program.display(),
                timeout_secs = limit.as_secs(),
                "Step timed out, killing process"
            );
            if let Err(err) = child.kill().await {
                tracing::warn!(program = %program.display(), error = %err, "Failed to kill process");
            }
            Ok(StepStatus::timed_out())
        }
    }
}

/// Run `program` with `args` in `cwd` to completion.
pub async fn run(
    program: &Path,
    args: &[String],
    cwd: &Path,
    timeout: Option<Duration>,
) -> Result<StepStatus> {
    tracing::debug!(program = %program.display(), ?args, cwd = %cwd.display(), "Running");
    let mut cmd = step_command(program, args, cwd);
    let mut child = spawn(&mut cmd, program)?;
    wait(&mut child, program, timeout).await
}
