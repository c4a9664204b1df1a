//! Error types for cutover
//!
//! Step failures (a child process exiting non-zero) are not errors: they are
//! recorded in the pipeline result. Everything here aborts the invocation.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for cutover operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors for a pipeline invocation
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error, raised before any step runs
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Unrecognized phase selector
    #[error("Unknown deploy phase: {0} (expected FETCH or ACTIVATE)")]
    InvalidPhase(String),

    /// Filesystem operation failed
    #[error("{context}: {path}")]
    Io {
        context: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Async runtime could not be started
    #[error("Failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// Child process could not be spawned or awaited
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a filesystem error for `path`
    pub fn io(context: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            path: path.into(),
            source,
        }
    }

    /// Create a process spawn error
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    /// Whether this error was caused by configuration rather than the environment
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config { .. } | Error::InvalidPhase(_))
    }
}

/// Attach path context to `std::io::Result` values.
pub(crate) trait IoContext<T> {
    fn io_context(self, context: &str, path: &std::path::Path) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context(self, context: &str, path: &std::path::Path) -> Result<T> {
        self.map_err(|source| Error::io(context, path, source))
    }
}
