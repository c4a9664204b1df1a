//! Cutover Core Library
//!
//! Atomic release pipeline: materialize a revision into its own release
//! directory, install its dependencies, then swap the `current` symlink onto
//! it in a single rename and prune releases outside the retention window.

pub mod activate;
pub mod config;
pub mod error;
pub mod fetch;
pub mod install;
pub mod links;
pub mod pipeline;
pub mod process;
pub mod prune;
pub mod release;

pub use error::{Error, Result};

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{ConfigLayer, DeployConfig, PhaseSelector};

    // Pipeline
    pub use crate::pipeline::{PhaseReached, Pipeline, PipelineResult, Step, StepStatuses};

    // Steps
    pub use crate::links::LinkReport;
    pub use crate::process::StepStatus;
    pub use crate::prune::PruneReport;
    pub use crate::release::Release;

    // Errors
    pub use crate::error::{Error, Result};
}
