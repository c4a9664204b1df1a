//! Structured outcome of one pipeline invocation.

use std::path::PathBuf;

use serde::Serialize;

use super::{PhaseReached, Step};
use crate::links::LinkReport;
use crate::process::StepStatus;
use crate::prune::PruneReport;

/// Status codes of the steps that actually ran.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StepStatuses {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<StepStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract: Option<StepStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install: Option<StepStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_activation: Option<StepStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineResult {
    pub phase_reached: PhaseReached,
    /// Release this invocation worked on; pass it back for ACTIVATE
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_dir: Option<PathBuf>,
    /// Set when the release is installed and awaits an ACTIVATE invocation
    pub pending_activation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<Step>,
    pub statuses: StepStatuses,
    /// Why the post-activation hook could not be started at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_activation_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<LinkReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prune: Option<PruneReport>,
}

impl PipelineResult {
    pub(crate) fn new(phase_reached: PhaseReached) -> Self {
        Self {
            phase_reached,
            release_dir: None,
            pending_activation: false,
            failed_step: None,
            statuses: StepStatuses::default(),
            post_activation_error: None,
            links: None,
            prune: None,
        }
    }

    pub(crate) fn fail(&mut self, step: Step) {
        tracing::warn!(step = %step, "Pipeline halted");
        self.phase_reached = PhaseReached::Failed;
        self.failed_step = Some(step);
    }

    /// The current link now points at this release.
    pub fn is_activated(&self) -> bool {
        self.phase_reached == PhaseReached::Activated
    }

    /// Nothing failed: either activated or waiting for activation.
    pub fn is_success(&self) -> bool {
        matches!(
            self.phase_reached,
            PhaseReached::Activated | PhaseReached::Activate
        )
    }

    /// Best-effort steps that ran after activation but did not succeed.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if let Some(status) = self.statuses.post_activation
            && !status.success()
        {
            warnings.push(format!("post-activation hook failed ({})", status));
        }
        if let Some(error) = &self.post_activation_error {
            warnings.push(format!("post-activation hook could not run: {}", error));
        }
        if let Some(prune) = &self.prune {
            for failure in &prune.failed {
                warnings.push(format!(
                    "could not prune {}: {}",
                    failure.path.display(),
                    failure.error
                ));
            }
        }
        warnings
    }
}
