//! Pipeline phases and steps.

use serde::{Deserialize, Serialize};

/// Furthest point an invocation reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseReached {
    /// Nothing has completed yet
    Fetch,
    /// Archive extracted and managed links in place
    Fetched,
    /// Dependencies installed
    Installed,
    /// Installed and waiting for an external ACTIVATE invocation
    Activate,
    /// Current link points at the release
    Activated,
    /// A step exited unsuccessfully
    Failed,
}

impl PhaseReached {
    pub fn as_str(self) -> &'static str {
        match self {
            PhaseReached::Fetch => "FETCH",
            PhaseReached::Fetched => "FETCHED",
            PhaseReached::Installed => "INSTALLED",
            PhaseReached::Activate => "ACTIVATE",
            PhaseReached::Activated => "ACTIVATED",
            PhaseReached::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for PhaseReached {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Steps that can halt a run by exiting unsuccessfully.
///
/// Linking and activation failures are fatal errors instead, and the
/// post-activation hook and pruning only ever produce warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Archive,
    Extract,
    Install,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Archive => "archive",
            Step::Extract => "extract",
            Step::Install => "install",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halting_steps_serialize_in_snake_case() {
        let names: Vec<_> = [Step::Archive, Step::Extract, Step::Install]
            .into_iter()
            .map(|step| serde_json::to_value(step).unwrap())
            .collect();
        assert_eq!(names, vec!["archive", "extract", "install"]);
        assert_eq!(Step::Extract.to_string(), "extract");
    }

    #[test]
    fn pending_phase_renders_as_activate() {
        assert_eq!(PhaseReached::Activate.to_string(), "ACTIVATE");
        assert_eq!(serde_json::to_value(PhaseReached::Failed).unwrap(), "FAILED");
    }
}
