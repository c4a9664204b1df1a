//! Deployment pipeline: fetch → link → install → (wait) → activate → prune.
//!
//! One invocation runs one phase. `FETCH` materializes and installs a new
//! release and, unless the deployment waits for all servers, activates it
//! right away. `ACTIVATE` takes a release produced by an earlier `FETCH` and
//! switches the current link to it. An external coordinator owns the wait
//! between the two.
//!
//! A step exiting non-zero stops the pipeline and is reported through
//! [`PipelineResult`]; only unexpected failures (filesystem errors, missing
//! executables, bad configuration) surface as [`Error`].

mod phase;
mod result;

use std::path::Path;

use tracing::Instrument;

pub use phase::{PhaseReached, Step};
pub use result::{PipelineResult, StepStatuses};

use crate::activate::Activator;
use crate::config::{DeployConfig, PhaseSelector};
use crate::fetch::ReleaseFetcher;
use crate::install::DependencyInstaller;
use crate::links::SymlinkProvisioner;
use crate::prune::RetentionPruner;
use crate::release::Release;
use crate::{Error, Result};

/// Runs pipeline phases against one resolved configuration.
#[derive(Debug, Clone, Copy)]
pub struct Pipeline<'a> {
    config: &'a DeployConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a DeployConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DeployConfig {
        self.config
    }

    /// Run the phase selected by the configuration.
    pub async fn run(&self) -> Result<PipelineResult> {
        match self.config.phase {
            PhaseSelector::Fetch => self.start_deployment().await,
            PhaseSelector::Activate => {
                self.config.validate_for(PhaseSelector::Activate)?;
                let release_dir = self
                    .config
                    .release_dir
                    .as_deref()
                    .ok_or_else(|| Error::config("release_dir is required for the ACTIVATE phase"))?;
                self.activate_deployment(release_dir).await
            }
        }
    }

    /// [`Pipeline::run`] on a private tokio runtime.
    pub fn run_blocking(&self) -> Result<PipelineResult> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(Error::Runtime)?;
        runtime.block_on(self.run())
    }

    /// FETCH phase: create a release, fetch, link and install it.
    ///
    /// With `wait_all_servers` the result carries the release directory and
    /// `pending_activation`; otherwise the release is activated in this call.
    pub async fn start_deployment(&self) -> Result<PipelineResult> {
        let config = self.config;
        config.validate_for(PhaseSelector::Fetch)?;

        let fetcher = ReleaseFetcher::from_config(config)?;
        let provisioner = match &config.project_root {
            Some(root) if !config.managed_symlinks.is_empty() => Some(SymlinkProvisioner::new(
                root,
                config.managed_symlinks.clone(),
            )?),
            _ => None,
        };

        let release = Release::create(&config.deployments_dir)?;
        let span = tracing::info_span!("deploy", release = %release.id);
        self.deploy_release(release, fetcher, provisioner)
            .instrument(span)
            .await
    }

    async fn deploy_release(
        &self,
        release: Release,
        fetcher: ReleaseFetcher,
        provisioner: Option<SymlinkProvisioner>,
    ) -> Result<PipelineResult> {
        let config = self.config;
        let mut result = PipelineResult::new(PhaseReached::Fetch);
        result.release_dir = Some(release.dir.clone());

        let fetched = fetcher.fetch(&release).await?;
        result.statuses.archive = Some(fetched.archive);
        result.statuses.extract = fetched.extract;
        if let Some(step) = fetched.failed_step() {
            result.fail(step);
            return Ok(result);
        }

        if let Some(provisioner) = provisioner {
            result.links = Some(provisioner.provision(&release.dir)?);
        }
        result.phase_reached = PhaseReached::Fetched;

        if let Some(command) = &config.install_command {
            let status = DependencyInstaller::from_config(config)
                .install(&release.dir, command)
                .await?;
            result.statuses.install = Some(status);
            if !status.success() {
                result.fail(Step::Install);
                return Ok(result);
            }
        } else {
            tracing::debug!("No install command configured, skipping install");
        }
        result.phase_reached = PhaseReached::Installed;

        if config.wait_all_servers {
            tracing::info!(
                dir = %release.dir.display(),
                "Release installed, waiting for activation"
            );
            result.phase_reached = PhaseReached::Activate;
            result.pending_activation = true;
            return Ok(result);
        }

        self.activate_into(&release.dir, result).await
    }

    /// ACTIVATE phase: switch the current link to `release_dir` and prune.
    pub async fn activate_deployment(&self, release_dir: &Path) -> Result<PipelineResult> {
        let config = self.config;
        config.current_link()?;
        if !release_dir.is_dir() {
            return Err(Error::config(format!(
                "Release directory does not exist: {}",
                release_dir.display()
            )));
        }

        let release = Release::from_dir(release_dir);
        let span = tracing::info_span!("activate", release = %release.id);

        let mut result = PipelineResult::new(PhaseReached::Installed);
        result.release_dir = Some(release.dir.clone());
        self.activate_into(&release.dir, result)
            .instrument(span)
            .await
    }

    async fn activate_into(
        &self,
        release_dir: &Path,
        mut result: PipelineResult,
    ) -> Result<PipelineResult> {
        let config = self.config;

        Activator::new(config.current_link()?).activate(release_dir)?;
        result.phase_reached = PhaseReached::Activated;
        result.pending_activation = false;

        if let Some(command) = &config.post_activation_command {
            match DependencyInstaller::from_config(config)
                .post_activation(release_dir, command)
                .await
            {
                Ok(status) => result.statuses.post_activation = Some(status),
                Err(err) => {
                    // Activation is committed; the hook cannot undo it.
                    tracing::warn!(error = %err, "Post-activation hook could not run");
                    result.post_activation_error = Some(err.to_string());
                }
            }
        }

        if result.is_activated() && config.retain > 0 {
            let report = RetentionPruner::new(&config.deployments_dir, config.retain).prune();
            result.prune = Some(report);
        }

        Ok(result)
    }
}
