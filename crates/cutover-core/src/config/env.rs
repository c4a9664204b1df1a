//! Environment variable layer.
//!
//! Variable names follow the deployer's historical contract so existing
//! provisioning scripts keep working. Empty values count as unset, except
//! for the composer commands, where an empty value disables the step.

use std::path::PathBuf;

use super::{ConfigLayer, parse_bool, split_list};
use crate::{Error, Result};

pub const REPOSITORY_URL: &str = "REPOSITORY_URL";
pub const DEPLOYMENTS_DIRECTORY: &str = "DEPLOYMENTS_DIRECTORY";
pub const GIT_ARCHIVE_TREEISH: &str = "GIT_ARCHIVE_TREEISH";
pub const TAR_EXTRACT_EXCLUDE_PATHS: &str = "TAR_EXTRACT_EXCLUDE_PATHS";
pub const CURRENT_SYMLINK_PATH: &str = "CURRENT_SYMLINK_PATH";
pub const PROJECT_PATH: &str = "PROJECT_PATH";
pub const PROJECT_MANAGED_SYMLINKS: &str = "PROJECT_MANAGED_SYMLINKS";
pub const COMPOSER_PATH: &str = "COMPOSER_PATH";
pub const COMPOSER_COMMAND: &str = "COMPOSER_COMMAND";
pub const COMPOSER_POST_ACTIVATION_COMMAND: &str = "COMPOSER_POST_ACTIVATION_COMMAND";
pub const N_DEPLOYMENTS_TO_RETAIN: &str = "N_DEPLOYMENTS_TO_RETAIN";
pub const WAIT_ALL_SERVERS: &str = "WAIT_ALL_SERVERS";
pub const DEPLOY_PHASE: &str = "DEPLOY_PHASE";
pub const DEPLOY_RELEASE_DIR: &str = "DEPLOY_RELEASE_DIR";
pub const DEPLOY_STEP_TIMEOUT: &str = "DEPLOY_STEP_TIMEOUT";

/// Build a layer from the process environment.
pub fn layer_from_env() -> Result<ConfigLayer> {
    layer_from_lookup(|key| std::env::var(key).ok())
}

/// Build a layer from an arbitrary variable lookup.
pub fn layer_from_lookup<F>(lookup: F) -> Result<ConfigLayer>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

    let step_timeout_secs = match get(DEPLOY_STEP_TIMEOUT) {
        Some(value) => Some(value.trim().parse::<u64>().map_err(|_| {
            Error::config(format!(
                "{} must be a whole number of seconds, got '{}'",
                DEPLOY_STEP_TIMEOUT, value
            ))
        })?),
        None => None,
    };

    let wait_all_servers = match get(WAIT_ALL_SERVERS) {
        Some(value) => Some(parse_bool(WAIT_ALL_SERVERS, &value)?),
        None => None,
    };

    Ok(ConfigLayer {
        repository_url: get(REPOSITORY_URL),
        revision: get(GIT_ARCHIVE_TREEISH),
        deployments_dir: get(DEPLOYMENTS_DIRECTORY).map(PathBuf::from),
        exclude_paths: get(TAR_EXTRACT_EXCLUDE_PATHS).map(|v| split_list(&v)),
        current_link: get(CURRENT_SYMLINK_PATH).map(PathBuf::from),
        project_root: get(PROJECT_PATH).map(PathBuf::from),
        managed_symlinks: get(PROJECT_MANAGED_SYMLINKS).map(|v| split_list(&v)),
        composer_path: get(COMPOSER_PATH).map(PathBuf::from),
        install_command: lookup(COMPOSER_COMMAND),
        post_activation_command: lookup(COMPOSER_POST_ACTIVATION_COMMAND),
        retain: get(N_DEPLOYMENTS_TO_RETAIN).map(|v| v.trim().parse::<i64>().unwrap_or(0)),
        wait_all_servers,
        phase: get(DEPLOY_PHASE),
        release_dir: get(DEPLOY_RELEASE_DIR).map(PathBuf::from),
        git_path: None,
        tar_path: None,
        step_timeout_secs,
    })
}
