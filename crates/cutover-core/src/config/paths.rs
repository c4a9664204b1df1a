//! Config file discovery.

use std::path::{Path, PathBuf};

use super::{ConfigLayer, parse_config_file};

pub const CONFIG_FILE_NAME: &str = "cutover.toml";

/// Candidate config files in ascending precedence: global, then project.
pub fn config_paths(project_root: &Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("cutover").join(CONFIG_FILE_NAME));
    }
    paths.push(project_root.join(CONFIG_FILE_NAME));
    paths
}

/// Load every existing file among `paths`, rebasing relative paths onto
/// the directory that holds each file.
pub fn load_file_layers(paths: &[PathBuf]) -> anyhow::Result<Vec<ConfigLayer>> {
    let mut layers = Vec::new();
    for path in paths {
        if !path.is_file() {
            continue;
        }
        let layer = parse_config_file(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        tracing::debug!(path = %path.display(), "Loaded config file");
        layers.push(layer.rebase(base));
    }
    Ok(layers)
}
