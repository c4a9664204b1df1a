//! Layered configuration: files, then environment, then flags.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use cutover_core::config::env::layer_from_lookup;
use cutover_core::config::{ConfigLayer, DeployConfig, PhaseSelector, load_file_layers};
use tempfile::TempDir;

fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn environment_overrides_project_file() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("cutover.toml");
    fs::write(
        &file,
        r#"
repository_url = "git@example.com:acme/shop.git"
deployments_dir = "releases"
current_link = "current"
retain = 5
wait_all_servers = false
"#,
    )
    .unwrap();

    let vars = env(&[("N_DEPLOYMENTS_TO_RETAIN", "2"), ("GIT_ARCHIVE_TREEISH", "v3.1.0")]);
    let mut layers = load_file_layers(&[file]).unwrap();
    layers.push(layer_from_lookup(|k| vars.get(k).cloned()).unwrap());

    let config = DeployConfig::resolve(layers).unwrap();
    assert_eq!(config.retain, 2);
    assert_eq!(config.revision, "v3.1.0");
    assert!(!config.wait_all_servers);
    assert_eq!(config.deployments_dir, temp.path().join("releases"));
    assert_eq!(config.current_link, Some(temp.path().join("current")));
    config.validate().unwrap();
}

#[test]
fn flags_override_environment() {
    let vars = env(&[
        ("REPOSITORY_URL", "git@example.com:acme/shop.git"),
        ("CURRENT_SYMLINK_PATH", "/srv/shop/current"),
        ("DEPLOY_PHASE", "GIT_ARCHIVE"),
        ("DEPLOY_STEP_TIMEOUT", "600"),
    ]);
    let flags = ConfigLayer {
        phase: Some("activate".to_string()),
        release_dir: Some(PathBuf::from("/srv/shop/releases/1700000000000")),
        ..ConfigLayer::default()
    };

    let config =
        DeployConfig::resolve([layer_from_lookup(|k| vars.get(k).cloned()).unwrap(), flags])
            .unwrap();
    assert_eq!(config.phase, PhaseSelector::Activate);
    assert_eq!(config.step_timeout, Some(Duration::from_secs(600)));
    config.validate().unwrap();
}

#[test]
fn defaults_apply_when_nothing_is_set() {
    let config = DeployConfig::resolve(Vec::new()).unwrap();
    assert_eq!(config.revision, "HEAD");
    assert_eq!(config.deployments_dir, PathBuf::from(".deployments"));
    assert_eq!(config.install_command.as_deref(), Some("install"));
    assert!(config.wait_all_servers);
    assert_eq!(config.retain, 0);
    assert!(config.validate().unwrap_err().is_config());
}

#[test]
fn missing_files_are_skipped() {
    let temp = TempDir::new().unwrap();
    let layers = load_file_layers(&[temp.path().join("absent.toml")]).unwrap();
    assert!(layers.is_empty());
}

#[test]
fn invalid_phase_in_file_is_rejected() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("cutover.toml");
    fs::write(&file, "phase = \"ROLLBACK\"\n").unwrap();

    let layers = load_file_layers(&[file]).unwrap();
    assert!(DeployConfig::resolve(layers).is_err());
}
