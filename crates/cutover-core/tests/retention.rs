#![cfg(unix)]
//! Retention across sequential deployments.

mod support;

use cutover_core::config::DeployConfig;
use cutover_core::pipeline::{PhaseReached, Pipeline};

use support::{Fixture, next_millisecond, serial};

fn deploy(config: &DeployConfig) -> cutover_core::pipeline::PipelineResult {
    let result = Pipeline::new(config).run_blocking().unwrap();
    assert_eq!(result.phase_reached, PhaseReached::Activated);
    next_millisecond();
    result
}

#[test]
fn three_deployments_with_retention_three_keep_all() {
    let _guard = serial();
    let fx = Fixture::new();
    let config = DeployConfig {
        retain: 3,
        ..fx.config(fx.git_serving_source(), fx.composer(0, 0))
    };

    let results: Vec<_> = (0..3).map(|_| deploy(&config)).collect();

    assert_eq!(fx.release_ids().len(), 3);
    assert_eq!(fx.current_target(), results[2].release_dir);
    assert!(results.iter().all(|r| r.prune.as_ref().unwrap().removed.is_empty()));
}

#[test]
fn fourth_deployment_prunes_the_oldest() {
    let _guard = serial();
    let fx = Fixture::new();
    let config = DeployConfig {
        retain: 3,
        ..fx.config(fx.git_serving_source(), fx.composer(0, 0))
    };

    let results: Vec<_> = (0..4).map(|_| deploy(&config)).collect();
    let ids: Vec<String> = results
        .iter()
        .map(|r| {
            r.release_dir
                .as_ref()
                .unwrap()
                .file_name()
                .unwrap()
                .to_string_lossy()
                .into_owned()
        })
        .collect();

    assert_eq!(fx.release_ids(), ids[1..].to_vec());
    assert_eq!(results[3].prune.as_ref().unwrap().removed, vec![ids[0].clone()]);
    assert!(!results[0].release_dir.as_ref().unwrap().exists());
    assert_eq!(fx.current_target(), results[3].release_dir);
}

#[test]
fn unbounded_retention_keeps_everything() {
    let _guard = serial();
    let fx = Fixture::new();
    let config = fx.config(fx.git_serving_source(), fx.composer(0, 0));

    for _ in 0..4 {
        let result = deploy(&config);
        assert!(result.prune.is_none());
    }

    assert_eq!(fx.release_ids().len(), 4);
}

#[test]
fn failed_deployment_does_not_prune() {
    let _guard = serial();
    let fx = Fixture::new();
    let good = DeployConfig {
        retain: 1,
        ..fx.config(fx.git_serving_source(), fx.composer(0, 0))
    };
    let live = deploy(&good);

    let bad = DeployConfig {
        retain: 1,
        ..fx.config(fx.git_serving_source(), fx.composer(1, 0))
    };
    let failed = Pipeline::new(&bad).run_blocking().unwrap();

    assert_eq!(failed.phase_reached, PhaseReached::Failed);
    assert!(failed.prune.is_none());
    assert_eq!(fx.release_ids().len(), 2);
    assert_eq!(fx.current_target(), live.release_dir);
}
