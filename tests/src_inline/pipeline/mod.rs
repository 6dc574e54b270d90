use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::input::synthetic::SyntheticSource;
use crate::train::SgdTrainer;

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn make_temp_dir() -> PathBuf {
    let mut dir = std::env::temp_dir();
    let id = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    dir.push(format!("ensemble_diversity_pipeline_{}_{}", std::process::id(), id));
    dir
}

fn tiny_config(base: &std::path::Path) -> ExperimentConfig {
    ExperimentConfig {
        hidden: vec![6, 4],
        heads: 3,
        epochs: 1,
        batch_size: 16,
        sweep_scales: vec![0.5, 1.0],
        runs_dir: base.join("runs"),
        out_dir: base.join("out"),
        tsne_iterations: 40,
        tsne_max_examples: 10,
        ..ExperimentConfig::default()
    }
}

#[test]
fn test_run_experiment_end_to_end() {
    let base = make_temp_dir();
    let config = tiny_config(&base);
    let source = SyntheticSource {
        n_rows: 60,
        n_features: 4,
        n_classes: 3,
        ..SyntheticSource::default()
    };
    let outcome = run_experiment(&config, &source, &SgdTrainer::default()).unwrap();

    assert_eq!(outcome.models.len(), 4);
    assert_eq!(outcome.sweep.len(), 6);
    assert_eq!(outcome.hidden.as_ref().map(|h| h.embeddings.len()), Some(2));

    let json = std::fs::read_to_string(&outcome.summary_path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["models"].as_array().unwrap().len(), 4);
    assert_eq!(value["sweep"].as_array().unwrap().len(), 6);
    assert_eq!(value["task"], "classif");

    let report = std::fs::read_to_string(&outcome.report_path).unwrap();
    assert!(report.contains("tabm-mini"));
    assert!(config.out_dir.join("figures").join("tabm_correlation.svg").exists());
}

#[test]
fn test_run_experiment_rejects_single_head() {
    let base = make_temp_dir();
    let config = ExperimentConfig {
        heads: 1,
        ..tiny_config(&base)
    };
    let err = run_experiment(&config, &SyntheticSource::default(), &SgdTrainer::default())
        .unwrap_err();
    assert!(matches!(err, PipelineError::Config(ConfigError::Invalid(_))));
}

#[test]
fn test_run_experiment_regression_without_tsne() {
    let base = make_temp_dir();
    let config = ExperimentConfig {
        task: crate::input::TaskKind::Reg,
        skip_tsne: true,
        sweep_scales: vec![1.0],
        ..tiny_config(&base)
    };
    let source = SyntheticSource {
        n_rows: 50,
        n_features: 3,
        task: crate::input::TaskKind::Reg,
        ..SyntheticSource::default()
    };
    let outcome = run_experiment(&config, &source, &SgdTrainer::default()).unwrap();
    assert!(outcome.hidden.is_none());
    assert_eq!(outcome.sweep.len(), 3);
    assert!(outcome.sweep.iter().all(|r| r.metric.name() == "mse"));
}
