use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::input::TabularSource;
use crate::input::synthetic::SyntheticSource;
use crate::model::{AdapterInit, Backbone, EnsembleMlp, ModelSpec};

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn make_temp_dir() -> PathBuf {
    let mut dir = std::env::temp_dir();
    let id = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    dir.push(format!("ensemble_diversity_train_{}_{}", std::process::id(), id));
    dir
}

fn small_model(input_dim: usize, output_dim: usize) -> EnsembleMlp {
    EnsembleMlp::new(&ModelSpec {
        name: "tabm".to_string(),
        backbone: Backbone::Tabm,
        dims: vec![input_dim, 16, output_dim],
        n_heads: 4,
        adapter_init: AdapterInit::default(),
        seed: 3,
    })
    .unwrap()
}

#[test]
fn test_sgd_reduces_loss_and_writes_log() {
    let source = SyntheticSource {
        n_rows: 240,
        n_features: 5,
        n_classes: 3,
        noise: 0.5,
        ..SyntheticSource::default()
    };
    let splits = source.get_data(0.2, 16, 42).unwrap();
    let mut model = small_model(splits.input_dim, splits.output_dim);
    let before = model
        .loss(splits.train.data.x.view(), &splits.train.data.targets)
        .unwrap();

    let dir = make_temp_dir();
    let trainer = SgdTrainer { lr: 0.1, seed: 1 };
    let report = trainer
        .train(&mut model, &splits.train, &splits.test, &dir, 15)
        .unwrap();

    assert_eq!(report.epochs, 15);
    assert!(report.train_loss < before, "{} !< {}", report.train_loss, before);
    assert!(matches!(report.test_metric, TaskMetric::Accuracy(a) if a > 0.5));

    let log = fs::read_to_string(&report.log_path).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines[0], "epoch\ttrain_loss\ttest_loss\ttest_metric");
    assert_eq!(lines.len(), 16);
    assert!(lines[15].starts_with("15\t"));
}

#[test]
fn test_regression_reports_mse() {
    let source = SyntheticSource {
        n_rows: 80,
        n_features: 3,
        task: crate::input::TaskKind::Reg,
        ..SyntheticSource::default()
    };
    let splits = source.get_data(0.25, 8, 42).unwrap();
    let mut model = small_model(splits.input_dim, 1);
    let report = SgdTrainer::default()
        .train(&mut model, &splits.train, &splits.test, &make_temp_dir(), 2)
        .unwrap();
    assert_eq!(report.test_metric.name(), "mse");
}

#[test]
fn test_zero_epochs_still_reports() {
    let source = SyntheticSource {
        n_rows: 30,
        n_features: 2,
        n_classes: 2,
        ..SyntheticSource::default()
    };
    let splits = source.get_data(0.2, 8, 42).unwrap();
    let mut model = small_model(2, 2);
    let report = SgdTrainer::default()
        .train(&mut model, &splits.train, &splits.test, &make_temp_dir(), 0)
        .unwrap();
    assert_eq!(report.epochs, 0);
    assert!(report.log_path.exists());
}

#[test]
fn test_bad_learning_rate() {
    let source = SyntheticSource {
        n_rows: 30,
        n_features: 2,
        n_classes: 2,
        ..SyntheticSource::default()
    };
    let splits = source.get_data(0.2, 8, 42).unwrap();
    let mut model = small_model(2, 2);
    let err = SgdTrainer { lr: 0.0, seed: 1 }
        .train(&mut model, &splits.train, &splits.test, &make_temp_dir(), 1)
        .unwrap_err();
    assert!(matches!(err, TrainError::Setup(_)));
}
