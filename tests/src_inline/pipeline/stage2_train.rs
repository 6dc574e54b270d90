use super::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::input::TabularSource;
use crate::input::synthetic::SyntheticSource;
use crate::model::EnsembleModel;
use crate::train::SgdTrainer;

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn make_temp_dir() -> PathBuf {
    let mut dir = std::env::temp_dir();
    let id = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    dir.push(format!("ensemble_diversity_stage2_{}_{}", std::process::id(), id));
    dir
}

fn small_config() -> ExperimentConfig {
    ExperimentConfig {
        hidden: vec![8, 6],
        heads: 3,
        epochs: 1,
        batch_size: 16,
        ..ExperimentConfig::default()
    }
}

#[test]
fn test_model_spec_dims_and_seed() {
    let source = SyntheticSource {
        n_rows: 40,
        n_features: 5,
        n_classes: 4,
        ..SyntheticSource::default()
    };
    let splits = source.get_data(0.2, 8, 42).unwrap();
    let config = small_config();
    let a = model_spec("tabm", Backbone::Tabm, AdapterInit::default(), &splits, &config);
    let b = model_spec("mlpk", Backbone::Mlpk, AdapterInit::default(), &splits, &config);
    assert_eq!(a.dims, vec![5, 8, 6, 4]);
    assert_eq!(a.n_heads, 3);
    assert_ne!(a.seed, b.seed);
}

#[test]
fn test_stage2_trains_every_candidate() {
    let source = SyntheticSource {
        n_rows: 60,
        n_features: 4,
        n_classes: 3,
        ..SyntheticSource::default()
    };
    let splits = source.get_data(0.2, 16, 42).unwrap();
    let config = small_config();
    let trainer = SgdTrainer::default();
    let runs = make_temp_dir();
    let trained = run_stage2(&Stage2Inputs {
        splits: &splits,
        config: &config,
        trainer: &trainer,
        runs_dir: &runs,
    })
    .unwrap();

    let names: Vec<&str> = trained.iter().map(|t| t.model.name()).collect();
    assert_eq!(names, vec!["mlpk", "tabm-naive", "tabm-mini", "tabm"]);
    for name in names {
        assert!(runs.join(name).join("train_log.tsv").exists());
    }
}
