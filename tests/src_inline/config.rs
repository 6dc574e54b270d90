use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn temp_file(contents: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    let id = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    dir.push(format!("ensemble_diversity_config_{}_{}", std::process::id(), id));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("config.json");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_defaults() {
    let cfg = ExperimentConfig::default();
    assert_eq!(cfg.hidden, vec![64, 32, 16, 10]);
    assert_eq!(cfg.batch_size, 32);
    assert_eq!(cfg.epochs, 20);
    assert_eq!(cfg.split, 0.2);
    assert_eq!(cfg.seed, 42);
    assert_eq!(cfg.sweep_scales, vec![0.1, 0.5, 1.0, 2.0]);
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_partial_json_fills_defaults() {
    let path = temp_file(r#"{"epochs": 3, "task": "reg", "degenerate": "reject"}"#);
    let cfg = ExperimentConfig::load(&path).unwrap();
    assert_eq!(cfg.epochs, 3);
    assert_eq!(cfg.task, TaskKind::Reg);
    assert_eq!(cfg.degenerate, DegeneratePolicy::Reject);
    assert_eq!(cfg.heads, 8);
}

#[test]
fn test_unknown_field_rejected() {
    let path = temp_file(r#"{"epoch": 3}"#);
    assert!(matches!(
        ExperimentConfig::load(&path),
        Err(ConfigError::Json { .. })
    ));
}

#[test]
fn test_invalid_values_rejected() {
    let path = temp_file(r#"{"heads": 1}"#);
    assert!(matches!(
        ExperimentConfig::load(&path),
        Err(ConfigError::Invalid(_))
    ));
    let cfg = ExperimentConfig {
        split: 1.0,
        ..ExperimentConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_missing_file() {
    let err = ExperimentConfig::load(Path::new("/nonexistent/config.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn test_tsne_params_follow_seed() {
    let cfg = ExperimentConfig {
        seed: 5,
        tsne_iterations: 10,
        ..ExperimentConfig::default()
    };
    let params = cfg.tsne_params();
    assert_eq!(params.seed, 5);
    assert_eq!(params.n_iter, 10);
    assert_eq!(params.perplexity, 30.0);
}
