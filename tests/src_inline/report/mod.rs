use super::*;
use crate::model::InitDistribution;
use crate::report::json::render_summary_json;
use crate::report::text::{render_report_text, render_sweep_table};

fn model(name: &str, spearman: f64) -> ModelSummary {
    ModelSummary {
        name: name.to_string(),
        backbone: name.to_string(),
        spearman,
        kl_dispersion: 0.01,
        mean_off_diagonal: 0.5,
        metric: TaskMetric::Accuracy(0.8),
        train_loss: 0.4,
        test_loss: 0.5,
        correlation: vec![vec![1.0, 0.5], vec![0.5, 1.0]],
        train_log: PathBuf::from("runs/x/train_log.tsv"),
        figures: Vec::new(),
    }
}

fn summary() -> SummaryData {
    SummaryData {
        tool: "ensemble-diversity".to_string(),
        version: "0.1.0".to_string(),
        source: "wine.csv".to_string(),
        task: "classif".to_string(),
        heads: 2,
        hidden_widths: vec![8],
        epochs: 1,
        seed: 42,
        n_train: 80,
        n_test: 20,
        degenerate_policy: "zero".to_string(),
        models: vec![model("mlpk", 0.6), model("tabm", 0.9)],
        most_diverse: Some("mlpk".to_string()),
        sweep: vec![InitSweepResult {
            scale: 0.5,
            distribution: InitDistribution::Laplace,
            spearman: 0.8125,
            metric: TaskMetric::Accuracy(0.7),
        }],
        hidden: None,
    }
}

#[test]
fn test_mean_off_diagonal() {
    let m = vec![vec![1.0, 0.2, 0.4], vec![0.2, 1.0, 0.6], vec![0.4, 0.6, 1.0]];
    assert!((mean_off_diagonal(&m) - 0.4).abs() < 1e-12);
    assert_eq!(mean_off_diagonal(&[vec![1.0]]), 0.0);
}

#[test]
fn test_most_diverse_picks_lowest_spearman() {
    let models = vec![model("tabm", 0.9), model("mlpk", 0.3), model("tabm-mini", 0.3)];
    assert_eq!(most_diverse(&models).as_deref(), Some("mlpk"));
    assert_eq!(most_diverse(&[]), None);
}

#[test]
fn test_sweep_table_rows() {
    let table = render_sweep_table(&summary().sweep);
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("accuracy"));
    assert!(lines[1].contains("laplace"));
    assert!(lines[1].contains("0.8125"));
}

#[test]
fn test_report_text_sections() {
    let text = render_report_text(&summary());
    assert!(text.starts_with("Ensemble Head Diversity Report"));
    assert!(text.contains("mlpk: spearman=0.6000"));
    assert!(text.contains("Most diverse heads: mlpk"));
    assert!(text.contains("4. Hidden activations\nskipped"));
}

#[test]
fn test_summary_json_shape() {
    let json = render_summary_json(&summary()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["models"].as_array().unwrap().len(), 2);
    assert_eq!(value["sweep"][0]["distribution"], "laplace");
    assert_eq!(value["sweep"][0]["metric"]["kind"], "accuracy");
    assert!(value["hidden"].is_null());
}
