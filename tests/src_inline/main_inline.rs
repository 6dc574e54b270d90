use super::*;
use clap::CommandFactory;

fn parse(args: &[&str]) -> Cli {
    let mut full = vec!["ensemble-diversity"];
    full.extend_from_slice(args);
    Cli::try_parse_from(full).unwrap()
}

#[test]
fn test_cli_definition_is_valid() {
    Cli::command().debug_assert();
}

#[test]
fn test_run_defaults() {
    let cli = parse(&["run"]);
    let Command::Run(args) = cli.command else {
        panic!("expected run");
    };
    let config = args.resolve().unwrap();
    assert_eq!(config, ExperimentConfig::default());
}

#[test]
fn test_run_flags_override_config() {
    let cli = parse(&[
        "-vv",
        "run",
        "--task",
        "reg",
        "--epochs",
        "3",
        "--heads",
        "4",
        "--degenerate",
        "reject",
        "--delimiter",
        ";",
        "--skip-tsne",
    ]);
    assert_eq!(cli.verbose, 2);
    let Command::Run(args) = cli.command else {
        panic!("expected run");
    };
    let config = args.resolve().unwrap();
    assert_eq!(config.task, TaskKind::Reg);
    assert_eq!(config.epochs, 3);
    assert_eq!(config.heads, 4);
    assert_eq!(config.degenerate, DegeneratePolicy::Reject);
    assert_eq!(config.delimiter, Some(';'));
    assert!(config.skip_tsne);
}

#[test]
fn test_run_rejects_single_head() {
    let cli = parse(&["run", "--heads", "1"]);
    let Command::Run(args) = cli.command else {
        panic!("expected run");
    };
    assert!(args.resolve().is_err());
}

#[test]
fn test_metrics_requires_predictions() {
    assert!(Cli::try_parse_from(["ensemble-diversity", "metrics"]).is_err());
    let cli = parse(&["metrics", "--predictions", "p.json", "--heads", "0,2"]);
    let Command::Metrics(args) = cli.command else {
        panic!("expected metrics");
    };
    assert_eq!(args.degenerate, DegeneratePolicy::Zero);
    assert_eq!(args.heads, vec![0, 2]);
}

#[test]
fn test_metrics_on_missing_file_fails() {
    let args = MetricsArgs {
        predictions: PathBuf::from("/nonexistent/preds.json"),
        heads: Vec::new(),
        degenerate: DegeneratePolicy::Zero,
    };
    assert!(matches!(
        run_metrics(&args),
        Err(PipelineError::Input(crate::input::InputError::MissingInput(_)))
    ));
}

#[test]
fn test_data_source_choice() {
    let config = ExperimentConfig {
        data: Some(PathBuf::from("wine.csv")),
        ..ExperimentConfig::default()
    };
    assert_eq!(data_source(&config).describe(), "wine.csv");
    assert!(
        data_source(&ExperimentConfig::default())
            .describe()
            .starts_with("synthetic")
    );
}
