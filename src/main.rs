mod config;
mod input;
mod logging;
mod metrics;
mod model;
mod pipeline;
mod report;
mod train;
mod viz;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::ExperimentConfig;
use crate::input::predictions::load_predictions;
use crate::input::synthetic::SyntheticSource;
use crate::input::table::CsvSource;
use crate::input::{TabularSource, TaskKind};
use crate::metrics::{DegeneratePolicy, kl_dispersion, pairwise_correlation_matrix, rank_correlation};
use crate::pipeline::{PipelineError, run_experiment};
use crate::train::SgdTrainer;

#[derive(Debug, Parser)]
#[command(name = "ensemble-diversity", version)]
#[command(about = "Measure how differently the heads of a multi-head tabular ensemble predict")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Train the candidate ensembles, measure head diversity, sweep adapter init
    Run(RunArgs),
    /// Diversity metrics over a saved per-head prediction file
    Metrics(MetricsArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// JSON experiment config; flags below override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Delimited data file (.csv, .tsv, optionally .gz); synthetic data when absent
    #[arg(long, value_name = "FILE")]
    data: Option<PathBuf>,

    #[arg(long, value_name = "C")]
    delimiter: Option<char>,

    /// Target column name (default: last column)
    #[arg(long, value_name = "NAME")]
    target: Option<String>,

    #[arg(long, value_enum)]
    task: Option<TaskKind>,

    #[arg(long, value_name = "DIR")]
    runs_dir: Option<PathBuf>,

    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,

    #[arg(long, value_name = "N")]
    epochs: Option<usize>,

    #[arg(long, value_name = "N")]
    batch_size: Option<usize>,

    #[arg(long, value_name = "K")]
    heads: Option<usize>,

    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    #[arg(long, value_enum)]
    degenerate: Option<DegeneratePolicy>,

    /// Skip training the extra model for the hidden-layer projection
    #[arg(long)]
    skip_tsne: bool,
}

#[derive(Debug, Args)]
struct MetricsArgs {
    /// JSON array shaped [examples][heads][channels], or {"predictions": ...}
    #[arg(long, value_name = "FILE")]
    predictions: PathBuf,

    /// Restrict the metrics to these head indices (comma separated)
    #[arg(long, value_name = "K,..", value_delimiter = ',')]
    heads: Vec<usize>,

    #[arg(long, value_enum, default_value_t = DegeneratePolicy::Zero)]
    degenerate: DegeneratePolicy,
}

impl RunArgs {
    fn resolve(&self) -> Result<ExperimentConfig, PipelineError> {
        let mut config = match &self.config {
            Some(path) => ExperimentConfig::load(path)?,
            None => ExperimentConfig::default(),
        };
        if let Some(data) = &self.data {
            config.data = Some(data.clone());
        }
        if self.delimiter.is_some() {
            config.delimiter = self.delimiter;
        }
        if let Some(target) = &self.target {
            config.target = Some(target.clone());
        }
        if let Some(task) = self.task {
            config.task = task;
        }
        if let Some(dir) = &self.runs_dir {
            config.runs_dir = dir.clone();
        }
        if let Some(dir) = &self.out {
            config.out_dir = dir.clone();
        }
        if let Some(epochs) = self.epochs {
            config.epochs = epochs;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(heads) = self.heads {
            config.heads = heads;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(policy) = self.degenerate {
            config.degenerate = policy;
        }
        config.skip_tsne |= self.skip_tsne;
        config.validate()?;
        Ok(config)
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);
    if let Err(err) = run(cli.command) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(command: Command) -> Result<(), PipelineError> {
    match command {
        Command::Run(args) => {
            let config = args.resolve()?;
            let source = data_source(&config);
            let trainer = SgdTrainer {
                lr: config.learning_rate,
                seed: config.seed,
            };
            let outcome = run_experiment(&config, source.as_ref(), &trainer)?;
            println!("summary: {}", outcome.summary_path.display());
            println!("report: {}", outcome.report_path.display());
            Ok(())
        }
        Command::Metrics(args) => run_metrics(&args),
    }
}

fn data_source(config: &ExperimentConfig) -> Box<dyn TabularSource> {
    match &config.data {
        Some(path) => Box::new(CsvSource {
            path: path.clone(),
            delimiter: config.delimiter,
            target: config.target.clone(),
            task: config.task,
        }),
        None => {
            tracing::warn!("no data file given, using the synthetic source");
            Box::new(SyntheticSource {
                task: config.task,
                ..SyntheticSource::default()
            })
        }
    }
}

fn run_metrics(args: &MetricsArgs) -> Result<(), PipelineError> {
    let mut preds = load_predictions(&args.predictions)?;
    if !args.heads.is_empty() {
        preds = preds.select_heads(&args.heads)?;
    }
    tracing::info!(
        examples = preds.n_examples(),
        heads = preds.n_heads(),
        channels = preds.n_channels(),
        "predictions loaded"
    );
    let spearman = rank_correlation(&preds, args.degenerate)?;
    let kl = kl_dispersion(&preds)?;
    let matrix = pairwise_correlation_matrix(&preds, args.degenerate)?;

    println!("spearman: {spearman:.6}");
    println!("kl_dispersion: {kl:.6}");
    println!("pairwise_correlation:");
    for row in matrix.rows() {
        let cells: Vec<String> = row.iter().map(|v| format!("{v:>7.3}")).collect();
        println!("{}", cells.join(" "));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../tests/src_inline/main_inline.rs"]
mod tests;
