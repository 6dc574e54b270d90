use crate::pipeline::stage4_sweep::InitSweepResult;
use crate::report::{SummaryData, format_f64_4, format_f64_6};

pub fn render_report_text(data: &SummaryData) -> String {
    let mut out = String::new();

    out.push_str("Ensemble Head Diversity Report\n");
    out.push_str("==============================\n\n");

    out.push_str("1. Setup\n");
    out.push_str(&format!("Data: {} ({})\n", data.source, data.task));
    out.push_str(&format!(
        "Rows: {} train, {} test\n",
        data.n_train, data.n_test
    ));
    out.push_str(&format!(
        "Heads: {}  Hidden widths: {:?}  Epochs: {}  Seed: {}\n",
        data.heads, data.hidden_widths, data.epochs, data.seed
    ));
    out.push_str(&format!(
        "Constant head vectors: {}\n\n",
        data.degenerate_policy
    ));

    out.push_str("2. Candidate models\n");
    for m in &data.models {
        out.push_str(&format!(
            "{}: spearman={} kl={} mean_corr={} {} train_loss={} test_loss={}\n",
            m.name,
            format_f64_4(m.spearman),
            format_f64_6(m.kl_dispersion),
            format_f64_4(m.mean_off_diagonal),
            m.metric,
            format_f64_4(m.train_loss as f64),
            format_f64_4(m.test_loss as f64)
        ));
        out.push_str(&format!("  {}\n", diversity_statement(m.spearman)));
    }
    if let Some(name) = &data.most_diverse {
        out.push_str(&format!("Most diverse heads: {}\n", name));
    }
    out.push('\n');

    out.push_str("3. Adapter initialisation sweep\n");
    out.push_str(&render_sweep_table(&data.sweep));
    out.push('\n');

    out.push_str("4. Hidden activations\n");
    match &data.hidden {
        Some(h) => out.push_str(&format!(
            "{} layers projected, {} points each: {}\n",
            h.layers,
            h.points_per_layer,
            h.figure.display()
        )),
        None => out.push_str("skipped\n"),
    }

    out
}

/// Console table of the sweep, one row per (scale, distribution).
pub fn render_sweep_table(results: &[InitSweepResult]) -> String {
    let mut out = String::new();
    let metric_name = results.first().map(|r| r.metric.name()).unwrap_or("metric");
    out.push_str(&format!(
        "{:>6}  {:<8}  {:>9}  {:>9}\n",
        "scale", "init", "spearman", metric_name
    ));
    for r in results {
        out.push_str(&format!(
            "{:>6.2}  {:<8}  {:>9.4}  {:>9.4}\n",
            r.scale,
            r.distribution.name(),
            r.spearman,
            r.metric.value()
        ));
    }
    out
}

fn diversity_statement(spearman: f64) -> &'static str {
    if spearman >= 0.95 {
        "Heads rank channels almost identically."
    } else if spearman >= 0.75 {
        "Heads mostly agree on channel ordering."
    } else {
        "Heads disagree noticeably on channel ordering."
    }
}
