use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

#[test]
fn test_coolwarm_endpoints() {
    assert_eq!(coolwarm(-1.0), "#3b4cc0");
    assert_eq!(coolwarm(0.0), "#dddddd");
    assert_eq!(coolwarm(1.0), "#b40426");
    assert_eq!(coolwarm(5.0), coolwarm(1.0));
    assert_eq!(coolwarm(f64::NAN), coolwarm(0.0));
}

#[test]
fn test_head_colors_cycle() {
    assert_eq!(head_color(0), head_color(10));
    assert_ne!(head_color(0), head_color(1));
}

#[test]
fn test_svg_escapes_text() {
    let mut svg = Svg::new(100.0, 50.0);
    svg.text(10.0, 10.0, 12.0, "start", "a < b & c");
    let doc = svg.finish();
    assert!(doc.starts_with("<svg"));
    assert!(doc.trim_end().ends_with("</svg>"));
    assert!(doc.contains("a &lt; b &amp; c"));
}

#[test]
fn test_figure_writer_creates_dir() {
    let mut dir = std::env::temp_dir();
    let id = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    dir.push(format!("ensemble_diversity_fig_{}_{}", std::process::id(), id));
    dir.push("nested");
    let writer = FigureWriter::new(&dir).unwrap();
    let path = writer.write("x.svg", "<svg/>").unwrap();
    assert_eq!(fs::read_to_string(path).unwrap(), "<svg/>");
    assert_eq!(writer.dir(), dir.as_path());
}
