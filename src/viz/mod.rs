use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod plots;
pub mod tsne;

pub use plots::{render_boxplot, render_heatmap, render_tsne_grid};
pub use tsne::{Embedding, TsneParams, embed_layer};

#[derive(Debug, Error)]
pub enum VizError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid figure input: {0}")]
    InvalidInput(String),
}

/// Writes rendered figures into one directory.
#[derive(Debug, Clone)]
pub struct FigureWriter {
    dir: PathBuf,
}

impl FigureWriter {
    pub fn new(dir: &Path) -> Result<Self, VizError> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, file_name: &str, svg: &str) -> Result<PathBuf, VizError> {
        let path = self.dir.join(file_name);
        fs::write(&path, svg)?;
        tracing::debug!(path = %path.display(), "figure written");
        Ok(path)
    }
}

/// Minimal SVG document builder.
#[derive(Debug)]
pub(crate) struct Svg {
    width: f64,
    height: f64,
    body: String,
}

impl Svg {
    pub(crate) fn new(width: f64, height: f64) -> Self {
        let mut body = String::new();
        body.push_str(&format!(
            r##"  <rect width="{width}" height="{height}" fill="#ffffff"/>"##
        ));
        body.push('\n');
        Self {
            width,
            height,
            body,
        }
    }

    pub(crate) fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, fill: &str, stroke: Option<&str>) {
        let stroke = stroke
            .map(|s| format!(r#" stroke="{s}" stroke-width="1""#))
            .unwrap_or_default();
        self.body.push_str(&format!(
            r#"  <rect x="{x:.2}" y="{y:.2}" width="{w:.2}" height="{h:.2}" fill="{fill}"{stroke}/>"#
        ));
        self.body.push('\n');
    }

    pub(crate) fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, stroke: &str) {
        self.body.push_str(&format!(
            r#"  <line x1="{x1:.2}" y1="{y1:.2}" x2="{x2:.2}" y2="{y2:.2}" stroke="{stroke}" stroke-width="1"/>"#
        ));
        self.body.push('\n');
    }

    pub(crate) fn circle(&mut self, cx: f64, cy: f64, r: f64, fill: &str) {
        self.body.push_str(&format!(
            r#"  <circle cx="{cx:.2}" cy="{cy:.2}" r="{r:.1}" fill="{fill}" fill-opacity="0.8"/>"#
        ));
        self.body.push('\n');
    }

    pub(crate) fn text(&mut self, x: f64, y: f64, size: f64, anchor: &str, content: &str) {
        self.body.push_str(&format!(
            r##"  <text x="{x:.2}" y="{y:.2}" font-family="sans-serif" font-size="{size}" fill="#1e293b" text-anchor="{anchor}">{}</text>"##,
            escape(content)
        ));
        self.body.push('\n');
    }

    pub(crate) fn finish(self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}" width="{w}" height="{h}">"#,
            w = self.width,
            h = self.height
        ));
        out.push('\n');
        out.push_str(&self.body);
        out.push_str("</svg>\n");
        out
    }
}

pub(crate) fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

const HEAD_COLORS: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

pub fn head_color(head: usize) -> &'static str {
    HEAD_COLORS[head % HEAD_COLORS.len()]
}

/// Diverging blue-white-red scale; `t` is clamped to [-1, 1].
pub fn coolwarm(t: f64) -> String {
    const BLUE: [f64; 3] = [59.0, 76.0, 192.0];
    const MID: [f64; 3] = [221.0, 221.0, 221.0];
    const RED: [f64; 3] = [180.0, 4.0, 38.0];
    let t = if t.is_finite() { t.clamp(-1.0, 1.0) } else { 0.0 };
    let (from, to, w) = if t < 0.0 { (MID, BLUE, -t) } else { (MID, RED, t) };
    let mix = |i: usize| (from[i] + (to[i] - from[i]) * w).round() as u8;
    format!("#{:02x}{:02x}{:02x}", mix(0), mix(1), mix(2))
}

#[cfg(test)]
#[path = "../../tests/src_inline/viz/mod.rs"]
mod tests;
