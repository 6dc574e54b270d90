use ndarray::{Array2, ArrayView2};

use crate::viz::tsne::Embedding;
use crate::viz::{Svg, VizError, coolwarm, head_color};

const MARGIN: f64 = 60.0;
const TITLE_Y: f64 = 28.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxStats {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl BoxStats {
    /// Quartiles with linear interpolation between order statistics.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut v: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
        if v.is_empty() {
            return None;
        }
        v.sort_by(|a, b| a.total_cmp(b));
        Some(Self {
            min: v[0],
            q1: quantile(&v, 0.25),
            median: quantile(&v, 0.5),
            q3: quantile(&v, 0.75),
            max: v[v.len() - 1],
        })
    }
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// One box per head over that head's channel means; `head_means` is (K, C).
pub fn render_boxplot(head_means: ArrayView2<'_, f32>, title: &str) -> Result<String, VizError> {
    let k = head_means.nrows();
    let stats: Vec<BoxStats> = head_means
        .rows()
        .into_iter()
        .map(|row| {
            let values: Vec<f64> = row.iter().map(|&v| v as f64).collect();
            BoxStats::from_values(&values)
        })
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| VizError::InvalidInput("box plot needs finite head means".to_string()))?;
    if k == 0 {
        return Err(VizError::InvalidInput("box plot needs at least one head".to_string()));
    }

    let lo = stats.iter().map(|s| s.min).fold(f64::INFINITY, f64::min);
    let hi = stats.iter().map(|s| s.max).fold(f64::NEG_INFINITY, f64::max);
    let span = if hi > lo { hi - lo } else { 1.0 };

    let width = (MARGIN * 2.0 + 60.0 * k as f64).max(360.0);
    let height = 400.0;
    let plot_h = height - MARGIN * 2.0;
    let slot = (width - MARGIN * 2.0) / k as f64;
    let to_y = |v: f64| MARGIN + plot_h - (v - lo) / span * plot_h;

    let mut svg = Svg::new(width, height);
    svg.text(width / 2.0, TITLE_Y, 16.0, "middle", title);
    svg.line(MARGIN, MARGIN, MARGIN, MARGIN + plot_h, "#64748b");
    svg.line(MARGIN, MARGIN + plot_h, width - MARGIN, MARGIN + plot_h, "#64748b");
    for value in [lo, (lo + hi) / 2.0, hi] {
        svg.text(MARGIN - 6.0, to_y(value) + 4.0, 10.0, "end", &format!("{value:.3}"));
    }

    for (head, s) in stats.iter().enumerate() {
        let cx = MARGIN + slot * (head as f64 + 0.5);
        let half = (slot * 0.3).min(20.0);
        svg.line(cx, to_y(s.max), cx, to_y(s.q3), "#334155");
        svg.line(cx, to_y(s.q1), cx, to_y(s.min), "#334155");
        svg.line(cx - half / 2.0, to_y(s.max), cx + half / 2.0, to_y(s.max), "#334155");
        svg.line(cx - half / 2.0, to_y(s.min), cx + half / 2.0, to_y(s.min), "#334155");
        let top = to_y(s.q3);
        svg.rect(
            cx - half,
            top,
            half * 2.0,
            (to_y(s.q1) - top).max(1.0),
            head_color(head),
            Some("#334155"),
        );
        svg.line(cx - half, to_y(s.median), cx + half, to_y(s.median), "#0f172a");
        svg.text(cx, height - MARGIN + 18.0, 11.0, "middle", &format!("head {head}"));
    }

    Ok(svg.finish())
}

/// K×K matrix on a cool-warm scale over [-1, 1], cells annotated to two
/// decimals.
pub fn render_heatmap(matrix: &Array2<f64>, title: &str) -> Result<String, VizError> {
    let (rows, cols) = matrix.dim();
    if rows == 0 || rows != cols {
        return Err(VizError::InvalidInput(format!(
            "heatmap needs a non-empty square matrix, got {rows}x{cols}"
        )));
    }
    let cell = (360.0 / rows as f64).clamp(24.0, 64.0);
    let width = MARGIN * 2.0 + cell * cols as f64;
    let height = MARGIN * 2.0 + cell * rows as f64;

    let mut svg = Svg::new(width, height);
    svg.text(width / 2.0, TITLE_Y, 16.0, "middle", title);
    for i in 0..rows {
        let y = MARGIN + cell * i as f64;
        svg.text(MARGIN - 6.0, y + cell / 2.0 + 4.0, 11.0, "end", &i.to_string());
        for j in 0..cols {
            let x = MARGIN + cell * j as f64;
            let v = matrix[[i, j]];
            svg.rect(x, y, cell, cell, &coolwarm(v), Some("#ffffff"));
            svg.text(x + cell / 2.0, y + cell / 2.0 + 4.0, 10.0, "middle", &format!("{v:.2}"));
        }
    }
    for j in 0..cols {
        let x = MARGIN + cell * (j as f64 + 0.5);
        svg.text(x, MARGIN + cell * rows as f64 + 16.0, 11.0, "middle", &j.to_string());
    }

    Ok(svg.finish())
}

/// Column count of the subplot grid.
pub fn grid_columns(panels: usize) -> usize {
    if panels <= 4 { 2 } else { 3 }
}

/// One scatter subplot per layer embedding, points coloured by head.
pub fn render_tsne_grid(panels: &[Embedding], title: &str) -> Result<String, VizError> {
    if panels.is_empty() {
        return Err(VizError::InvalidInput("no layers to project".to_string()));
    }
    let cols = grid_columns(panels.len());
    let rows = panels.len().div_ceil(cols);
    let size = 280.0;
    let pad = 30.0;
    let width = cols as f64 * (size + pad) + pad;
    let height = rows as f64 * (size + pad + 20.0) + MARGIN;

    let mut svg = Svg::new(width, height);
    svg.text(width / 2.0, TITLE_Y, 16.0, "middle", title);

    for (idx, panel) in panels.iter().enumerate() {
        let ox = pad + (idx % cols) as f64 * (size + pad);
        let oy = MARGIN + (idx / cols) as f64 * (size + pad + 20.0);
        svg.text(ox + size / 2.0, oy - 6.0, 12.0, "middle", &panel.title);
        svg.rect(ox, oy, size, size, "#f8fafc", Some("#cbd5e1"));

        let (x_lo, x_hi) = bounds(panel.points.column(0).iter().copied());
        let (y_lo, y_hi) = bounds(panel.points.column(1).iter().copied());
        let sx = |v: f64| ox + 8.0 + (v - x_lo) / (x_hi - x_lo) * (size - 16.0);
        let sy = |v: f64| oy + size - 8.0 - (v - y_lo) / (y_hi - y_lo) * (size - 16.0);
        for (point, &head) in panel.points.rows().into_iter().zip(&panel.heads) {
            svg.circle(sx(point[0]), sy(point[1]), 2.5, head_color(head));
        }
    }

    Ok(svg.finish())
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        (0.0, 1.0)
    } else if hi > lo {
        (lo, hi)
    } else {
        (lo - 0.5, lo + 0.5)
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/viz/plots.rs"]
mod tests;
