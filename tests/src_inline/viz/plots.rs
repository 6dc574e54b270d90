use super::*;
use ndarray::array;

#[test]
fn test_box_stats_interpolate() {
    let s = BoxStats::from_values(&[4.0, 1.0, 3.0, 2.0]).unwrap();
    assert_eq!(s.min, 1.0);
    assert_eq!(s.max, 4.0);
    assert_eq!(s.median, 2.5);
    assert_eq!(s.q1, 1.75);
    assert_eq!(s.q3, 3.25);
    assert!(BoxStats::from_values(&[]).is_none());
}

#[test]
fn test_boxplot_has_one_box_per_head() {
    let means = array![[0.1f32, 0.4, 0.2], [0.3, 0.3, 0.9]];
    let svg = render_boxplot(means.view(), "Mean predictions").unwrap();
    assert!(svg.contains("head 0"));
    assert!(svg.contains("head 1"));
    assert!(!svg.contains("head 2"));
    assert!(svg.contains("Mean predictions"));
}

#[test]
fn test_heatmap_annotates_cells() {
    let m = array![[1.0, -0.25], [-0.25, 1.0]];
    let svg = render_heatmap(&m, "Correlation").unwrap();
    assert_eq!(svg.matches(">1.00<").count(), 2);
    assert_eq!(svg.matches(">-0.25<").count(), 2);
    assert!(svg.contains(&coolwarm(1.0)));
}

#[test]
fn test_heatmap_rejects_non_square() {
    let m = Array2::<f64>::zeros((2, 3));
    assert!(render_heatmap(&m, "x").is_err());
}

#[test]
fn test_grid_columns() {
    assert_eq!(grid_columns(1), 2);
    assert_eq!(grid_columns(4), 2);
    assert_eq!(grid_columns(5), 3);
}

#[test]
fn test_tsne_grid_draws_every_point() {
    let panel = Embedding {
        title: "layer 1".to_string(),
        points: array![[0.0, 0.0], [1.0, 2.0], [3.0, -1.0]],
        heads: vec![0, 1, 0],
    };
    let svg = render_tsne_grid(&[panel.clone(), panel], "Hidden").unwrap();
    assert_eq!(svg.matches("<circle").count(), 6);
    assert!(svg.contains(head_color(1)));
    assert!(render_tsne_grid(&[], "Hidden").is_err());
}
