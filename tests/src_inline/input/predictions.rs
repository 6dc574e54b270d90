use super::*;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::metrics::MetricsError;

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn make_temp_dir() -> PathBuf {
    let mut dir = std::env::temp_dir();
    let id = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    dir.push(format!("ensemble_diversity_preds_{}_{}", std::process::id(), id));
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_load_bare_nested_array() {
    let dir = make_temp_dir();
    let path = dir.join("preds.json");
    fs::write(&path, "[[[1,2],[3,4],[5,6]],[[0,1],[1,0],[2,2]]]").unwrap();
    let preds = load_predictions(&path).unwrap();
    assert_eq!((preds.n_examples(), preds.n_heads(), preds.n_channels()), (2, 3, 2));
}

#[test]
fn test_load_wrapped_object() {
    let dir = make_temp_dir();
    let path = dir.join("preds.json");
    fs::write(&path, "{\"predictions\": [[[0.5, 1.5]], [[2.5, 3.5]]]}").unwrap();
    let preds = load_predictions(&path).unwrap();
    assert_eq!(preds.n_heads(), 1);
    assert_eq!(preds.view()[[1, 0, 1]], 3.5);
}

#[test]
fn test_ragged_file_is_shape_error() {
    let dir = make_temp_dir();
    let path = dir.join("ragged.json");
    fs::write(&path, "[[[1,2],[3,4]],[[1,2]]]").unwrap();
    let err = load_predictions(&path).unwrap_err();
    assert!(matches!(err, InputError::Shape(MetricsError::Shape(_))));
}

#[test]
fn test_invalid_json_is_parse_error() {
    let dir = make_temp_dir();
    let path = dir.join("bad.json");
    fs::write(&path, "{not json").unwrap();
    assert!(matches!(load_predictions(&path), Err(InputError::Parse(_))));
}

#[test]
fn test_load_flat_dump() {
    let dir = make_temp_dir();
    let path = dir.join("flat.json");
    fs::write(&path, r#"{"shape": [2, 2, 1], "data": [1, 2, 3, 4]}"#).unwrap();
    let preds = load_predictions(&path).unwrap();
    assert_eq!(preds.view()[[1, 0, 0]], 3.0);
}

#[test]
fn test_flat_dump_of_wrong_rank_is_shape_error() {
    let dir = make_temp_dir();
    let path = dir.join("rank2.json");
    fs::write(&path, r#"{"shape": [2, 2], "data": [1, 2, 3, 4]}"#).unwrap();
    let err = load_predictions(&path).unwrap_err();
    assert!(matches!(err, InputError::Shape(MetricsError::Shape(_))));

    fs::write(&path, r#"{"shape": [2, 2, 2], "data": [1, 2, 3]}"#).unwrap();
    assert!(matches!(load_predictions(&path), Err(InputError::Parse(_))));
}

#[test]
fn test_nested_array_of_wrong_rank_is_shape_error() {
    let dir = make_temp_dir();
    let path = dir.join("nested_rank.json");
    for body in ["[[1,2],[3,4]]", "[[[[1,2]],[[3,4]]]]", "{\"predictions\": [1, 2, 3]}"] {
        fs::write(&path, body).unwrap();
        let err = load_predictions(&path).unwrap_err();
        assert!(
            matches!(err, InputError::Shape(MetricsError::Shape(_))),
            "{body}: {err:?}"
        );
    }
}

#[test]
fn test_mixed_nesting_is_shape_error_and_strings_are_parse_errors() {
    let dir = make_temp_dir();
    let path = dir.join("mixed.json");
    fs::write(&path, "[[[1,2]],[3,4]]").unwrap();
    assert!(matches!(
        load_predictions(&path),
        Err(InputError::Shape(MetricsError::Shape(_)))
    ));

    fs::write(&path, "[[[1,\"x\"]]]").unwrap();
    assert!(matches!(load_predictions(&path), Err(InputError::Parse(_))));
}
