use super::*;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

use flate2::Compression;
use flate2::write::GzEncoder;

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn make_temp_dir() -> PathBuf {
    let mut dir = std::env::temp_dir();
    let id = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    dir.push(format!("ensemble_diversity_table_{}_{}", std::process::id(), id));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_file(path: &Path, contents: &str) {
    let mut f = BufWriter::new(File::create(path).unwrap());
    f.write_all(contents.as_bytes()).unwrap();
}

fn write_gz(path: &Path, contents: &str) {
    let mut enc = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    enc.write_all(contents.as_bytes()).unwrap();
    enc.finish().unwrap();
}

const WINE: &str = "\"fixed acidity\";\"alcohol\";\"quality\"\n7.4;9.4;5\n7.8;9.8;5\n11.2;9.8;6\n\n7.4;9.4;7\n";

#[test]
fn test_read_semicolon_table_with_header() {
    let dir = make_temp_dir();
    let path = dir.join("wine.csv");
    write_file(&path, WINE);
    let table = read_table(&path, None).unwrap();
    assert_eq!(table.columns, vec!["fixed acidity", "alcohol", "quality"]);
    assert_eq!(table.values.dim(), (4, 3));
    assert_eq!(table.values[[2, 0]], 11.2);
}

#[test]
fn test_read_gz_table() {
    let dir = make_temp_dir();
    let path = dir.join("wine.csv.gz");
    write_gz(&path, WINE);
    let table = read_table(&path, None).unwrap();
    assert_eq!(table.values.nrows(), 4);
}

#[test]
fn test_headerless_table_gets_generated_names() {
    let dir = make_temp_dir();
    let path = dir.join("plain.csv");
    write_file(&path, "1,2,0\n3,4,1\n");
    let table = read_table(&path, Some(',')).unwrap();
    assert_eq!(table.columns, vec!["col0", "col1", "col2"]);
}

#[test]
fn test_ragged_row_is_parse_error() {
    let dir = make_temp_dir();
    let path = dir.join("ragged.csv");
    write_file(&path, "a,b,c\n1,2,3\n4,5\n");
    let err = read_table(&path, None).unwrap_err();
    assert!(matches!(err, InputError::Parse(_)));
    assert!(err.to_string().contains("line 3"));
}

#[test]
fn test_classification_labels_and_width() {
    let dir = make_temp_dir();
    let path = dir.join("wine.csv");
    write_file(&path, WINE);
    let table = read_table(&path, None).unwrap();
    let (data, n_classes) = table_to_dataset(&table, None, TaskKind::Classif).unwrap();
    assert_eq!(n_classes, 8);
    assert_eq!(data.n_features(), 2);
    assert_eq!(data.targets, Targets::Classes(vec![5, 5, 6, 7]));
}

#[test]
fn test_named_target_regression() {
    let dir = make_temp_dir();
    let path = dir.join("wine.csv");
    write_file(&path, WINE);
    let table = read_table(&path, None).unwrap();
    let (data, out) = table_to_dataset(&table, Some("alcohol"), TaskKind::Reg).unwrap();
    assert_eq!(out, 1);
    assert_eq!(data.x.column(1).to_vec(), vec![5.0, 5.0, 6.0, 7.0]);
    assert!(table_to_dataset(&table, Some("missing"), TaskKind::Reg).is_err());
}

#[test]
fn test_fractional_label_rejected() {
    let dir = make_temp_dir();
    let path = dir.join("frac.csv");
    write_file(&path, "x,y\n1,0.5\n2,1\n");
    let table = read_table(&path, None).unwrap();
    assert!(table_to_dataset(&table, None, TaskKind::Classif).is_err());
}

#[test]
fn test_csv_source_splits() {
    let dir = make_temp_dir();
    let path = dir.join("data.csv");
    let mut body = String::from("a,b,label\n");
    for i in 0..20 {
        body.push_str(&format!("{},{},{}\n", i, i * 2, i % 2));
    }
    write_file(&path, &body);
    let source = CsvSource {
        path,
        delimiter: None,
        target: None,
        task: TaskKind::Classif,
    };
    let splits = source.get_data(0.2, 4, 42).unwrap();
    assert_eq!(splits.test.len(), 4);
    assert_eq!(splits.output_dim, 2);
    assert_eq!(splits.input_dim, 2);
}
