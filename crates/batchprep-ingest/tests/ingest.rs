//! Integration tests for batch reading and reference loading.

use std::fs;
use std::path::{Path, PathBuf};

use batchprep_ingest::{
    ChunkOptions, ChunkSource, IngestError, LoadCompleteness, ReferenceLoadOptions,
    load_reference_table,
};
use batchprep_model::Value;

fn write_csv(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write file");
    path
}

#[test]
fn batches_partition_source_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut contents = String::from("id,amount\n");
    for i in 0..23 {
        contents.push_str(&format!("{i},{}\n", i * 10));
    }
    let path = write_csv(dir.path(), "input.csv", &contents);

    let mut source =
        ChunkSource::open(&path, ChunkOptions::default().with_batch_capacity(5)).unwrap();
    let mut seen = Vec::new();
    let mut indices = Vec::new();
    while let Some(batch) = source.next_batch().unwrap() {
        assert!(batch.len() <= 5);
        indices.push(batch.index);
        seen.extend(batch.column_values("id").map(|v| v.render().into_owned()));
        source.release(batch);
    }

    let expected: Vec<String> = (0..23).map(|i| i.to_string()).collect();
    assert_eq!(seen, expected);
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    assert_eq!(source.rows_read(), 23);
}

#[test]
fn quoted_fields_with_commas_and_newlines() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(
        dir.path(),
        "quoted.csv",
        "title,city\n\"Severe Storm, Flooding\",\"Line1\nLine2\"\n",
    );
    let mut source = ChunkSource::open(&path, ChunkOptions::default()).unwrap();
    let batch = source.next_batch().unwrap().unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(
        batch.rows()[0].values(),
        &[
            Value::text("Severe Storm, Flooding"),
            Value::text("Line1\nLine2")
        ]
    );
}

#[test]
fn reference_table_projects_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(
        dir.path(),
        "declarations.csv",
        "femaDeclarationString,disasterNumber,declarationType,declarationTitle,state\n\
         DR-1-TX,1,DR,FLOOD,TX\n\
         DR-2-LA,2,EM,HURRICANE,LA\n",
    );

    let table = load_reference_table(
        &path,
        "disasterNumber",
        &["declarationType".to_string(), "declarationTitle".to_string()],
        &ReferenceLoadOptions::default(),
    )
    .unwrap();

    assert_eq!(table.completeness, LoadCompleteness::Complete);
    assert_eq!(
        table.schema.columns(),
        &["disasterNumber", "declarationType", "declarationTitle"]
    );
    assert_eq!(table.rows.len(), 2);
    assert_eq!(
        table.rows[1].values(),
        &[Value::text("2"), Value::text("EM"), Value::text("HURRICANE")]
    );
    assert!(table.missing_columns.is_empty());
}

#[test]
fn reference_table_keeps_leading_zeros() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "zips.csv", "zip,county\n00501,Suffolk\n");
    let table = load_reference_table(
        &path,
        "zip",
        &["county".to_string()],
        &ReferenceLoadOptions::default(),
    )
    .unwrap();
    assert_eq!(table.rows[0].get(0), Some(&Value::text("00501")));
}

#[test]
fn reference_table_missing_key_column() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "ref.csv", "a,b\n1,2\n");
    let result = load_reference_table(
        &path,
        "disasterNumber",
        &["b".to_string()],
        &ReferenceLoadOptions::default(),
    );
    assert!(matches!(
        result,
        Err(IngestError::MissingKeyColumn { column, .. }) if column == "disasterNumber"
    ));
}

#[test]
fn reference_table_reports_missing_value_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "ref.csv", "key,title\n1,A\n");
    let table = load_reference_table(
        &path,
        "key",
        &["title".to_string(), "type".to_string()],
        &ReferenceLoadOptions::default(),
    )
    .unwrap();
    assert_eq!(table.schema.columns(), &["key", "title"]);
    assert_eq!(table.missing_columns, vec!["type".to_string()]);
}

#[test]
fn reference_table_with_padded_header_loads_completely() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "ref.csv", "k, v\n1,a\n2,b\n");
    let table = load_reference_table(
        &path,
        "k",
        &["v".to_string()],
        &ReferenceLoadOptions::default(),
    )
    .unwrap();
    assert_eq!(table.completeness, LoadCompleteness::Complete);
    assert_eq!(table.schema.columns(), &["k", "v"]);
    assert_eq!(table.rows[1].values(), &[Value::text("2"), Value::text("b")]);
}
