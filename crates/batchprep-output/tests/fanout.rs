//! Integration tests for partitioned output.

use std::fs;
use std::path::Path;

use batchprep_model::Batch;
use batchprep_output::{FanoutWriter, MISSING_PARTITION_KEY, WriteMode};
use proptest::prelude::*;

fn lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .expect("read output")
        .lines()
        .map(str::to_string)
        .collect()
}

fn incidents(index: usize, rows: &[&[&str]]) -> Batch {
    let mut batch = Batch::from_str_rows(&["id", "incidentType"], rows).unwrap();
    batch.index = index;
    batch
}

#[test]
fn interleaved_partitions_get_one_file_each() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = FanoutWriter::new(dir.path(), "incidentType", WriteMode::Truncate, 8);
    writer
        .write_batch(incidents(
            0,
            &[&["1", "Severe Storm"], &["2", "Flood"], &["3", "Severe Storm"]],
        ))
        .unwrap();
    writer
        .write_batch(incidents(1, &[&["4", "Flood"], &["5", "Severe Storm"]]))
        .unwrap();
    let summary = writer.finish().unwrap();

    let keys: Vec<_> = summary.iter().map(|d| (d.key.as_str(), d.rows_written)).collect();
    assert_eq!(keys, vec![("Flood", 2), ("Severe_Storm", 3)]);
    assert_eq!(
        lines(&dir.path().join("Severe_Storm.csv")),
        vec!["id,incidentType", "1,Severe Storm", "3,Severe Storm", "5,Severe Storm"]
    );
    assert_eq!(
        lines(&dir.path().join("Flood.csv")),
        vec!["id,incidentType", "2,Flood", "4,Flood"]
    );
}

#[test]
fn evicted_destination_reopens_without_second_header() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = FanoutWriter::new(dir.path(), "incidentType", WriteMode::Truncate, 1);
    writer
        .write_batch(incidents(0, &[&["1", "Fire"], &["2", "Flood"], &["3", "Fire"]]))
        .unwrap();
    writer
        .write_batch(incidents(1, &[&["4", "Flood"], &["5", "Fire"]]))
        .unwrap();
    writer.finish().unwrap();

    assert_eq!(
        lines(&dir.path().join("Fire.csv")),
        vec!["id,incidentType", "1,Fire", "3,Fire", "5,Fire"]
    );
    assert_eq!(
        lines(&dir.path().join("Flood.csv")),
        vec!["id,incidentType", "2,Flood", "4,Flood"]
    );
}

#[test]
fn missing_partition_values_are_kept() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = FanoutWriter::new(dir.path(), "incidentType", WriteMode::Truncate, 8);
    writer
        .write_batch(incidents(0, &[&["1", ""], &["2", "Flood"]]))
        .unwrap();
    let summary = writer.finish().unwrap();
    assert_eq!(summary.len(), 2);
    assert_eq!(
        lines(&dir.path().join(format!("{MISSING_PARTITION_KEY}.csv"))),
        vec!["id,incidentType", "1,"]
    );
}

#[test]
fn append_mode_extends_existing_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("Flood.csv"), "id,incidentType\n0,Flood\n").unwrap();
    let mut writer = FanoutWriter::new(dir.path(), "incidentType", WriteMode::Append, 8);
    writer
        .write_batch(incidents(0, &[&["1", "Flood"], &["2", "Tornado"]]))
        .unwrap();
    writer.finish().unwrap();
    assert_eq!(
        lines(&dir.path().join("Flood.csv")),
        vec!["id,incidentType", "0,Flood", "1,Flood"]
    );
    assert_eq!(
        lines(&dir.path().join("Tornado.csv")),
        vec!["id,incidentType", "2,Tornado"]
    );
}

#[test]
fn partition_column_missing_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = FanoutWriter::new(dir.path(), "state", WriteMode::Truncate, 8);
    let result = writer.write_batch(incidents(0, &[&["1", "Flood"]]));
    assert!(result.is_err());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn fanout_preserves_every_row(
        keys in proptest::collection::vec(prop_oneof![Just("A"), Just("B c"), Just("d")], 0..30),
        capacity in 1usize..8,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = FanoutWriter::new(dir.path(), "incidentType", WriteMode::Truncate, 2);
        let ids: Vec<String> = (0..keys.len()).map(|i| i.to_string()).collect();
        for (index, chunk) in ids.chunks(capacity).enumerate() {
            let offset = index * capacity;
            let rows: Vec<Vec<&str>> = chunk
                .iter()
                .enumerate()
                .map(|(i, id)| vec![id.as_str(), keys[offset + i]])
                .collect();
            let slices: Vec<&[&str]> = rows.iter().map(Vec::as_slice).collect();
            writer.write_batch(incidents(index, &slices)).unwrap();
        }
        let summary = writer.finish().unwrap();

        let mut total = 0;
        for destination in &summary {
            let content = lines(&destination.path);
            prop_assert_eq!(content.iter().filter(|l| *l == "id,incidentType").count(), 1);
            prop_assert_eq!(content.len() as u64 - 1, destination.rows_written);
            total += destination.rows_written;
        }
        prop_assert_eq!(total as usize, keys.len());
    }
}
