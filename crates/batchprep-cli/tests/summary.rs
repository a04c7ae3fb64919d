//! Summary rendering rows.

use std::path::PathBuf;

use batchprep_cli::summary::{plan_rows, summary_rows};
use batchprep_core::{DEDUPE_RULE, DedupeSetting, PipelineConfig, RunReport, UnitReport};
use batchprep_transform::StatisticsScope;

fn render<const N: usize>(rows: &[[String; N]]) -> String {
    rows.iter()
        .map(|row| row.join(" | "))
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn summary_lists_each_unit() {
    let mut report = RunReport::new(StatisticsScope::Global, DedupeSetting::Batch);

    let mut single = UnitReport::new(PathBuf::from("data/registrations.csv"));
    single.batches = 3;
    single.rows_read = 250_000;
    single.rows_written = 249_990;
    single.dropped.insert(DEDUPE_RULE.to_string(), 10);
    single.outputs = vec![PathBuf::from("out/registrations_processed.csv")];
    report.units.push(single);

    let mut fanned = UnitReport::new(PathBuf::from("claims.csv"));
    fanned.batches = 1;
    fanned.rows_read = 4;
    fanned.rows_written = 4;
    fanned.outputs = vec![PathBuf::from("out/Flood.csv"), PathBuf::from("out/_missing.csv")];
    report.units.push(fanned);

    insta::assert_snapshot!(render(&summary_rows(&report)), @r"
    registrations.csv | 3 | 250000 | 249990 | 10 | out/registrations_processed.csv
    claims.csv | 1 | 4 | 4 | 0 | 2 files
    ");
    assert!(report.is_conserved());
}

#[test]
fn plan_lists_dedupe_then_steps() {
    let config = PipelineConfig::from_toml_str(
        r#"
dedupe = "global"

[[steps]]
kind = "drop_columns"
columns = ["lastRefresh", "id"]

[[steps]]
kind = "encode"
columns = ["county"]
"#,
    )
    .unwrap();

    insta::assert_snapshot!(render(&plan_rows(&config)), @r#"
    - | dedupe | drop exact duplicate rows (global scope)
    1 | drop_columns | drop lastRefresh, id
    2 | encode | encode county (unknown -> "?")
    "#);
}
