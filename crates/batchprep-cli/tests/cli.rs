//! Runs the `batchprep` binary against scratch files.

use std::fs;
use std::process::Command;

fn batchprep() -> Command {
    Command::new(env!("CARGO_BIN_EXE_batchprep"))
}

const CONFIG: &str = r#"
dedupe = "batch"

[[steps]]
kind = "fill_missing"

[[steps]]
kind = "encode"
columns = ["county"]
"#;

#[test]
fn run_writes_output_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("pipeline.toml");
    fs::write(&config, CONFIG).unwrap();
    let input = dir.path().join("housing.csv");
    fs::write(&input, "zipCode,county\n,Harris\n77002,Polk\n77002,Polk\n").unwrap();
    let out = dir.path().join("out");
    let report = dir.path().join("report.json");

    let output = batchprep()
        .arg("run")
        .arg("--config")
        .arg(&config)
        .arg("--output-dir")
        .arg(&out)
        .arg("--report")
        .arg(&report)
        .arg(&input)
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(
        fs::read_to_string(out.join("housing_processed.csv")).unwrap(),
        "zipCode,county\n00000,0\n77002,1\n"
    );
    assert_eq!(
        fs::read_to_string(out.join("housing_encoding.csv")).unwrap(),
        "Column,Original_Value,Encoded_Value\ncounty,Harris,0\ncounty,Polk,1\n"
    );
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["units"][0]["rows_read"], 3);
    assert_eq!(json["units"][0]["dropped"]["dedupe"], 1);
}

#[test]
fn check_rejects_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("pipeline.toml");
    fs::write(&config, "batch_capacity = 0\n").unwrap();

    let output = batchprep().arg("check").arg("--config").arg(&config).output().unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("batch_capacity"));
}

#[test]
fn missing_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("pipeline.toml");
    fs::write(&config, CONFIG).unwrap();

    let output = batchprep()
        .arg("run")
        .arg("--config")
        .arg(&config)
        .arg("--output-dir")
        .arg(dir.path().join("out"))
        .arg(dir.path().join("absent.csv"))
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("error:"));
}
