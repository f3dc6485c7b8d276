//! End-to-end tests for the classify and analyze commands.
//!
//! Each test writes a log and rules file into a temp directory and runs the
//! built binary against them with `HOME` pointed at that directory.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

fn cla_binary() -> String {
    env!("CARGO_BIN_EXE_cla").to_string()
}

const RULES: &str = r#"
name = "Test Contest"
score_formula = "points_times_multipliers"

[period]
start = "2025-10-25T00:00:00Z"
end = "2025-10-25T02:00:00Z"

[[multipliers]]
name = "Zones"
dimension = "zone"
totaling = "sum_by_band"
"#;

/// Four CW contacts on 14025 (a run), one lone 40m contact, one dupe.
const LOG: &str = r#"{
  "station": "K1ABC",
  "contacts": [
    {"timestamp": "2025-10-25T00:00:00Z", "frequency_khz": 14025.0, "band": "20m",
     "mode": "CW", "operator": "K1ABC", "points": 3, "multipliers": {"zone": "5"}},
    {"timestamp": "2025-10-25T00:01:00Z", "frequency_khz": 14025.0, "band": "20m",
     "mode": "CW", "operator": "K1ABC", "points": 3, "multipliers": {"zone": "5"}},
    {"timestamp": "2025-10-25T00:02:00Z", "frequency_khz": 14025.0, "band": "20m",
     "mode": "CW", "operator": "K1ABC", "points": 3, "multipliers": {"zone": "14"}},
    {"timestamp": "2025-10-25T00:03:00Z", "frequency_khz": 14025.0, "band": "20m",
     "mode": "CW", "operator": "K1ABC", "points": 3, "multipliers": {"zone": "15"}},
    {"timestamp": "2025-10-25T01:30:00Z", "frequency_khz": 7010.0, "band": "40m",
     "mode": "CW", "operator": "K1ABC", "points": 3, "multipliers": {"zone": "5"}},
    {"timestamp": "2025-10-25T01:31:00Z", "frequency_khz": 7010.0, "band": "40m",
     "mode": "CW", "operator": "K1ABC", "points": 3, "multipliers": {"zone": "4"},
     "is_dupe": true}
  ]
}"#;

fn write_fixture(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn run_cla(home: &Path, args: &[&str]) -> Output {
    Command::new(cla_binary())
        .env("HOME", home)
        .env_remove("CLA_CLASSIFIER__MIN_RUN_CONTACTS")
        .args(args)
        .output()
        .expect("failed to run cla")
}

fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "cla should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_analyze_produces_score_trace() {
    let temp = TempDir::new().unwrap();
    let rules = write_fixture(temp.path(), "rules.toml", RULES);
    let log = write_fixture(temp.path(), "k1abc.json", LOG);

    let output = run_cla(
        temp.path(),
        &[
            "analyze",
            "--rules",
            rules.to_str().unwrap(),
            log.to_str().unwrap(),
            "--json",
        ],
    );
    let results = stdout_json(&output);

    let analysis = &results[0];
    assert_eq!(analysis["station"], "K1ABC");
    assert_eq!(analysis["dropped"]["duplicate"], 1);
    assert_eq!(analysis["styles"]["run"], 4);
    assert_eq!(analysis["styles"]["unknown"], 1);

    let snapshots = analysis["trace"]["snapshots"].as_array().unwrap();
    assert_eq!(snapshots.len(), 2);

    // Hour 0: 12 points x zones {5, 14, 15}, all from the run.
    assert_eq!(snapshots[0]["score"]["total"], 36);
    assert_eq!(snapshots[0]["score"]["run"], 36);

    // Hour 1: 15 points x 4 zones, zone 5 counted again on 40m.
    let last = &snapshots[1];
    assert_eq!(last["score"]["total"], 60);
    assert_eq!(last["score"]["run"], 48);
    assert_eq!(last["score"]["non_run"], 12);
    assert_eq!(last["per_rule"]["Zones"], 4);

    let labels = analysis["labels"].as_array().unwrap();
    assert_eq!(labels.len(), 6);
    assert_eq!(labels[0], "run");
    assert_eq!(labels[4], "unknown");
    assert!(labels[5].is_null());

    assert_eq!(analysis["hourly"][1]["new_multipliers"], 1);
}

#[test]
fn test_analyze_several_logs_keeps_order() {
    let temp = TempDir::new().unwrap();
    let rules = write_fixture(temp.path(), "rules.toml", RULES);
    let first = write_fixture(temp.path(), "k1abc.json", LOG);
    let second = write_fixture(
        temp.path(),
        "w2xyz.json",
        &LOG.replace("K1ABC", "W2XYZ"),
    );

    let output = run_cla(
        temp.path(),
        &[
            "analyze",
            "--json",
            "--rules",
            rules.to_str().unwrap(),
            second.to_str().unwrap(),
            first.to_str().unwrap(),
        ],
    );
    let results = stdout_json(&output);
    assert_eq!(results[0]["station"], "W2XYZ");
    assert_eq!(results[1]["station"], "K1ABC");
}

#[test]
fn test_analyze_text_summary() {
    let temp = TempDir::new().unwrap();
    let rules = write_fixture(temp.path(), "rules.toml", RULES);
    let log = write_fixture(temp.path(), "k1abc.json", LOG);

    let output = run_cla(
        temp.path(),
        &["analyze", "-r", rules.to_str().unwrap(), log.to_str().unwrap()],
    );
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("CONTEST Test Contest (standard)"));
    assert!(stdout.contains("STATION K1ABC"));
    assert!(stdout.contains("(Run 48, non-Run 12)"));
    assert!(stdout.contains("Zones: 4"));
}

#[test]
fn test_analyze_without_period_fails() {
    let temp = TempDir::new().unwrap();
    let no_period = RULES
        .lines()
        .filter(|line| {
            !line.starts_with("[period]")
                && !line.starts_with("start")
                && !line.starts_with("end")
        })
        .collect::<Vec<_>>()
        .join("\n");
    let rules = write_fixture(temp.path(), "rules.toml", &no_period);
    let log = write_fixture(temp.path(), "k1abc.json", LOG);

    let output = run_cla(
        temp.path(),
        &["analyze", "--rules", rules.to_str().unwrap(), log.to_str().unwrap()],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("contest period is not defined"), "{stderr}");
}

#[test]
fn test_classify_labels_in_input_order() {
    let temp = TempDir::new().unwrap();
    let log = write_fixture(temp.path(), "k1abc.json", LOG);

    let output = run_cla(temp.path(), &["classify", "--json", log.to_str().unwrap()]);
    let classified = stdout_json(&output);

    assert_eq!(classified["station"], "K1ABC");
    let contacts = classified["contacts"].as_array().unwrap();
    assert_eq!(contacts.len(), 6);
    assert_eq!(contacts[0]["style"], "run");
    assert_eq!(contacts[4]["style"], "unknown");
    assert!(contacts[5].get("style").is_none());
}

#[test]
fn test_config_file_changes_thresholds() {
    let temp = TempDir::new().unwrap();
    let log = write_fixture(temp.path(), "k1abc.json", LOG);
    let config = write_fixture(
        temp.path(),
        "config.toml",
        "[classifier]\nmin_run_contacts = 5\n",
    );

    let output = run_cla(
        temp.path(),
        &[
            "--config",
            config.to_str().unwrap(),
            "classify",
            "--json",
            log.to_str().unwrap(),
        ],
    );
    let classified = stdout_json(&output);
    assert_eq!(classified["styles"]["run"], 0);
}

#[test]
fn test_env_overrides_config() {
    let temp = TempDir::new().unwrap();
    let log = write_fixture(temp.path(), "k1abc.json", LOG);

    let output = Command::new(cla_binary())
        .env("HOME", temp.path())
        .env("CLA_CLASSIFIER__MIN_RUN_CONTACTS", "5")
        .args(["classify", "--json", log.to_str().unwrap()])
        .output()
        .unwrap();
    let classified = stdout_json(&output);
    assert_eq!(classified["styles"]["run"], 0);
}
