// Command-line behavior of the jetdiff binary

mod utils;

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use utils::{compare_workspace, roc_workspace, score_rows, REFERENCE_ROWS};

fn jetdiff() -> Command {
    Command::cargo_bin("jetdiff").unwrap()
}

// ============================================================================
// compare
// ============================================================================

#[test]
fn test_compare_text_summary() {
    let (_dir, config) = compare_workspace(REFERENCE_ROWS, "");
    jetdiff()
        .arg("compare")
        .arg("-c")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Found matches for 1 out of 2 events"))
        .stdout(predicate::str::contains("Matched pairs: 1"))
        .stdout(predicate::str::contains("H2"))
        .stdout(predicate::str::contains("T1"));
}

#[test]
fn test_compare_json_output_file() {
    let (dir, config) = compare_workspace(REFERENCE_ROWS, "");
    let out = dir.path().join("report.json");
    jetdiff()
        .args(["compare", "--format", "json", "-o"])
        .arg(&out)
        .arg("-c")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(json["stats"]["matched"], 1);
    assert_eq!(json["stats"]["event_absent"], 1);
    assert_eq!(json["histograms"][0]["name"], "H2_logDiff");
    assert_eq!(json["summaries"][0]["max_abs_diff"], 1.0);
}

#[test]
fn test_compare_json_stdout_stays_parseable_with_outliers() {
    let (_dir, config) = compare_workspace(REFERENCE_ROWS, "");
    let output = jetdiff()
        .args(["compare", "--format", "json", "--diff-h", "0.5", "-c"])
        .arg(&config)
        .output()
        .unwrap();
    assert!(output.status.success());

    // Outlier diagnostics go to stderr when stdout carries the report
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["stats"]["outliers"], 1);
    assert_eq!(json["outliers"][0]["reference"]["event_id"], 7);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("*** In reference event 7"));
}

#[test]
fn test_compare_csv_rows() {
    let (_dir, config) = compare_workspace(REFERENCE_ROWS, "");
    jetdiff()
        .args(["compare", "--format", "csv", "-c"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "algorithm,family,matched,max_abs_diff,max_rel_diff_pct\n",
        ))
        .stdout(predicate::str::contains("H2,H,1,1,"))
        .stdout(predicate::str::contains("T1,T,1,0,0"));
}

#[test]
fn test_compare_threshold_flag_prints_outlier() {
    let (_dir, config) = compare_workspace(REFERENCE_ROWS, "");
    jetdiff()
        .args(["compare", "--diff-h", "0.5", "-c"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("*** In reference event 7, jet[0]"))
        .stdout(predicate::str::contains("$$$ reference vs. candidate"))
        .stdout(predicate::str::contains("1 over thresholds"));
}

#[test]
fn test_compare_missing_config_fails() {
    jetdiff()
        .args(["compare", "-c", "/nonexistent/compare.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read compare config"));
}

#[test]
fn test_compare_unknown_algorithm_fails() {
    let (dir, _) = compare_workspace(REFERENCE_ROWS, "");
    let config = utils::write(
        dir.path(),
        "bad.toml",
        r#"algorithms = ["H9"]
[reference]
files = ["cmssw.jsonl"]
[candidate.partitions]
H9 = ["weaver/H2.jsonl"]
"#,
    );
    jetdiff()
        .arg("compare")
        .arg("-c")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("H9"));
}

#[test]
fn test_compare_rejects_zero_threads() {
    let (_dir, config) = compare_workspace(REFERENCE_ROWS, "");
    jetdiff()
        .args(["compare", "-j", "0", "-c"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("threads"));
}

// ============================================================================
// roc
// ============================================================================

fn roc_inputs() -> (String, String) {
    (
        score_rows(&[
            (0, 300.0, 0.95, 0.05),
            (1, 300.0, 0.85, 0.10),
            (2, 300.0, 0.95, 0.00),
            (3, 300.0, 0.75, 0.20),
        ]),
        score_rows(&[
            (0, 300.0, 0.15, 0.80),
            (1, 300.0, 0.05, 0.90),
            (2, 300.0, 0.55, 0.40),
            (3, 300.0, 0.25, 0.70),
        ]),
    )
}

#[test]
fn test_roc_text_summary() {
    let (sig, bkg) = roc_inputs();
    let (_dir, config) = roc_workspace(&sig, &bkg);
    jetdiff()
        .args(["roc", "-c"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Processed 8 total records"))
        .stdout(predicate::str::contains("g_PN_Xto4b_Sig_vs_QCD_tr"))
        .stdout(predicate::str::contains("g_PN_Xto4bVsQCD_Sig_vs_QCD_te"));
}

#[test]
fn test_roc_csv_has_one_row_per_point() {
    let (sig, bkg) = roc_inputs();
    let (_dir, config) = roc_workspace(&sig, &bkg);
    let output = jetdiff()
        .args(["roc", "--format", "csv", "-c"])
        .arg(&config)
        .output()
        .unwrap();
    assert!(output.status.success());
    let csv = String::from_utf8(output.stdout).unwrap();
    // header + 4 curves x 11 points
    assert_eq!(csv.lines().count(), 1 + 4 * 11);
    assert!(csv.contains("g_PN_Xto4b_Sig_vs_QCD_tr,10,1,1"));
}

#[test]
fn test_roc_json_output() {
    let (sig, bkg) = roc_inputs();
    let (dir, config) = roc_workspace(&sig, &bkg);
    let out = dir.path().join("roc.json");
    jetdiff()
        .args(["roc", "--format", "json", "-o"])
        .arg(&out)
        .arg("-c")
        .arg(&config)
        .assert()
        .success();

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(json["records"], 8);
    assert_eq!(json["curves"].as_array().unwrap().len(), 4);
    assert_eq!(json["histograms"].as_array().unwrap().len(), 8);
}

#[test]
fn test_roc_max_records_flag() {
    let (sig, bkg) = roc_inputs();
    let (_dir, config) = roc_workspace(&sig, &bkg);
    jetdiff()
        .args(["roc", "-n", "2", "-c"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Processed 4 total records"));
}

#[test]
fn test_roc_zero_max_records_reads_everything() {
    let (sig, bkg) = roc_inputs();
    let (_dir, config) = roc_workspace(&sig, &bkg);
    jetdiff()
        .args(["roc", "-n", "0", "-c"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Processed 8 total records"));
}

#[test]
fn test_roc_missing_input_file_fails() {
    let (sig, bkg) = roc_inputs();
    let (dir, config) = roc_workspace(&sig, &bkg);
    fs::remove_file(dir.path().join("qcd.jsonl")).unwrap();
    jetdiff()
        .args(["roc", "-c"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("qcd"));
}

#[test]
fn test_help_lists_subcommands() {
    jetdiff()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("compare"))
        .stdout(predicate::str::contains("roc"));
}
