// End-to-end comparison runs through the library API
//
// Inputs are real JSON Lines files on disk, loaded through the same config
// path the binary uses.

mod utils;

use jetdiff::config::CompareConfig;
use jetdiff::outlier::BufferSink;
use jetdiff::pipeline::run_compare;
use utils::{compare_workspace, REFERENCE_ROWS};

#[test]
fn test_matched_pair_fills_histograms() {
    let (_dir, path) = compare_workspace(REFERENCE_ROWS, "");
    let config = CompareConfig::from_toml(&path).unwrap();
    let set = config.algorithm_set().unwrap();
    let mut sink = BufferSink::default();

    let report = run_compare(&config, &set, &mut sink).unwrap();

    let stats = &report.stats;
    assert_eq!(stats.reference_events, 2);
    assert_eq!(stats.candidate_events, 1);
    assert_eq!(stats.scanned, 3);
    assert_eq!(stats.light_jets, 1);
    assert_eq!(stats.event_absent, 1);
    assert_eq!(stats.matched, 1);
    // |125 - 124| = 1.0 is not over the default Higgs threshold of 1.0
    assert_eq!(stats.outliers, 0);
    assert!(sink.lines.is_empty());

    let h2 = report
        .diff
        .histograms
        .iter()
        .find(|h| h.name == "H2_logDiff")
        .unwrap();
    assert_eq!(h2.entries(), 1);
    // log10(1.0 + 1e-10) lands in [0.0, 0.1)
    assert_eq!(h2.bin_content(81), 1.0);

    let t1 = report
        .diff
        .histograms
        .iter()
        .find(|h| h.name == "T1_logDiff")
        .unwrap();
    // Identical scores clip to the first bin
    assert_eq!(t1.bin_content(1), 1.0);
    assert_eq!(t1.underflow(), 0.0);

    let summary = &report.diff.summaries[0];
    assert_eq!(summary.name, "H2");
    assert_eq!(summary.max_abs_diff, Some(1.0));
    assert_eq!(summary.max_rel_diff, Some(1.0 / 124.0));
}

#[test]
fn test_absent_event_is_not_an_error() {
    let reference = r#"{"event": 99, "FatJet_pt": [250.0], "FatJet_eta": [0.0], "FatJet_phi": [0.0], "FatJet_mass": [100.0], "FatJet_particleNet_massH_Hto4b_v2": [110.0], "FatJet_particleNetMD_Hto4b_Haa4b": [0.3]}
"#;
    let (_dir, path) = compare_workspace(reference, "");
    let config = CompareConfig::from_toml(&path).unwrap();
    let set = config.algorithm_set().unwrap();

    let report = run_compare(&config, &set, &mut BufferSink::default()).unwrap();

    assert_eq!(report.stats.event_absent, 1);
    assert_eq!(report.stats.matched, 0);
    assert_eq!(report.stats.candidate_events, 0);
    assert!(report.diff.histograms.iter().all(|h| h.entries() == 0));
    assert!(report
        .diff
        .summaries
        .iter()
        .all(|s| s.max_abs_diff.is_none()));
}

#[test]
fn test_outlier_printed_when_threshold_exceeded() {
    let (_dir, path) = compare_workspace(REFERENCE_ROWS, "[thresholds]\nhiggs = 0.5\n");
    let config = CompareConfig::from_toml(&path).unwrap();
    let set = config.algorithm_set().unwrap();
    let mut sink = BufferSink::default();

    let report = run_compare(&config, &set, &mut sink).unwrap();

    assert_eq!(report.stats.outliers, 1);
    let outlier = &report.outliers[0];
    assert_eq!(outlier.reference.event_id, 7);
    assert_eq!(outlier.max_diff_h, Some(1.0));
    assert_eq!(outlier.max_diff_t, Some(0.0));
    assert_eq!(outlier.max_diff_a, None);

    assert_eq!(sink.lines.len(), 3);
    assert!(sink.lines[0].contains(
        "*** In reference event 7, jet[0] pT = 300.0, eta = 0.50, phi = 1.00, mass = 120.0 ***"
    ));
    assert!(sink.lines[1].starts_with(" - In candidate event 7, jet[0]"));
    assert!(sink.lines[2].contains("max_diff_H = 1.000000"));
    assert!(sink.lines[2].contains("max_diff_A = n/a"));
    assert!(sink.lines[2].contains(" - H2 125.000000 vs. 124.000000"));
}

#[test]
fn test_verbose_run_prints_every_reference_jet() {
    let (_dir, path) = compare_workspace(REFERENCE_ROWS, "verbosity = 3\n");
    let config = CompareConfig::from_toml(&path).unwrap();
    let set = config.algorithm_set().unwrap();
    let mut sink = BufferSink::default();

    run_compare(&config, &set, &mut sink).unwrap();

    // Event 7 jet 0 and event 99 jet 0 are announced; the light jet is not
    let announced = sink
        .lines
        .iter()
        .filter(|l| l.starts_with("\n*** In reference"))
        .count();
    assert_eq!(announced, 2);
    // Verbosity 3 prints candidate and values but no second header
    assert!(sink.lines.iter().any(|l| l.starts_with(" - In candidate")));
    assert!(sink.lines.iter().any(|l| l.starts_with("$$$")));
}

#[test]
fn test_record_cap_limits_reference_prefix() {
    let (_dir, path) = compare_workspace(REFERENCE_ROWS, "");
    let mut config = CompareConfig::from_toml(&path).unwrap();
    config.max_records = 1;
    let set = config.algorithm_set().unwrap();

    let report = run_compare(&config, &set, &mut BufferSink::default()).unwrap();

    assert_eq!(report.stats.scanned, 1);
    assert_eq!(report.stats.reference_events, 1);
    assert_eq!(report.stats.matched, 1);
}

#[test]
fn test_select_regex_narrows_algorithms() {
    let (_dir, path) = compare_workspace(REFERENCE_ROWS, "select = \"^T\"\n");
    let config = CompareConfig::from_toml(&path).unwrap();
    let set = config.algorithm_set().unwrap();
    assert_eq!(set.len(), 1);

    let report = run_compare(&config, &set, &mut BufferSink::default()).unwrap();
    assert_eq!(report.diff.histograms.len(), 1);
    assert_eq!(report.diff.histograms[0].name, "T1_logDiff");
}

#[test]
fn test_threaded_run_matches_sequential() {
    let (_dir, path) = compare_workspace(REFERENCE_ROWS, "[thresholds]\nhiggs = 0.5\n");
    let sequential_config = CompareConfig::from_toml(&path).unwrap();
    let mut threaded_config = sequential_config.clone();
    threaded_config.threads = 2;
    let set = sequential_config.algorithm_set().unwrap();

    let mut seq_sink = BufferSink::default();
    let mut par_sink = BufferSink::default();
    let sequential = run_compare(&sequential_config, &set, &mut seq_sink).unwrap();
    let threaded = run_compare(&threaded_config, &set, &mut par_sink).unwrap();

    assert_eq!(sequential.stats, threaded.stats);
    assert_eq!(sequential.outliers, threaded.outliers);
    assert_eq!(seq_sink.lines, par_sink.lines);
    for (a, b) in sequential.diff.histograms.iter().zip(&threaded.diff.histograms) {
        assert_eq!(a.contents(), b.contents());
    }
}

#[test]
fn test_missing_partition_files_rejected() {
    let (dir, path) = compare_workspace(REFERENCE_ROWS, "");
    std::fs::remove_file(dir.path().join("weaver/T1.jsonl")).unwrap();
    let config = CompareConfig::from_toml(&path).unwrap();
    let set = config.algorithm_set().unwrap();

    assert!(run_compare(&config, &set, &mut BufferSink::default()).is_err());
}
