// Shared fixtures for the integration tests
//
// Writes small JSON Lines inputs and TOML run configs into a temp dir.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Reconstruction-side rows, one per event, jets as arrays.
///
/// Event 7 holds a heavy jet (matched) and a light one (skipped by the mass
/// cut); event 99 has no counterpart on the candidate side.
pub const REFERENCE_ROWS: &str = r#"{"event": 7, "FatJet_pt": [300.0, 200.0], "FatJet_eta": [0.5, -1.2], "FatJet_phi": [1.0, 3.1], "FatJet_mass": [120.0, 0.5], "FatJet_particleNet_massH_Hto4b_v2": [125.0, 90.0], "FatJet_particleNetMD_Hto4b_Haa4b": [0.9, 0.1]}
{"event": 99, "FatJet_pt": [250.0], "FatJet_eta": [0.0], "FatJet_phi": [0.0], "FatJet_mass": [100.0], "FatJet_particleNet_massH_Hto4b_v2": [110.0], "FatJet_particleNetMD_Hto4b_Haa4b": [0.3]}
"#;

/// Prediction rows of the H2 partition
pub const H2_ROWS: &str = r#"{"event_no": 7, "jet_no": 0, "fj_pt": 298.0, "fj_eta": 0.52, "fj_phi": 1.03, "fj_mass": 118.0, "output": 124.0}
{"event_no": 8, "jet_no": 0, "fj_pt": 410.0, "fj_eta": 1.5, "fj_phi": -2.0, "fj_mass": 90.0, "output": 80.0}
"#;

/// Prediction rows of the T1 partition, aligned with [`H2_ROWS`]
pub const T1_ROWS: &str = r#"{"event_no": 7, "jet_no": 0, "fj_pt": 298.0, "fj_eta": 0.52, "fj_phi": 1.03, "fj_mass": 118.0, "probHaa4b": 0.9}
{"event_no": 8, "jet_no": 0, "fj_pt": 410.0, "fj_eta": 1.5, "fj_phi": -2.0, "fj_mass": 90.0, "probHaa4b": 0.5}
"#;

pub fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// Compare config over the fixture files; `extra` goes in before the input tables
pub fn compare_config(extra: &str) -> String {
    format!(
        r#"algorithms = ["H2", "T1"]
progress_every = 0
{}
[reference]
files = ["cmssw.jsonl"]
flatten_index_field = "jet_idx"

[candidate.partitions]
H2 = ["weaver/H2.jsonl"]
T1 = ["weaver/T1.jsonl"]
"#,
        extra
    )
}

/// Temp dir holding the comparison inputs and `compare.toml`
pub fn compare_workspace(reference: &str, extra: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "cmssw.jsonl", reference);
    write(dir.path(), "weaver/H2.jsonl", H2_ROWS);
    write(dir.path(), "weaver/T1.jsonl", T1_ROWS);
    let config = write(dir.path(), "compare.toml", &compare_config(extra));
    (dir, config)
}

/// Score rows: (event_no, fj_pt, probHaa4b, probQCD)
pub fn score_rows(rows: &[(i64, f64, f64, f64)]) -> String {
    rows.iter()
        .map(|(event, pt, sig, qcd)| {
            format!(
                "{{\"event_no\": {}, \"fj_pt\": {}, \"probHaa4b\": {}, \"probQCD\": {}}}\n",
                event, pt, sig, qcd
            )
        })
        .collect()
}

pub const ROC_CONFIG: &str = r#"preselection = ["fj_pt > 170"]

[split]
field = "event_no"
modulus = 2

[binning]
n_bins = 10
x_min = 0.0
x_max = 1.0

[[variables]]
name = "PN_Xto4b"
numerator = ["probHaa4b"]

[[variables]]
name = "PN_Xto4bVsQCD"
numerator = ["probHaa4b"]
denominator = ["probHaa4b", "probQCD"]

[[samples]]
name = "Sig"
kind = "signal"
input = "sig"

[[samples]]
name = "QCD"
kind = "background"
input = "qcd"

[[input]]
name = "sig"
files = ["sig.jsonl"]

[[input]]
name = "qcd"
files = ["qcd.jsonl"]
"#;

/// Temp dir holding signal and background inputs plus `roc.toml`
pub fn roc_workspace(signal: &str, background: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "sig.jsonl", signal);
    write(dir.path(), "qcd.jsonl", background);
    let config = write(dir.path(), "roc.toml", ROC_CONFIG);
    (dir, config)
}
