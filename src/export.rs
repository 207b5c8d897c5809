//! Report rendering: text summary, JSON document, CSV table
//!
//! The JSON documents carry every named histogram (`<alg>_logDiff`,
//! `h_<var>_<sample>_<tr|te>`) and curve (`g_...`) so they can be plotted
//! outside this tool.

use crate::algorithm::Family;
use crate::cli::OutputFormat;
use crate::diff::AlgorithmSummary;
use crate::histogram::Histogram1D;
use crate::outlier::{OutlierRecord, Thresholds};
use crate::pipeline::{RunReport, RunStats};
use crate::roc::{background_at, EfficiencyCurve, RocReport};
use serde::Serialize;
use std::fmt::Write as _;

/// Serialized form of a comparison run
#[derive(Debug, Serialize)]
pub struct JsonCompareReport<'a> {
    pub version: &'static str,
    pub thresholds: &'a Thresholds,
    pub stats: &'a RunStats,
    pub summaries: &'a [AlgorithmSummary],
    pub histograms: &'a [Histogram1D],
    pub outliers: &'a [OutlierRecord],
}

/// Serialized form of a ROC run
#[derive(Debug, Serialize)]
pub struct JsonRocReport<'a> {
    pub version: &'static str,
    pub records: u64,
    pub weighted: f64,
    pub histograms: &'a [Histogram1D],
    pub curves: &'a [EfficiencyCurve],
    pub unavailable: &'a [String],
}

/// Escape CSV field (handle commas, quotes, newlines)
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.*}", precision, v))
}

fn family_label(family: Option<Family>) -> &'static str {
    family.map_or("-", Family::label)
}

pub fn compare_json(report: &RunReport, thresholds: &Thresholds) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonCompareReport {
        version: env!("CARGO_PKG_VERSION"),
        thresholds,
        stats: &report.stats,
        summaries: &report.diff.summaries,
        histograms: &report.diff.histograms,
        outliers: &report.outliers,
    })
}

/// One row per algorithm; relative differences in percent
pub fn compare_csv(report: &RunReport) -> String {
    let mut out = String::from("algorithm,family,matched,max_abs_diff,max_rel_diff_pct\n");
    for s in &report.diff.summaries {
        let _ = writeln!(
            out,
            "{},{},{},{},{}",
            escape_field(&s.name),
            family_label(s.family),
            s.matched,
            s.max_abs_diff.map_or(String::new(), |v| v.to_string()),
            s.max_rel_diff.map_or(String::new(), |v| (100.0 * v).to_string()),
        );
    }
    out
}

pub fn compare_text(report: &RunReport, thresholds: &Thresholds) -> String {
    let st = &report.stats;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "\nFound matches for {} out of {} events",
        st.candidate_events, st.reference_events
    );
    let _ = writeln!(
        out,
        "Reference jets: {} scanned, {} below mass cut, {} without event, {} without candidate",
        st.scanned, st.light_jets, st.event_absent, st.no_candidate
    );
    let _ = writeln!(
        out,
        "Matched pairs: {} ({} over thresholds H={}, A={}, T={})",
        st.matched, st.outliers, thresholds.higgs, thresholds.pseudoscalar, thresholds.tagger
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<10} {:>6} {:>8} {:>14} {:>14}",
        "algorithm", "family", "matched", "max |diff|", "max rel diff"
    );
    let _ = writeln!(out, "{}", "-".repeat(56));
    for s in &report.diff.summaries {
        let rel = s
            .max_rel_diff
            .map_or_else(|| "n/a".to_string(), |v| format!("{:.3}%", 100.0 * v));
        let _ = writeln!(
            out,
            "{:<10} {:>6} {:>8} {:>14} {:>14}",
            s.name,
            family_label(s.family),
            s.matched,
            fmt_opt(s.max_abs_diff, 6),
            rel
        );
    }
    out
}

pub fn roc_json(report: &RocReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonRocReport {
        version: env!("CARGO_PKG_VERSION"),
        records: report.records,
        weighted: report.weighted,
        histograms: &report.histograms,
        curves: &report.curves,
        unavailable: &report.unavailable,
    })
}

/// One row per curve point
pub fn roc_csv(report: &RocReport) -> String {
    let mut out = String::from("curve,point,signal_efficiency,background_efficiency\n");
    for curve in &report.curves {
        let name = escape_field(&curve.name);
        for (k, p) in curve.points.iter().enumerate() {
            let _ = writeln!(out, "{},{},{},{}", name, k, p.signal, p.background);
        }
    }
    out
}

pub fn roc_text(report: &RocReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "\nProcessed {} total records ({:.2} weighted)\n",
        report.records, report.weighted
    );
    let _ = writeln!(
        out,
        "{:<48} {:>12} {:>12} {:>12}",
        "curve", "bkg@sig=0.3", "bkg@sig=0.5", "bkg@sig=0.7"
    );
    let _ = writeln!(out, "{}", "-".repeat(87));
    for curve in &report.curves {
        let at = |s: f64| fmt_opt(background_at(&curve.points, s), 5);
        let _ = writeln!(
            out,
            "{:<48} {:>12} {:>12} {:>12}",
            curve.name,
            at(0.3),
            at(0.5),
            at(0.7)
        );
    }
    for name in &report.unavailable {
        let _ = writeln!(out, "{:<48} unavailable (empty histogram)", name);
    }
    out
}

/// Render a comparison report in `format`
pub fn render_compare(
    report: &RunReport,
    thresholds: &Thresholds,
    format: OutputFormat,
) -> serde_json::Result<String> {
    Ok(match format {
        OutputFormat::Text => compare_text(report, thresholds),
        OutputFormat::Json => compare_json(report, thresholds)?,
        OutputFormat::Csv => compare_csv(report),
    })
}

/// Render a ROC report in `format`
pub fn render_roc(report: &RocReport, format: OutputFormat) -> serde_json::Result<String> {
    Ok(match format {
        OutputFormat::Text => roc_text(report),
        OutputFormat::Json => roc_json(report)?,
        OutputFormat::Csv => roc_csv(report),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::DiffReport;
    use crate::roc::EfficiencyPoint;

    fn report() -> RunReport {
        let mut h = Histogram1D::new("T1_logDiff", 100, -8.0, 2.0);
        h.fill(-3.0);
        RunReport {
            stats: RunStats {
                reference_events: 4,
                candidate_events: 3,
                scanned: 6,
                matched: 2,
                ..RunStats::default()
            },
            diff: DiffReport {
                summaries: vec![
                    AlgorithmSummary {
                        name: "T1".into(),
                        family: Some(Family::Tagger),
                        matched: 2,
                        max_abs_diff: Some(0.001),
                        max_rel_diff: Some(0.0025),
                    },
                    AlgorithmSummary {
                        name: "H4x".into(),
                        family: None,
                        matched: 2,
                        max_abs_diff: Some(0.5),
                        max_rel_diff: None,
                    },
                ],
                histograms: vec![h],
            },
            outliers: Vec::new(),
        }
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_compare_text_marks_unavailable() {
        let text = compare_text(&report(), &Thresholds::default());
        assert!(text.contains("Found matches for 3 out of 4 events"));
        assert!(text.contains("0.250%"));
        let h4x = text.lines().find(|l| l.starts_with("H4x")).unwrap();
        assert!(h4x.ends_with("n/a"));
    }

    #[test]
    fn test_compare_csv() {
        let csv = compare_csv(&report());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "algorithm,family,matched,max_abs_diff,max_rel_diff_pct");
        assert_eq!(lines[1], "T1,T,2,0.001,0.25");
        assert_eq!(lines[2], "H4x,-,2,0.5,");
    }

    #[test]
    fn test_compare_json_has_named_histograms() {
        let json = compare_json(&report(), &Thresholds::default()).unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["histograms"][0]["name"], "T1_logDiff");
        assert_eq!(v["summaries"][1]["max_rel_diff"], serde_json::Value::Null);
        assert_eq!(v["stats"]["matched"], 2);
        assert_eq!(v["thresholds"]["tagger"], 0.001);
    }

    #[test]
    fn test_roc_renderers() {
        let report = RocReport {
            histograms: Vec::new(),
            curves: vec![EfficiencyCurve {
                name: "g_X_S_vs_B_te".into(),
                title: "X ROC curve (S vs. B)".into(),
                signal_histogram: "h_X_S_te".into(),
                background_histogram: "h_X_B_te".into(),
                points: vec![
                    EfficiencyPoint { signal: 0.5, background: 0.1 },
                    EfficiencyPoint { signal: 1.0, background: 1.0 },
                ],
            }],
            unavailable: vec!["g_X_S_vs_B_tr".into()],
            records: 10,
            weighted: 12.5,
        };
        let csv = roc_csv(&report);
        assert_eq!(csv.lines().count(), 3);
        assert!(csv.contains("g_X_S_vs_B_te,1,1,1"));

        let text = roc_text(&report);
        assert!(text.contains("Processed 10 total records (12.50 weighted)"));
        assert!(text.contains("g_X_S_vs_B_tr"));
        assert!(text.contains("0.10000"));

        let json = render_roc(&report, OutputFormat::Json).unwrap();
        assert!(json.contains("\"unavailable\""));
    }
}
