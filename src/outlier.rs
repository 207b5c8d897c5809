//! Outlier reporting for matched pairs
//!
//! A pair is an outlier when any family maximum exceeds that family's
//! threshold. Diagnostics are best effort: a failing sink is logged and
//! counted, never propagated into the aggregation loop.

use crate::algorithm::{AlgorithmSet, Family};
use crate::diff::{FamilyMaxima, PairEvaluation};
use crate::record::JetRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};

/// Per-family |diff| thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub higgs: f64,
    pub pseudoscalar: f64,
    pub tagger: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            higgs: 1.00,
            pseudoscalar: 0.03,
            tagger: 0.001,
        }
    }
}

impl Thresholds {
    pub fn get(&self, family: Family) -> f64 {
        match family {
            Family::Higgs => self.higgs,
            Family::Pseudoscalar => self.pseudoscalar,
            Family::Tagger => self.tagger,
        }
    }

    /// Whether any family maximum is above its threshold; NaN always is
    pub fn exceeded_by(&self, maxima: &FamilyMaxima) -> bool {
        Family::ALL
            .iter()
            .any(|&f| maxima.get(f).is_some_and(|m| m.is_nan() || m > self.get(f)))
    }

    pub fn validate(&self) -> Result<(), String> {
        for family in Family::ALL {
            let t = self.get(family);
            if t.is_nan() || t < 0.0 {
                return Err(format!(
                    "threshold for family {} must be non-negative, got {}",
                    family.label(),
                    t
                ));
            }
        }
        Ok(())
    }
}

/// Destination of formatted diagnostics
pub trait DiagnosticSink {
    fn emit(&mut self, text: &str) -> io::Result<()>;
}

/// Writes each diagnostic as lines on stdout
#[derive(Debug, Default)]
pub struct StdoutSink;

impl DiagnosticSink for StdoutSink {
    fn emit(&mut self, text: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", text)
    }
}

/// Writes diagnostics to stderr, keeping stdout for a machine-readable report
#[derive(Debug, Default)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn emit(&mut self, text: &str) -> io::Result<()> {
        let mut err = io::stderr().lock();
        writeln!(err, "{}", text)
    }
}

/// Keeps diagnostics in memory, in emission order
#[derive(Debug, Default, Clone)]
pub struct BufferSink {
    pub lines: Vec<String>,
}

impl DiagnosticSink for BufferSink {
    fn emit(&mut self, text: &str) -> io::Result<()> {
        self.lines.push(text.to_string());
        Ok(())
    }
}

impl BufferSink {
    /// Re-emit everything into another sink
    pub fn drain_into(&mut self, sink: &mut dyn DiagnosticSink) -> io::Result<()> {
        for line in self.lines.drain(..) {
            sink.emit(&line)?;
        }
        Ok(())
    }
}

/// Jet kinematics as printed in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JetSnapshot {
    pub event_id: i64,
    pub object_index: i64,
    pub pt: Option<f64>,
    pub eta: f64,
    pub phi: f64,
    pub mass: f64,
}

impl From<&JetRecord> for JetSnapshot {
    fn from(jet: &JetRecord) -> Self {
        Self {
            event_id: jet.event_id,
            object_index: jet.object_index,
            pt: jet.pt,
            eta: jet.eta,
            phi: jet.phi,
            mass: jet.mass,
        }
    }
}

impl fmt::Display for JetSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event {}, jet[{}] pT = ", self.event_id, self.object_index)?;
        match self.pt {
            Some(pt) => write!(f, "{:.1}", pt)?,
            None => write!(f, "n/a")?,
        }
        write!(
            f,
            ", eta = {:.2}, phi = {:.2}, mass = {:.1}",
            self.eta, self.phi, self.mass
        )
    }
}

/// One algorithm's values in an outlier record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuePair {
    pub algorithm: String,
    pub reference: f64,
    pub candidate: f64,
}

/// A matched pair over threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierRecord {
    pub reference: JetSnapshot,
    pub candidate: JetSnapshot,
    pub max_diff_h: Option<f64>,
    pub max_diff_a: Option<f64>,
    pub max_diff_t: Option<f64>,
    pub values: Vec<ValuePair>,
}

fn fmt_max(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.6}", v))
}

impl OutlierRecord {
    pub fn from_evaluation(set: &AlgorithmSet, evaluation: &PairEvaluation) -> Self {
        let values = set
            .algorithms()
            .iter()
            .zip(&evaluation.comparisons)
            .map(|(a, c)| ValuePair {
                algorithm: a.name.clone(),
                reference: c.reference_value,
                candidate: c.candidate_value,
            })
            .collect();
        Self {
            reference: JetSnapshot::from(&evaluation.reference),
            candidate: JetSnapshot::from(&evaluation.candidate),
            max_diff_h: evaluation.family_maxima.get(Family::Higgs),
            max_diff_a: evaluation.family_maxima.get(Family::Pseudoscalar),
            max_diff_t: evaluation.family_maxima.get(Family::Tagger),
            values,
        }
    }

    fn header_line(&self) -> String {
        format!("\n*** In reference {} ***", self.reference)
    }

    fn candidate_line(&self) -> String {
        format!(" - In candidate {}", self.candidate)
    }

    fn value_lines(&self) -> String {
        let mut text = format!(
            "$$$ reference vs. candidate: max_diff_H = {}, max_diff_A = {}, max_diff_T = {}",
            fmt_max(self.max_diff_h),
            fmt_max(self.max_diff_a),
            fmt_max(self.max_diff_t)
        );
        for v in &self.values {
            text.push_str(&format!(
                "\n - {} {:.6} vs. {:.6}",
                v.algorithm, v.reference, v.candidate
            ));
        }
        text
    }
}

impl fmt::Display for OutlierRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header_line())?;
        writeln!(f, "{}", self.candidate_line())?;
        write!(f, "{}", self.value_lines())
    }
}

/// Decides what to print for each reference jet and matched pair
#[derive(Debug, Clone)]
pub struct OutlierReporter {
    thresholds: Thresholds,
    verbosity: u8,
    outliers: u64,
    sink_failures: u64,
}

impl OutlierReporter {
    pub fn new(thresholds: Thresholds, verbosity: u8) -> Self {
        Self {
            thresholds,
            verbosity,
            outliers: 0,
            sink_failures: 0,
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Pairs found over threshold so far
    pub fn outliers(&self) -> u64 {
        self.outliers
    }

    pub fn sink_failures(&self) -> u64 {
        self.sink_failures
    }

    fn emit(&mut self, sink: &mut dyn DiagnosticSink, text: &str) {
        if let Err(e) = sink.emit(text) {
            if self.sink_failures == 0 {
                tracing::warn!("Diagnostic output failed, continuing without it: {}", e);
            }
            self.sink_failures += 1;
        }
    }

    /// Announce a reference jet before matching (verbosity ≥ 3)
    pub fn before_match(&mut self, sink: &mut dyn DiagnosticSink, reference: &JetRecord) {
        if self.verbosity > 2 {
            let text = format!("\n*** In reference {} ***", JetSnapshot::from(reference));
            self.emit(sink, &text);
        }
    }

    /// Print the pair according to verbosity and thresholds.
    ///
    /// Returns the record when the pair is an outlier.
    pub fn report_pair(
        &mut self,
        sink: &mut dyn DiagnosticSink,
        set: &AlgorithmSet,
        evaluation: &PairEvaluation,
    ) -> Option<OutlierRecord> {
        let outlier = self.thresholds.exceeded_by(&evaluation.family_maxima);
        let header = self.verbosity == 2 || outlier;
        let candidate = self.verbosity >= 2 || outlier;
        let values = self.verbosity >= 1 || outlier;
        if !(header || candidate || values) {
            return None;
        }

        let record = OutlierRecord::from_evaluation(set, evaluation);
        if header {
            self.emit(sink, &record.header_line());
        }
        if candidate {
            self.emit(sink, &record.candidate_line());
        }
        if values {
            self.emit(sink, &record.value_lines());
        }

        if outlier {
            self.outliers += 1;
            Some(record)
        } else {
            None
        }
    }

    /// Fold counters from a worker's reporter
    pub fn absorb(&mut self, other: &OutlierReporter) {
        self.outliers += other.outliers;
        self.sink_failures += other.sink_failures;
    }
}
