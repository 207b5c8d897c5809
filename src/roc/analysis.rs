// Sample histogram filling and curve production for the ROC run

use super::curve::{build_curve, EfficiencyCurve};
use super::selection::{passes_all, Cut, Sample, SampleKind, ScoreVariable, Split, SplitLabel};
use crate::diff::HistogramBinning;
use crate::error::Result;
use crate::histogram::Histogram1D;
use crate::record::{read_f64, require_fields, RecordStream};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

fn default_score_binning() -> HistogramBinning {
    HistogramBinning {
        n_bins: 1000,
        x_min: 0.0,
        x_max: 1.0,
    }
}

/// What to histogram and which curves to build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocPlan {
    /// Applied to every record of every input
    #[serde(default)]
    pub preselection: Vec<Cut>,
    pub variables: Vec<ScoreVariable>,
    pub samples: Vec<Sample>,
    #[serde(default)]
    pub split: Split,
    /// Per-record weight; unweighted when absent
    #[serde(default)]
    pub weight_field: Option<String>,
    #[serde(default = "default_score_binning")]
    pub binning: HistogramBinning,
}

impl RocPlan {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.variables.is_empty() {
            return Err("at least one score variable is required".to_string());
        }
        for kind in [SampleKind::Signal, SampleKind::Background] {
            if !self.samples.iter().any(|s| s.kind == kind) {
                return Err(format!("at least one {:?} sample is required", kind).to_lowercase());
            }
        }
        let mut seen = HashSet::new();
        for v in &self.variables {
            if !seen.insert(v.name.as_str()) {
                return Err(format!("duplicate score variable '{}'", v.name));
            }
            if v.numerator.is_empty() {
                return Err(format!("score variable '{}' has no numerator fields", v.name));
            }
            if !v.denominator.is_empty() && (v.floor.is_nan() || v.floor <= 0.0) {
                return Err(format!("score variable '{}' needs a positive floor", v.name));
            }
        }
        let mut seen = HashSet::new();
        for s in &self.samples {
            if !seen.insert(s.name.as_str()) {
                return Err(format!("duplicate sample '{}'", s.name));
            }
        }
        if self.split.modulus <= 0 {
            return Err(format!(
                "split modulus must be positive, got {}",
                self.split.modulus
            ));
        }
        self.binning.validate()
    }

    /// Fields an input must provide
    pub fn required_fields(&self, input: &str) -> Vec<&str> {
        let sample_cuts = self
            .samples
            .iter()
            .filter(|s| s.input == input)
            .flat_map(|s| &s.cuts);
        let all = self
            .preselection
            .iter()
            .chain(sample_cuts)
            .map(|c| c.field.as_str())
            .chain(self.variables.iter().flat_map(ScoreVariable::fields))
            .chain(std::iter::once(self.split.field.as_str()))
            .chain(self.weight_field.as_deref());

        let mut fields: Vec<&str> = Vec::new();
        for f in all {
            if !fields.contains(&f) {
                fields.push(f);
            }
        }
        fields
    }
}

/// Per-input fill statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FillSummary {
    pub scanned: u64,
    /// Records landing in at least one sample
    pub selected: u64,
    pub weighted: f64,
}

/// Everything produced by a ROC run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocReport {
    pub histograms: Vec<Histogram1D>,
    pub curves: Vec<EfficiencyCurve>,
    /// Curves skipped because a histogram had nothing to normalise by
    pub unavailable: Vec<String>,
    pub records: u64,
    pub weighted: f64,
}

/// Histograms `h_<var>_<sample>_<tr|te>` filled from the configured inputs
#[derive(Debug, Clone)]
pub struct RocAnalysis {
    plan: RocPlan,
    histograms: Vec<Histogram1D>,
    progress_every: u64,
    totals: FillSummary,
}

impl RocAnalysis {
    pub fn new(plan: RocPlan) -> Self {
        let b = plan.binning;
        let mut histograms =
            Vec::with_capacity(plan.variables.len() * plan.samples.len() * SplitLabel::ALL.len());
        for v in &plan.variables {
            for s in &plan.samples {
                for split in SplitLabel::ALL {
                    histograms.push(
                        Histogram1D::new(
                            format!("h_{}_{}_{}", v.name, s.name, split.tag()),
                            b.n_bins,
                            b.x_min,
                            b.x_max,
                        )
                        .with_title(format!("{} {} ({})", s.name, v.name, split.tag())),
                    );
                }
            }
        }
        Self {
            plan,
            histograms,
            progress_every: 0,
            totals: FillSummary::default(),
        }
    }

    /// Log progress every `n` records (0 disables)
    pub fn with_progress(mut self, n: u64) -> Self {
        self.progress_every = n;
        self
    }

    pub fn plan(&self) -> &RocPlan {
        &self.plan
    }

    fn slot(&self, variable: usize, sample: usize, split: SplitLabel) -> usize {
        let split = match split {
            SplitLabel::Train => 0,
            SplitLabel::Test => 1,
        };
        (variable * self.plan.samples.len() + sample) * 2 + split
    }

    pub fn histogram(&self, variable: &str, sample: &str, split: SplitLabel) -> Option<&Histogram1D> {
        let v = self.plan.variables.iter().position(|x| x.name == variable)?;
        let s = self.plan.samples.iter().position(|x| x.name == sample)?;
        Some(&self.histograms[self.slot(v, s, split)])
    }

    pub fn histograms(&self) -> &[Histogram1D] {
        &self.histograms
    }

    /// Startup check that `stream` carries every field needed for `input`
    pub fn check_input(&self, input: &str, stream: &dyn RecordStream) -> Result<()> {
        require_fields(stream, self.plan.required_fields(input))
    }

    /// Fill the histograms of every sample drawn from `input`; a cap of
    /// `Some(0)` reads the whole stream
    pub fn fill(
        &mut self,
        input: &str,
        stream: &dyn RecordStream,
        max_records: Option<usize>,
    ) -> Result<FillSummary> {
        let samples: Vec<usize> = (0..self.plan.samples.len())
            .filter(|&i| self.plan.samples[i].input == input)
            .collect();
        if samples.is_empty() {
            tracing::warn!("Input {} feeds no sample, skipping", input);
            return Ok(FillSummary::default());
        }
        // 0 means no cap, as for compare
        let limit = max_records
            .filter(|&m| m > 0)
            .map_or(stream.len(), |m| m.min(stream.len()));
        tracing::info!("About to run over {} records in {}", limit, input);

        let mut summary = FillSummary::default();
        let mut matching: Vec<usize> = Vec::with_capacity(samples.len());
        let mut values: Vec<f64> = vec![0.0; self.plan.variables.len()];

        for position in 0..limit {
            summary.scanned += 1;
            let seen = self.totals.scanned + summary.scanned;
            if self.progress_every > 0 && seen % self.progress_every == 0 {
                tracing::info!("Event #{}", seen);
            }

            if !passes_all(&self.plan.preselection, stream, position)? {
                continue;
            }
            matching.clear();
            for &s in &samples {
                if passes_all(&self.plan.samples[s].cuts, stream, position)? {
                    matching.push(s);
                }
            }
            if matching.is_empty() {
                continue;
            }

            let split = self.plan.split.label(stream, position)?;
            let weight = match &self.plan.weight_field {
                Some(field) => read_f64(stream, position, field)?,
                None => 1.0,
            };
            for (value, variable) in values.iter_mut().zip(&self.plan.variables) {
                *value = variable.evaluate(stream, position)?;
            }

            for &s in &matching {
                for (v, &value) in values.iter().enumerate() {
                    let slot = self.slot(v, s, split);
                    self.histograms[slot].fill_weighted(value, weight);
                }
            }
            summary.selected += 1;
            summary.weighted += weight;
        }

        self.totals.scanned += summary.scanned;
        self.totals.selected += summary.selected;
        self.totals.weighted += summary.weighted;
        Ok(summary)
    }

    pub fn totals(&self) -> FillSummary {
        self.totals
    }

    /// One curve per (variable, signal, background, split).
    ///
    /// Curves with an empty histogram are skipped and their names returned
    /// separately; any other failure is propagated.
    pub fn curves(&self) -> Result<(Vec<EfficiencyCurve>, Vec<String>)> {
        let mut curves = Vec::new();
        let mut unavailable = Vec::new();
        let kind_indices = |kind: SampleKind| -> Vec<usize> {
            (0..self.plan.samples.len())
                .filter(|&i| self.plan.samples[i].kind == kind)
                .collect()
        };
        let signals = kind_indices(SampleKind::Signal);
        let backgrounds = kind_indices(SampleKind::Background);

        for (v, variable) in self.plan.variables.iter().enumerate() {
            for &s in &signals {
                for &b in &backgrounds {
                    for split in SplitLabel::ALL {
                        let sig: &Sample = &self.plan.samples[s];
                        let bkg: &Sample = &self.plan.samples[b];
                        let name = format!(
                            "g_{}_{}_vs_{}_{}",
                            variable.name,
                            sig.name,
                            bkg.name,
                            split.tag()
                        );
                        let h_s = &self.histograms[self.slot(v, s, split)];
                        let h_b = &self.histograms[self.slot(v, b, split)];
                        tracing::debug!("Filling ROC {}", name);
                        match build_curve(h_s, h_b) {
                            Ok(points) => curves.push(EfficiencyCurve {
                                title: format!(
                                    "{} ROC curve ({} vs. {})",
                                    variable.name, sig.name, bkg.name
                                ),
                                name,
                                signal_histogram: h_s.name.clone(),
                                background_histogram: h_b.name.clone(),
                                points,
                            }),
                            Err(e) if !e.is_fatal() => {
                                tracing::warn!("{} unavailable: {}", name, e);
                                unavailable.push(name);
                            }
                            Err(e) => return Err(e),
                        }
                    }
                }
            }
        }
        Ok((curves, unavailable))
    }

    pub fn finish(self) -> Result<RocReport> {
        let (curves, unavailable) = self.curves()?;
        tracing::info!(
            "Processed {} total records ({:.2} weighted)",
            self.totals.scanned,
            self.totals.weighted
        );
        Ok(RocReport {
            histograms: self.histograms,
            curves,
            unavailable,
            records: self.totals.scanned,
            weighted: self.totals.weighted,
        })
    }
}
