//! Per-algorithm discrepancy aggregation
//!
//! For every matched pair all configured algorithms are evaluated first and
//! only then filled, so an error while reading any value leaves the
//! aggregator untouched for that pair.

use crate::algorithm::{AlgorithmSet, ExtractionRule, Family};
use crate::error::{JetDiffError, Result};
use crate::histogram::Histogram1D;
use crate::record::{read_f64, JetRecord, RecordStream};
use serde::{Deserialize, Serialize};

/// Guards log10(0)
pub const LOG_DIFF_EPSILON: f64 = 1e-10;
/// Lower clip of the log difference, inside the first bin
pub const LOG_DIFF_MIN: f64 = -7.999;
/// Upper clip of the log difference, inside the last bin
pub const LOG_DIFF_MAX: f64 = 1.999;

/// `clip(log10(|diff| + 1e-10), -7.999, 1.999)`; a NaN diff (missing value
/// on either side) counts as the largest discrepancy.
pub fn clipped_log_diff(diff: f64) -> f64 {
    if diff.is_nan() {
        return LOG_DIFF_MAX;
    }
    (diff.abs() + LOG_DIFF_EPSILON)
        .log10()
        .clamp(LOG_DIFF_MIN, LOG_DIFF_MAX)
}

/// Maximum that keeps NaN instead of discarding it
pub fn nan_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.max(b)
    }
}

/// Binning of the log-difference histograms
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBinning {
    pub n_bins: usize,
    pub x_min: f64,
    pub x_max: f64,
}

impl Default for HistogramBinning {
    fn default() -> Self {
        Self {
            n_bins: 100,
            x_min: -8.0,
            x_max: 2.0,
        }
    }
}

impl HistogramBinning {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.n_bins == 0 {
            return Err("histogram n_bins must be > 0".to_string());
        }
        if !(self.x_min.is_finite() && self.x_max.is_finite() && self.x_min < self.x_max) {
            return Err(format!(
                "histogram range [{}, {}) is empty or not finite",
                self.x_min, self.x_max
            ));
        }
        Ok(())
    }
}

/// Reference and candidate value of one algorithm for one pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlgorithmComparison {
    pub reference_value: f64,
    pub candidate_value: f64,
}

impl AlgorithmComparison {
    /// `reference - candidate`
    pub fn diff(&self) -> f64 {
        self.reference_value - self.candidate_value
    }

    /// `|diff| / |candidate|`; `None` when the candidate value is zero
    pub fn relative_diff(&self) -> Option<f64> {
        if self.candidate_value == 0.0 {
            None
        } else {
            Some(self.diff().abs() / self.candidate_value.abs())
        }
    }
}

/// Largest |diff| per family for one pair
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FamilyMaxima {
    values: [Option<f64>; 3],
}

impl FamilyMaxima {
    fn slot(family: Family) -> usize {
        match family {
            Family::Higgs => 0,
            Family::Pseudoscalar => 1,
            Family::Tagger => 2,
        }
    }

    pub fn update(&mut self, family: Family, abs_diff: f64) {
        let slot = &mut self.values[Self::slot(family)];
        *slot = Some(slot.map_or(abs_diff, |m| nan_max(m, abs_diff)));
    }

    /// `None` when no algorithm of the family was evaluated
    pub fn get(&self, family: Family) -> Option<f64> {
        self.values[Self::slot(family)]
    }
}

/// All algorithm values of one matched pair
#[derive(Debug, Clone, PartialEq)]
pub struct PairEvaluation {
    pub reference: JetRecord,
    pub candidate: JetRecord,
    /// Aligned with the algorithm set order
    pub comparisons: Vec<AlgorithmComparison>,
    pub family_maxima: FamilyMaxima,
}

/// Reads algorithm values from both sides of a matched pair
pub struct PairEvaluator<'a> {
    set: &'a AlgorithmSet,
    reference: &'a dyn RecordStream,
    /// Candidate partition stream per algorithm
    partitions: Vec<&'a dyn RecordStream>,
}

impl<'a> PairEvaluator<'a> {
    /// `lookup` maps a partition name to its stream.
    pub fn new<F>(
        set: &'a AlgorithmSet,
        reference: &'a dyn RecordStream,
        lookup: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<&'a dyn RecordStream>,
    {
        let partitions = set
            .algorithms()
            .iter()
            .map(|a| {
                lookup(&a.partition)
                    .ok_or_else(|| JetDiffError::UnknownPartition(a.partition.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            set,
            reference,
            partitions,
        })
    }

    pub fn algorithm_set(&self) -> &AlgorithmSet {
        self.set
    }

    pub fn evaluate(&self, reference: &JetRecord, candidate: &JetRecord) -> Result<PairEvaluation> {
        // Each raw value is read once even when several algorithms derive from it
        let mut raw: Vec<Option<f64>> = vec![None; self.set.sources().len()];
        let mut comparisons = Vec::with_capacity(self.set.len());
        let mut family_maxima = FamilyMaxima::default();

        for (i, algorithm) in self.set.algorithms().iter().enumerate() {
            let partition = self.partitions[i];
            let source = self.set.source_index(i);
            let raw_value = match raw[source] {
                Some(v) => v,
                None => {
                    let v = read_f64(partition, candidate.position, &algorithm.raw_field)?;
                    raw[source] = Some(v);
                    v
                }
            };
            let candidate_mass = if algorithm.rule == ExtractionRule::TimesCandidateMass {
                read_f64(partition, candidate.position, &algorithm.candidate_mass_field)?
            } else {
                candidate.mass
            };
            let comparison = AlgorithmComparison {
                reference_value: read_f64(
                    self.reference,
                    reference.position,
                    &algorithm.reference_field,
                )?,
                candidate_value: algorithm.rule.apply(raw_value, reference.mass, candidate_mass),
            };
            if let Some(family) = algorithm.family {
                family_maxima.update(family, comparison.diff().abs());
            }
            comparisons.push(comparison);
        }

        Ok(PairEvaluation {
            reference: *reference,
            candidate: *candidate,
            comparisons,
            family_maxima,
        })
    }
}

#[derive(Debug, Clone, Default)]
struct RunningStats {
    matched: u64,
    max_abs_diff: Option<f64>,
    max_rel_diff: Option<f64>,
}

fn max_opt(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(nan_max(x, y)),
        (x, None) => x,
        (None, y) => y,
    }
}

/// Final per-algorithm summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmSummary {
    pub name: String,
    pub family: Option<Family>,
    pub matched: u64,
    pub max_abs_diff: Option<f64>,
    /// Unavailable when every candidate value was zero
    pub max_rel_diff: Option<f64>,
}

/// Finalized aggregation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffReport {
    pub summaries: Vec<AlgorithmSummary>,
    pub histograms: Vec<Histogram1D>,
}

/// Accumulates log-difference histograms and running maxima
#[derive(Debug, Clone)]
pub struct DiffAggregator {
    names: Vec<String>,
    families: Vec<Option<Family>>,
    histograms: Vec<Histogram1D>,
    stats: Vec<RunningStats>,
    pairs: u64,
}

impl DiffAggregator {
    pub fn new(set: &AlgorithmSet, binning: HistogramBinning) -> Self {
        let names: Vec<String> = set.algorithms().iter().map(|a| a.name.clone()).collect();
        let histograms = names
            .iter()
            .map(|name| {
                Histogram1D::new(
                    format!("{}_logDiff", name),
                    binning.n_bins,
                    binning.x_min,
                    binning.x_max,
                )
            })
            .collect();
        Self {
            families: set.algorithms().iter().map(|a| a.family).collect(),
            stats: vec![RunningStats::default(); names.len()],
            names,
            histograms,
            pairs: 0,
        }
    }

    /// Number of pairs recorded
    pub fn pairs(&self) -> u64 {
        self.pairs
    }

    pub fn histogram(&self, name: &str) -> Option<&Histogram1D> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.histograms[i])
    }

    /// Fill every algorithm for one evaluated pair
    pub fn record(&mut self, evaluation: &PairEvaluation) {
        debug_assert_eq!(evaluation.comparisons.len(), self.names.len());
        for (i, comparison) in evaluation.comparisons.iter().enumerate() {
            let diff = comparison.diff();
            self.histograms[i].fill(clipped_log_diff(diff));
            let stats = &mut self.stats[i];
            stats.matched += 1;
            stats.max_abs_diff = max_opt(stats.max_abs_diff, Some(diff.abs()));
            stats.max_rel_diff = max_opt(stats.max_rel_diff, comparison.relative_diff());
        }
        self.pairs += 1;
    }

    /// Fold a partial aggregator built over the same algorithm set
    pub fn merge(&mut self, other: &DiffAggregator) -> Result<()> {
        for (i, histogram) in self.histograms.iter_mut().enumerate() {
            histogram.merge(&other.histograms[i])?;
            let theirs = &other.stats[i];
            let ours = &mut self.stats[i];
            ours.matched += theirs.matched;
            ours.max_abs_diff = max_opt(ours.max_abs_diff, theirs.max_abs_diff);
            ours.max_rel_diff = max_opt(ours.max_rel_diff, theirs.max_rel_diff);
        }
        self.pairs += other.pairs;
        Ok(())
    }

    pub fn finalize(self) -> DiffReport {
        let summaries = self
            .names
            .into_iter()
            .zip(self.families)
            .zip(self.stats)
            .map(|((name, family), stats)| AlgorithmSummary {
                name,
                family,
                matched: stats.matched,
                max_abs_diff: stats.max_abs_diff,
                max_rel_diff: stats.max_rel_diff,
            })
            .collect();
        DiffReport {
            summaries,
            histograms: self.histograms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{AlgorithmCatalog, AlgorithmDescriptor};
    use crate::record::{Column, ColumnStream};

    #[test]
    fn test_clipping_bounds() {
        assert_eq!(clipped_log_diff(1e-12), LOG_DIFF_MIN);
        assert_eq!(clipped_log_diff(0.0), LOG_DIFF_MIN);
        assert_eq!(clipped_log_diff(200.0), LOG_DIFF_MAX);
        assert_eq!(clipped_log_diff(-200.0), LOG_DIFF_MAX);
        assert!(clipped_log_diff(1.0).abs() < 1e-9);
        assert!((clipped_log_diff(0.01) + 2.0).abs() < 1e-6);
        assert_eq!(clipped_log_diff(f64::NAN), LOG_DIFF_MAX);
        assert_eq!(clipped_log_diff(f64::INFINITY), LOG_DIFF_MAX);
        assert_eq!(clipped_log_diff(f64::NEG_INFINITY), LOG_DIFF_MAX);
    }

    #[test]
    fn test_nan_diff_is_kept_in_maxima() {
        let mut m = FamilyMaxima::default();
        m.update(Family::Higgs, 0.5);
        m.update(Family::Higgs, f64::NAN);
        m.update(Family::Higgs, 0.2);
        assert!(m.get(Family::Higgs).is_some_and(f64::is_nan));
        assert!(max_opt(Some(f64::NAN), Some(3.0)).is_some_and(f64::is_nan));
        assert_eq!(max_opt(None, Some(3.0)), Some(3.0));
    }

    #[test]
    fn test_relative_diff_unavailable_for_zero_candidate() {
        let c = AlgorithmComparison {
            reference_value: 0.5,
            candidate_value: 0.0,
        };
        assert_eq!(c.relative_diff(), None);
        let c = AlgorithmComparison {
            reference_value: 10.0,
            candidate_value: -8.0,
        };
        assert_eq!(c.relative_diff(), Some(0.25));
    }

    #[test]
    fn test_family_maxima() {
        let mut m = FamilyMaxima::default();
        assert_eq!(m.get(Family::Higgs), None);
        m.update(Family::Higgs, 0.5);
        m.update(Family::Higgs, 0.2);
        m.update(Family::Tagger, 0.0);
        assert_eq!(m.get(Family::Higgs), Some(0.5));
        assert_eq!(m.get(Family::Tagger), Some(0.0));
        assert_eq!(m.get(Family::Pseudoscalar), None);
    }

    fn one_pair_streams() -> (ColumnStream, ColumnStream) {
        let reference = ColumnStream::from_columns(
            "C",
            vec![
                ("FatJet_particleNet_massA_Hto4b_v4", Column::Float(vec![20.0])),
                ("FatJet_particleNet_massA_Hto4b_v3", Column::Float(vec![1.0])),
            ],
        )
        .unwrap();
        let candidate = ColumnStream::from_columns(
            "W",
            vec![
                ("output", Column::Float(vec![0.2])),
                ("fj_mass", Column::Float(vec![110.0])),
            ],
        )
        .unwrap();
        (reference, candidate)
    }

    fn jet(mass: f64) -> JetRecord {
        JetRecord {
            position: 0,
            event_id: 1,
            object_index: 0,
            eta: 0.0,
            phi: 0.0,
            mass,
            pt: None,
        }
    }

    #[test]
    fn test_mass_siblings_share_raw_value() {
        let catalog = AlgorithmCatalog::builtin();
        let set = AlgorithmSet::new(catalog.resolve(&["A4"], None).unwrap());
        let (reference, candidate) = one_pair_streams();
        let evaluator =
            PairEvaluator::new(&set, &reference, |_| Some(&candidate as &dyn RecordStream))
                .unwrap();
        let eval = evaluator.evaluate(&jet(100.0), &jet(110.0)).unwrap();

        // A4 = 0.2 * reference mass, A4x = 0.2 * candidate-partition mass
        assert_eq!(eval.comparisons.len(), 2);
        assert!((eval.comparisons[0].candidate_value - 20.0).abs() < 1e-12);
        assert!((eval.comparisons[1].candidate_value - 22.0).abs() < 1e-12);
        // Only A4 is in the pseudoscalar family
        assert!(eval.family_maxima.get(Family::Pseudoscalar).unwrap() < 1e-12);
    }

    #[test]
    fn test_missing_partition_is_config_error() {
        let catalog = AlgorithmCatalog::builtin();
        let set = AlgorithmSet::new(catalog.resolve(&["A3"], None).unwrap());
        let (reference, _) = one_pair_streams();
        let result = PairEvaluator::new(&set, &reference, |_| None);
        assert!(matches!(result, Err(JetDiffError::UnknownPartition(p)) if p == "A3"));
    }

    #[test]
    fn test_evaluation_error_leaves_aggregator_untouched() {
        let mut bad = AlgorithmDescriptor::new(
            "X",
            None,
            "FatJet_particleNet_massA_Hto4b_v3",
            "A3",
            "missing_field",
            ExtractionRule::Identity,
        );
        bad.family = Some(Family::Pseudoscalar);
        let set = AlgorithmSet::new(vec![bad]);
        let (reference, candidate) = one_pair_streams();
        let evaluator =
            PairEvaluator::new(&set, &reference, |_| Some(&candidate as &dyn RecordStream))
                .unwrap();
        let aggregator = DiffAggregator::new(&set, HistogramBinning::default());
        assert!(evaluator.evaluate(&jet(100.0), &jet(100.0)).is_err());
        assert_eq!(aggregator.pairs(), 0);
    }

    #[test]
    fn test_record_merge_finalize() {
        let catalog = AlgorithmCatalog::builtin();
        let set = AlgorithmSet::new(catalog.resolve(&["A3"], None).unwrap());
        let mut a = DiffAggregator::new(&set, HistogramBinning::default());
        let mut b = DiffAggregator::new(&set, HistogramBinning::default());
        let pair = |r: f64, c: f64| PairEvaluation {
            reference: jet(1.0),
            candidate: jet(1.0),
            comparisons: vec![AlgorithmComparison {
                reference_value: r,
                candidate_value: c,
            }],
            family_maxima: FamilyMaxima::default(),
        };
        a.record(&pair(10.0, 9.0));
        b.record(&pair(0.5, 0.0));
        b.record(&pair(2.0, 2.0));
        a.merge(&b).unwrap();
        assert_eq!(a.pairs(), 3);
        assert_eq!(a.histogram("A3").map(Histogram1D::entries), Some(3));
        assert!(a.histogram("A4").is_none());

        let report = a.finalize();
        let s = &report.summaries[0];
        assert_eq!(s.name, "A3");
        assert_eq!(s.matched, 3);
        assert_eq!(s.max_abs_diff, Some(1.0));
        assert!((s.max_rel_diff.unwrap() - 1.0 / 9.0).abs() < 1e-12);
        let h = &report.histograms[0];
        assert_eq!(h.name, "A3_logDiff");
        assert_eq!(h.entries(), 3);
        // diff 0 → clipped into the first bin, diff 1 → log10 ≈ 0 → bin 81
        assert_eq!(h.bin_content(1), 1.0);
        assert_eq!(h.bin_content(81), 1.0);
    }
}
