// Efficiency (ROC) curves for tagger score variables
//
// Records from one or more inputs are preselected, sorted into named signal
// and background samples, split into train/test halves and histogrammed per
// score variable. Each (variable, signal, background, split) combination then
// yields one curve of tail efficiencies, read from the high-score end.

mod analysis;
mod curve;
mod selection;

pub use analysis::{FillSummary, RocAnalysis, RocPlan, RocReport};
pub use curve::{background_at, build_curve, EfficiencyCurve, EfficiencyPoint};
pub use selection::{
    passes_all, CmpOp, Cut, Sample, SampleKind, ScoreVariable, Split, SplitLabel,
};
