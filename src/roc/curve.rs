// Efficiency (ROC) curves from signal and background score histograms

use crate::error::{JetDiffError, Result};
use crate::histogram::Histogram1D;
use serde::{Deserialize, Serialize};

/// One working point: fraction of signal and background above a score cut
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyPoint {
    pub signal: f64,
    pub background: f64,
}

/// Named curve, points ordered by increasing tail length
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyCurve {
    pub name: String,
    pub title: String,
    pub signal_histogram: String,
    pub background_histogram: String,
    pub points: Vec<EfficiencyPoint>,
}

/// Weighted integral the efficiencies are normalised to: underflow plus
/// every in-range bin, so the longest tail is exactly 1.
fn efficiency_total(h: &Histogram1D) -> Result<f64> {
    let n = h.integral(0, h.n_bins());
    if n > 0.0 && n.is_finite() {
        Ok(n)
    } else {
        Err(JetDiffError::EmptyHistogram(h.name.clone()))
    }
}

/// Tail-efficiency pairs for tail lengths `k = 0..=n_bins`.
///
/// Point `k` integrates bins `n_bins - k ..= n_bins`, so the first point is
/// the top bin alone and the last one covers everything below the overflow.
///
/// # Errors
/// [`JetDiffError::BinningMismatch`] if the histograms differ in binning,
/// [`JetDiffError::EmptyHistogram`] if either has no weight to normalise by.
pub fn build_curve(signal: &Histogram1D, background: &Histogram1D) -> Result<Vec<EfficiencyPoint>> {
    if !signal.same_binning(background) {
        return Err(JetDiffError::BinningMismatch {
            left: signal.name.clone(),
            right: background.name.clone(),
        });
    }
    let n_s = efficiency_total(signal)?;
    let n_b = efficiency_total(background)?;
    let n_bins = signal.n_bins();

    Ok((0..=n_bins)
        .map(|k| EfficiencyPoint {
            signal: signal.integral(n_bins - k, n_bins) / n_s,
            background: background.integral(n_bins - k, n_bins) / n_b,
        })
        .collect())
}

/// Background efficiency at the first point reaching `signal_efficiency`
pub fn background_at(points: &[EfficiencyPoint], signal_efficiency: f64) -> Option<f64> {
    points
        .iter()
        .find(|p| p.signal >= signal_efficiency)
        .map(|p| p.background)
}
