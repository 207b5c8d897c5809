//! Fixed-range, fixed-bin-count weighted 1D histogram
//!
//! Bins use ROOT numbering: 0 is the underflow bin, `1..=n_bins` are the
//! in-range bins and `n_bins + 1` is the overflow bin. Bins are half-open,
//! `[low, high)`.

use crate::error::{JetDiffError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram1D {
    pub name: String,
    pub title: String,
    n_bins: usize,
    x_min: f64,
    x_max: f64,
    /// Sum of weights per bin, length `n_bins + 2`
    contents: Vec<f64>,
    /// Sum of squared weights per bin, length `n_bins + 2`
    sumw2: Vec<f64>,
    entries: u64,
}

impl Histogram1D {
    /// # Panics
    /// Panics if `n_bins == 0` or the range is empty or not finite.
    pub fn new(name: impl Into<String>, n_bins: usize, x_min: f64, x_max: f64) -> Self {
        assert!(n_bins > 0, "histogram needs at least one bin");
        assert!(
            x_min.is_finite() && x_max.is_finite() && x_min < x_max,
            "invalid histogram range [{}, {})",
            x_min,
            x_max
        );
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            n_bins,
            x_min,
            x_max,
            contents: vec![0.0; n_bins + 2],
            sumw2: vec![0.0; n_bins + 2],
            entries: 0,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    pub fn x_min(&self) -> f64 {
        self.x_min
    }

    pub fn x_max(&self) -> f64 {
        self.x_max
    }

    /// Number of fills, including under/overflow
    pub fn entries(&self) -> u64 {
        self.entries
    }

    pub fn bin_width(&self) -> f64 {
        (self.x_max - self.x_min) / self.n_bins as f64
    }

    /// Bin number holding `x`; NaN goes to the overflow bin
    pub fn find_bin(&self, x: f64) -> usize {
        if x < self.x_min {
            0
        } else if x >= self.x_max || x.is_nan() {
            self.n_bins + 1
        } else {
            let bin = ((x - self.x_min) / self.bin_width()) as usize + 1;
            // Rounding can push values just below x_max past the last bin
            bin.min(self.n_bins)
        }
    }

    pub fn fill(&mut self, x: f64) {
        self.fill_weighted(x, 1.0);
    }

    pub fn fill_weighted(&mut self, x: f64, weight: f64) {
        let bin = self.find_bin(x);
        self.contents[bin] += weight;
        self.sumw2[bin] += weight * weight;
        self.entries += 1;
    }

    /// Content of `bin` (ROOT numbering); out-of-range bins are empty
    pub fn bin_content(&self, bin: usize) -> f64 {
        self.contents.get(bin).copied().unwrap_or(0.0)
    }

    pub fn bin_error(&self, bin: usize) -> f64 {
        self.sumw2.get(bin).copied().unwrap_or(0.0).sqrt()
    }

    pub fn bin_low_edge(&self, bin: usize) -> f64 {
        self.x_min + (bin as f64 - 1.0) * self.bin_width()
    }

    pub fn bin_center(&self, bin: usize) -> f64 {
        self.bin_low_edge(bin) + 0.5 * self.bin_width()
    }

    /// In-range bin contents, `1..=n_bins`
    pub fn contents(&self) -> &[f64] {
        &self.contents[1..=self.n_bins]
    }

    pub fn underflow(&self) -> f64 {
        self.contents[0]
    }

    pub fn overflow(&self) -> f64 {
        self.contents[self.n_bins + 1]
    }

    /// Sum of bins `lo..=hi`, clamped to the under/overflow bins
    pub fn integral(&self, lo: usize, hi: usize) -> f64 {
        let hi = hi.min(self.n_bins + 1);
        if lo > hi {
            return 0.0;
        }
        self.contents[lo..=hi].iter().sum()
    }

    /// Sum of the in-range bins
    pub fn total(&self) -> f64 {
        self.integral(1, self.n_bins)
    }

    pub fn same_binning(&self, other: &Histogram1D) -> bool {
        self.n_bins == other.n_bins && self.x_min == other.x_min && self.x_max == other.x_max
    }

    /// Add `other` bin by bin
    pub fn merge(&mut self, other: &Histogram1D) -> Result<()> {
        if !self.same_binning(other) {
            return Err(JetDiffError::BinningMismatch {
                left: self.name.clone(),
                right: other.name.clone(),
            });
        }
        for (a, b) in self.contents.iter_mut().zip(&other.contents) {
            *a += b;
        }
        for (a, b) in self.sumw2.iter_mut().zip(&other.sumw2) {
            *a += b;
        }
        self.entries += other.entries;
        Ok(())
    }

    /// Empty copy with the same binning under a new name
    pub fn empty_like(&self, name: impl Into<String>) -> Self {
        Histogram1D::new(name, self.n_bins, self.x_min, self.x_max)
    }
}
