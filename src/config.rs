// Run configuration for `jetdiff compare` and `jetdiff roc`
//
// Both runs read a TOML file. Every scalar setting has a default; relative
// input paths are resolved against the directory holding the file.

use crate::algorithm::{AlgorithmCatalog, AlgorithmDescriptor, AlgorithmSet, Preset};
use crate::diff::HistogramBinning;
use crate::matcher::MatchTolerance;
use crate::outlier::Thresholds;
use crate::record::JetFields;
use crate::roc::RocPlan;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

fn default_max_records() -> usize {
    1000
}

fn default_progress_every() -> u64 {
    10
}

fn default_min_reference_mass() -> f64 {
    1.0
}

fn default_threads() -> usize {
    1
}

fn default_roc_progress_every() -> u64 {
    100_000
}

fn rebase(base: &Path, paths: &mut [PathBuf]) {
    for path in paths.iter_mut() {
        if path.is_relative() {
            *path = base.join(&*path);
        }
    }
}

fn read_config<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} config: {}", what, path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML {} config: {}", what, path.display()))
}

/// Reconstruction-side input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceInput {
    pub files: Vec<PathBuf>,
    #[serde(default = "JetFields::reference_default")]
    pub fields: JetFields,
    /// Flatten per-event array rows, writing the element position here
    #[serde(default)]
    pub flatten_index_field: Option<String>,
}

/// Prediction-side input, one file chain per partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateInput {
    pub partitions: BTreeMap<String, Vec<PathBuf>>,
    #[serde(default = "JetFields::candidate_default")]
    pub fields: JetFields,
}

/// Settings of a comparison run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareConfig {
    pub reference: ReferenceInput,
    pub candidate: CandidateInput,

    /// Named selection from the built-in catalog
    #[serde(default)]
    pub preset: Option<Preset>,
    /// Explicit algorithm names, after the preset ones
    #[serde(default)]
    pub algorithms: Vec<String>,
    /// Extra descriptors, registered on top of the built-in catalog
    #[serde(default, rename = "algorithm")]
    pub extra_algorithms: Vec<AlgorithmDescriptor>,
    /// Keep only algorithms whose name matches this regex
    #[serde(default)]
    pub select: Option<String>,

    /// Reference records to process; 0 means all
    #[serde(default = "default_max_records")]
    pub max_records: usize,
    #[serde(default = "default_progress_every")]
    pub progress_every: u64,
    #[serde(default)]
    pub verbosity: u8,
    #[serde(default)]
    pub thresholds: Thresholds,
    /// Reference jets lighter than this are not matched
    #[serde(default = "default_min_reference_mass")]
    pub min_reference_mass: f64,
    #[serde(default)]
    pub tolerance: MatchTolerance,
    #[serde(default)]
    pub binning: HistogramBinning,
    #[serde(default = "default_threads")]
    pub threads: usize,
}

impl CompareConfig {
    /// Load and validate a compare config file
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config: CompareConfig = read_config(path, "compare")?;
        if let Some(base) = path.parent() {
            config.rebase_paths(base);
        }
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid compare config {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Resolve relative input paths against `base`
    pub fn rebase_paths(&mut self, base: &Path) {
        rebase(base, &mut self.reference.files);
        for files in self.candidate.partitions.values_mut() {
            rebase(base, files);
        }
    }

    /// Processing cap as an option
    pub fn record_cap(&self) -> Option<usize> {
        (self.max_records > 0).then_some(self.max_records)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.reference.files.is_empty() {
            return Err("reference.files must list at least one file".to_string());
        }
        if self.candidate.partitions.is_empty() {
            return Err("candidate.partitions must name at least one partition".to_string());
        }
        for (name, files) in &self.candidate.partitions {
            if files.is_empty() {
                return Err(format!("candidate partition '{}' has no files", name));
            }
        }
        if self.preset.is_none() && self.algorithms.is_empty() && self.extra_algorithms.is_empty()
        {
            return Err("no algorithms requested (set preset, algorithms or [[algorithm]])".into());
        }
        if let Some(select) = &self.select {
            Regex::new(select).map_err(|e| format!("invalid select regex: {}", e))?;
        }
        if self.tolerance.max_delta_eta.is_nan()
            || self.tolerance.max_delta_eta < 0.0
            || self.tolerance.max_delta_phi.is_nan()
            || self.tolerance.max_delta_phi < 0.0
        {
            return Err(format!(
                "match tolerances must be non-negative, got eta {} phi {}",
                self.tolerance.max_delta_eta, self.tolerance.max_delta_phi
            ));
        }
        if self.verbosity > 3 {
            return Err(format!("verbosity must be 0..=3, got {}", self.verbosity));
        }
        if self.threads == 0 {
            return Err("threads must be >= 1".to_string());
        }
        self.thresholds.validate()?;
        self.binning.validate()
    }

    /// Algorithm names in request order: preset first, then explicit, then extras
    pub fn requested_algorithms(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .preset
            .map(|p| p.algorithm_names().iter().map(|s| s.to_string()).collect())
            .unwrap_or_default();
        names.extend(self.algorithms.iter().cloned());
        names.extend(self.extra_algorithms.iter().map(|d| d.name.clone()));
        names
    }

    /// Build the algorithm set, checking every name and partition
    pub fn algorithm_set(&self) -> Result<AlgorithmSet> {
        let mut catalog = AlgorithmCatalog::builtin();
        for descriptor in &self.extra_algorithms {
            catalog.register(descriptor.clone());
        }
        let filter = self
            .select
            .as_deref()
            .map(Regex::new)
            .transpose()
            .context("Invalid select regex")?;
        let resolved = catalog.resolve(&self.requested_algorithms(), filter.as_ref())?;
        if resolved.is_empty() {
            anyhow::bail!("No algorithm left after applying the selection");
        }
        for descriptor in &resolved {
            if !self.candidate.partitions.contains_key(&descriptor.partition) {
                anyhow::bail!(
                    "Algorithm {} reads partition '{}', which has no input files",
                    descriptor.name,
                    descriptor.partition
                );
            }
        }
        Ok(AlgorithmSet::new(resolved))
    }
}

/// One named, possibly chained, ROC input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocInput {
    pub name: String,
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub max_records: Option<usize>,
}

/// Settings of a ROC run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocConfig {
    #[serde(rename = "input")]
    pub inputs: Vec<RocInput>,
    #[serde(default = "default_roc_progress_every")]
    pub progress_every: u64,
    #[serde(flatten)]
    pub plan: RocPlan,
}

impl RocConfig {
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config: RocConfig = read_config(path, "roc")?;
        if let Some(base) = path.parent() {
            for input in &mut config.inputs {
                rebase(base, &mut input.files);
            }
        }
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid roc config {}: {}", path.display(), e))?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.inputs.is_empty() {
            return Err("at least one [[input]] is required".to_string());
        }
        let mut names = HashSet::new();
        for input in &self.inputs {
            if !names.insert(input.name.as_str()) {
                return Err(format!("duplicate input '{}'", input.name));
            }
            if input.files.is_empty() {
                return Err(format!("input '{}' has no files", input.name));
            }
        }
        for sample in &self.plan.samples {
            if !names.contains(sample.input.as_str()) {
                return Err(format!(
                    "sample '{}' draws from unknown input '{}'",
                    sample.name, sample.input
                ));
            }
        }
        self.plan.validate()
    }
}
