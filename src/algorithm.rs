//! Scoring algorithms compared between the two streams
//!
//! Each algorithm is an explicit descriptor: reference-side field, the
//! candidate partition and raw field it reads, the rule deriving the
//! candidate value from that raw value, and its family tag. Algorithms that
//! share a raw value (mass-ratio regressions multiplied by either side's
//! mass) are siblings and are always resolved together.

use crate::error::{JetDiffError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Threshold family of an algorithm
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    /// Higgs-mass regressions
    Higgs,
    /// Pseudoscalar ('a') mass regressions
    Pseudoscalar,
    /// Classifier taggers
    Tagger,
}

impl Family {
    pub const ALL: [Family; 3] = [Family::Higgs, Family::Pseudoscalar, Family::Tagger];

    /// One-letter label used in reports
    pub fn label(self) -> &'static str {
        match self {
            Family::Higgs => "H",
            Family::Pseudoscalar => "A",
            Family::Tagger => "T",
        }
    }
}

/// How the candidate value is derived from its raw field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionRule {
    Identity,
    /// Undo a log-transformed regression target
    Exp,
    /// Ratio regression scaled by the reference jet mass
    TimesReferenceMass,
    /// Ratio regression scaled by the candidate jet mass
    TimesCandidateMass,
}

impl ExtractionRule {
    pub fn apply(self, raw: f64, reference_mass: f64, candidate_mass: f64) -> f64 {
        match self {
            ExtractionRule::Identity => raw,
            ExtractionRule::Exp => raw.exp(),
            ExtractionRule::TimesReferenceMass => raw * reference_mass,
            ExtractionRule::TimesCandidateMass => raw * candidate_mass,
        }
    }

    /// Rule of the sibling sharing the same raw value
    pub fn mass_sibling(self) -> Option<ExtractionRule> {
        match self {
            ExtractionRule::TimesReferenceMass => Some(ExtractionRule::TimesCandidateMass),
            ExtractionRule::TimesCandidateMass => Some(ExtractionRule::TimesReferenceMass),
            _ => None,
        }
    }
}

fn default_raw_field() -> String {
    "output".to_string()
}

fn default_candidate_mass_field() -> String {
    "fj_mass".to_string()
}

/// One comparable algorithm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmDescriptor {
    pub name: String,
    #[serde(default)]
    pub family: Option<Family>,
    /// Field read from the reference record
    pub reference_field: String,
    /// Candidate partition holding the raw value
    pub partition: String,
    #[serde(default = "default_raw_field")]
    pub raw_field: String,
    #[serde(default = "default_rule")]
    pub rule: ExtractionRule,
    /// Candidate-side mass, read from the same partition
    #[serde(default = "default_candidate_mass_field")]
    pub candidate_mass_field: String,
}

fn default_rule() -> ExtractionRule {
    ExtractionRule::Identity
}

impl AlgorithmDescriptor {
    pub fn new(
        name: &str,
        family: Option<Family>,
        reference_field: &str,
        partition: &str,
        raw_field: &str,
        rule: ExtractionRule,
    ) -> Self {
        Self {
            name: name.to_string(),
            family,
            reference_field: reference_field.to_string(),
            partition: partition.to_string(),
            raw_field: raw_field.to_string(),
            rule,
            candidate_mass_field: default_candidate_mass_field(),
        }
    }

    /// Whether both read the same raw value
    pub fn shares_raw_value(&self, other: &AlgorithmDescriptor) -> bool {
        self.partition == other.partition && self.raw_field == other.raw_field
    }

    /// Candidate fields this algorithm reads from its partition
    pub fn candidate_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.raw_field.as_str()];
        if self.rule == ExtractionRule::TimesCandidateMass {
            fields.push(self.candidate_mass_field.as_str());
        }
        fields
    }
}

/// Named algorithm selections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Higgs-mass regression variants
    Higgs,
    /// 'a'-mass regressions and taggers
    Pseudoscalar,
}

impl Preset {
    pub fn algorithm_names(self) -> &'static [&'static str] {
        match self {
            Preset::Higgs => &["H0", "H00", "H1", "H2", "H3", "H4", "H4x"],
            Preset::Pseudoscalar => &["A0", "A1", "A2", "A3", "A4", "A4x", "T1", "T2", "T3"],
        }
    }
}

use ExtractionRule::{Exp, Identity, TimesCandidateMass, TimesReferenceMass};

/// name, family, reference field, partition, raw field, rule
#[rustfmt::skip]
const BUILTIN: &[(&str, Option<Family>, &str, &str, &str, ExtractionRule)] = &[
    ("H0",  None,                       "FatJet_particleNet_massH_Hto4b_v0",  "H0", "output", Identity),
    ("H00", None,                       "FatJet_particleNet_massH_Hto4b_v00", "H0", "output", Identity),
    ("H1",  None,                       "FatJet_particleNet_massH_Hto4b_v1",  "H0", "output", Identity),
    ("H2",  Some(Family::Higgs),        "FatJet_particleNet_massH_Hto4b_v2",  "H2", "output", Identity),
    ("H3",  Some(Family::Higgs),        "FatJet_particleNet_massH_Hto4b_v3",  "H3", "output", Exp),
    ("H4",  Some(Family::Higgs),        "FatJet_particleNet_massH_Hto4b_v4",  "H4", "output", TimesReferenceMass),
    ("H4x", None,                       "FatJet_particleNet_massH_Hto4b_v4",  "H4", "output", TimesCandidateMass),
    ("A0",  Some(Family::Pseudoscalar), "FatJet_particleNet_massA_Hto4b_v0",  "A0", "output", Identity),
    ("A1",  Some(Family::Pseudoscalar), "FatJet_particleNet_massA_Hto4b_v1",  "A0", "output", Identity),
    ("A2",  Some(Family::Pseudoscalar), "FatJet_particleNet_massA_Hto4b_v2",  "A2", "output", Identity),
    ("A3",  Some(Family::Pseudoscalar), "FatJet_particleNet_massA_Hto4b_v3",  "A3", "output", Exp),
    ("A4",  Some(Family::Pseudoscalar), "FatJet_particleNet_massA_Hto4b_v4",  "A4", "output", TimesReferenceMass),
    ("A4x", None,                       "FatJet_particleNet_massA_Hto4b_v4",  "A4", "output", TimesCandidateMass),
    ("T1",  Some(Family::Tagger),       "FatJet_particleNetMD_Hto4b_Haa4b",            "T1", "probHaa4b", Identity),
    ("T2",  Some(Family::Tagger),       "FatJet_particleNetMD_Hto4b_binary_Haa4b",     "T2", "probHaa4b", Identity),
    ("T3",  Some(Family::Tagger),       "FatJet_particleNetMD_Hto4b_binaryLF_Haa4b",   "T3", "probHaa4b", Identity),
];

/// Table of known algorithms, keyed by name
#[derive(Debug, Clone, Default)]
pub struct AlgorithmCatalog {
    descriptors: BTreeMap<String, AlgorithmDescriptor>,
}

impl AlgorithmCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog preloaded with the ParticleNet H→aa→4b algorithms
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        for &(name, family, reference_field, partition, raw_field, rule) in BUILTIN {
            catalog.register(AlgorithmDescriptor::new(
                name,
                family,
                reference_field,
                partition,
                raw_field,
                rule,
            ));
        }
        catalog
    }

    /// Add or replace a descriptor
    pub fn register(&mut self, descriptor: AlgorithmDescriptor) {
        self.descriptors.insert(descriptor.name.clone(), descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&AlgorithmDescriptor> {
        self.descriptors.get(name)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Mass-product sibling of `name`, if any
    pub fn sibling_of(&self, name: &str) -> Option<&AlgorithmDescriptor> {
        let descriptor = self.get(name)?;
        let sibling_rule = descriptor.rule.mass_sibling()?;
        self.descriptors
            .values()
            .find(|d| d.rule == sibling_rule && d.shares_raw_value(descriptor))
    }

    /// Resolve requested names into descriptors.
    ///
    /// Names not matching `filter` are dropped; mass-product siblings are
    /// inserted right after the algorithm that pulls them in. Duplicates are
    /// removed, keeping the first occurrence.
    pub fn resolve<S: AsRef<str>>(
        &self,
        names: &[S],
        filter: Option<&Regex>,
    ) -> Result<Vec<AlgorithmDescriptor>> {
        let mut resolved: Vec<AlgorithmDescriptor> = Vec::new();
        for name in names {
            let name = name.as_ref();
            if filter.is_some_and(|re| !re.is_match(name)) {
                continue;
            }
            let descriptor = self
                .get(name)
                .ok_or_else(|| JetDiffError::UnknownAlgorithm(name.to_string()))?;
            if !resolved.iter().any(|d| d.name == descriptor.name) {
                resolved.push(descriptor.clone());
            }
            if let Some(sibling) = self.sibling_of(name) {
                if !resolved.iter().any(|d| d.name == sibling.name) {
                    tracing::debug!("{} pulls in sibling {}", name, sibling.name);
                    resolved.push(sibling.clone());
                }
            }
        }
        Ok(resolved)
    }
}

/// Distinct raw values read per matched pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSource {
    pub partition: String,
    pub raw_field: String,
}

/// Resolved algorithms plus the raw sources they derive from
#[derive(Debug, Clone)]
pub struct AlgorithmSet {
    algorithms: Vec<AlgorithmDescriptor>,
    sources: Vec<RawSource>,
    /// `source_of[i]` = index into `sources` for algorithm `i`
    source_of: Vec<usize>,
}

impl AlgorithmSet {
    pub fn new(algorithms: Vec<AlgorithmDescriptor>) -> Self {
        let mut sources: Vec<RawSource> = Vec::new();
        let mut source_of = Vec::with_capacity(algorithms.len());
        for algorithm in &algorithms {
            let idx = match sources
                .iter()
                .position(|s| s.partition == algorithm.partition && s.raw_field == algorithm.raw_field)
            {
                Some(idx) => idx,
                None => {
                    sources.push(RawSource {
                        partition: algorithm.partition.clone(),
                        raw_field: algorithm.raw_field.clone(),
                    });
                    sources.len() - 1
                }
            };
            source_of.push(idx);
        }
        Self {
            algorithms,
            sources,
            source_of,
        }
    }

    pub fn algorithms(&self) -> &[AlgorithmDescriptor] {
        &self.algorithms
    }

    pub fn sources(&self) -> &[RawSource] {
        &self.sources
    }

    pub fn source_index(&self, algorithm: usize) -> usize {
        self.source_of[algorithm]
    }

    pub fn len(&self) -> usize {
        self.algorithms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.algorithms.is_empty()
    }

    /// Partition names in first-use order
    pub fn partitions(&self) -> Vec<&str> {
        let mut partitions: Vec<&str> = Vec::new();
        for algorithm in &self.algorithms {
            if !partitions.contains(&algorithm.partition.as_str()) {
                partitions.push(&algorithm.partition);
            }
        }
        partitions
    }
}
