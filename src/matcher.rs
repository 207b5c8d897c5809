//! Cross-stream jet matching
//!
//! For a reference jet, scan the candidate positions sharing its event id in
//! index order and take the first one with the same object index and
//! compatible (eta, phi). The scan is linear in the number of candidate jets
//! per event, which is small (a handful of fat jets), so no spatial structure
//! is kept.

use crate::error::{JetDiffError, Result};
use crate::event_index::EventIndex;
use crate::record::{JetFields, JetRecord, RecordStream};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Angular tolerances for accepting a candidate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "fuzz", derive(arbitrary::Arbitrary))]
pub struct MatchTolerance {
    pub max_delta_eta: f64,
    pub max_delta_phi: f64,
}

impl Default for MatchTolerance {
    fn default() -> Self {
        Self {
            max_delta_eta: 0.1,
            max_delta_phi: 0.1,
        }
    }
}

/// Association between a reference and a candidate position
///
/// Only valid for the matching attempt that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchedPair {
    pub reference: usize,
    pub candidate: usize,
}

/// Result of matching one reference jet
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchOutcome {
    /// First candidate passing every cut
    Matched(JetRecord),
    /// The event id is not in the candidate index
    EventAbsent,
    /// The event is present but no candidate passed the cuts
    NoCandidate,
}

impl MatchOutcome {
    pub fn candidate(&self) -> Option<&JetRecord> {
        match self {
            MatchOutcome::Matched(jet) => Some(jet),
            _ => None,
        }
    }

    /// Position pair for a successful match
    pub fn pair(&self, reference: &JetRecord) -> Option<MatchedPair> {
        self.candidate().map(|c| MatchedPair {
            reference: reference.position,
            candidate: c.position,
        })
    }
}

/// |Δφ| test that also accepts the ±2π images of the candidate angle
pub fn phi_compatible(reference_phi: f64, candidate_phi: f64, max_delta: f64) -> bool {
    let delta = reference_phi - candidate_phi;
    delta.abs() <= max_delta || (delta - TAU).abs() <= max_delta || (delta + TAU).abs() <= max_delta
}

/// Matcher bound to an indexed candidate stream
pub struct JetMatcher<'a> {
    stream: &'a dyn RecordStream,
    fields: &'a JetFields,
    index: &'a EventIndex,
    tolerance: MatchTolerance,
}

impl<'a> JetMatcher<'a> {
    pub fn new(
        stream: &'a dyn RecordStream,
        fields: &'a JetFields,
        index: &'a EventIndex,
        tolerance: MatchTolerance,
    ) -> Self {
        Self {
            stream,
            fields,
            index,
            tolerance,
        }
    }

    pub fn tolerance(&self) -> MatchTolerance {
        self.tolerance
    }

    /// Find the candidate for `reference`.
    ///
    /// # Errors
    /// [`JetDiffError::IndexCorrupted`] when an indexed position carries a
    /// different event id than the one it is filed under. Callers must treat
    /// this as fatal.
    pub fn find(&self, reference: &JetRecord) -> Result<MatchOutcome> {
        let Some(positions) = self.index.get(reference.event_id) else {
            return Ok(MatchOutcome::EventAbsent);
        };

        for &position in positions {
            let candidate = self.fields.read(self.stream, position)?;
            if candidate.event_id != reference.event_id {
                return Err(JetDiffError::IndexCorrupted {
                    key: reference.event_id,
                    position,
                    found: candidate.event_id,
                });
            }
            if candidate.object_index != reference.object_index {
                continue;
            }
            // NaN eta compares false, so it never lands inside the window
            let eta_within = (reference.eta - candidate.eta).abs() <= self.tolerance.max_delta_eta;
            if !eta_within {
                continue;
            }
            if !phi_compatible(reference.phi, candidate.phi, self.tolerance.max_delta_phi) {
                continue;
            }
            return Ok(MatchOutcome::Matched(candidate));
        }

        Ok(MatchOutcome::NoCandidate)
    }
}
