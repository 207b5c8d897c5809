//! jetdiff - cross-check jet tagger outputs between two independent producers
//!
//! This library matches jets of a reference stream to jets of a candidate
//! stream (same event id, same object index, compatible eta/phi), aggregates
//! per-algorithm differences into log-scale histograms, reports outlier pairs,
//! and builds signal/background efficiency curves from score histograms.

pub mod algorithm;
pub mod cli;
pub mod config;
pub mod diff;
pub mod error;
pub mod event_index;
pub mod export;
pub mod histogram;
pub mod ingest;
pub mod matcher;
pub mod outlier;
pub mod pipeline;
pub mod record;
pub mod roc;

pub use error::{JetDiffError, Result};
