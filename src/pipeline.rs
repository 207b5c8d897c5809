//! The comparison run
//!
//! Load both streams, check them against the algorithm set, index both by
//! event id, then walk the capped reference prefix: mass cut, match, evaluate,
//! aggregate, report. Workers (when `threads > 1`) take contiguous slices of
//! the reference prefix and their partial results are merged in slice order,
//! so the output does not depend on the thread count.

use crate::algorithm::AlgorithmSet;
use crate::config::CompareConfig;
use crate::diff::{DiffAggregator, DiffReport, PairEvaluator};
use crate::error::{JetDiffError, Result};
use crate::event_index::EventIndex;
use crate::ingest::{load_chain, JsonlOptions};
use crate::matcher::{JetMatcher, MatchOutcome};
use crate::outlier::{BufferSink, DiagnosticSink, OutlierRecord, OutlierReporter};
use crate::record::{require_fields, RecordStream};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};

/// Reference stream plus the candidate partitions
pub struct CompareInputs {
    pub reference: Box<dyn RecordStream>,
    pub partitions: BTreeMap<String, Box<dyn RecordStream>>,
}

impl CompareInputs {
    /// Load the reference chain and the partitions `set` reads
    pub fn load(config: &CompareConfig, set: &AlgorithmSet) -> Result<Self> {
        let reference_options = JsonlOptions {
            flatten_index_field: config.reference.flatten_index_field.clone(),
        };
        let reference = load_chain("reference", &config.reference.files, &reference_options)?;

        let mut partitions: BTreeMap<String, Box<dyn RecordStream>> = BTreeMap::new();
        for name in set.partitions() {
            let files = config
                .candidate
                .partitions
                .get(name)
                .ok_or_else(|| JetDiffError::UnknownPartition(name.to_string()))?;
            let stream = load_chain(name, files, &JsonlOptions::default())?;
            partitions.insert(name.to_string(), Box::new(stream));
        }
        Ok(Self {
            reference: Box::new(reference),
            partitions,
        })
    }

    pub fn partition(&self, name: &str) -> Option<&dyn RecordStream> {
        self.partitions.get(name).map(|p| p.as_ref())
    }
}

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Distinct events in the capped reference prefix
    pub reference_events: usize,
    /// Of those, events also present in the candidate stream
    pub candidate_events: usize,
    pub scanned: u64,
    /// Reference jets below the mass cut
    pub light_jets: u64,
    pub event_absent: u64,
    pub no_candidate: u64,
    pub matched: u64,
    pub outliers: u64,
}

impl RunStats {
    fn absorb(&mut self, other: &RunStats) {
        self.scanned += other.scanned;
        self.light_jets += other.light_jets;
        self.event_absent += other.event_absent;
        self.no_candidate += other.no_candidate;
        self.matched += other.matched;
        self.outliers += other.outliers;
    }
}

/// Everything a comparison run produces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub stats: RunStats,
    #[serde(flatten)]
    pub diff: DiffReport,
    pub outliers: Vec<OutlierRecord>,
}

/// Work product of one slice of the reference prefix
struct Partial {
    aggregator: DiffAggregator,
    reporter: OutlierReporter,
    stats: RunStats,
    outliers: Vec<OutlierRecord>,
}

/// A prepared comparison: streams checked and indexed
pub struct Comparison<'a> {
    config: &'a CompareConfig,
    set: &'a AlgorithmSet,
    inputs: &'a CompareInputs,
    /// Partition the candidate jets are matched in
    primary: &'a dyn RecordStream,
    reference_index: EventIndex,
    candidate_index: EventIndex,
}

impl<'a> Comparison<'a> {
    /// Validate the inputs against `set` and build both event indices.
    ///
    /// Everything a configuration can get wrong (missing partitions or
    /// fields, misaligned partitions) is reported here, before any matching.
    pub fn prepare(
        config: &'a CompareConfig,
        set: &'a AlgorithmSet,
        inputs: &'a CompareInputs,
    ) -> Result<Self> {
        let partition_names = set.partitions();
        let primary_name = *partition_names
            .first()
            .ok_or_else(|| JetDiffError::UnknownAlgorithm("<none selected>".to_string()))?;
        let primary = inputs
            .partition(primary_name)
            .ok_or_else(|| JetDiffError::UnknownPartition(primary_name.to_string()))?;

        for &name in &partition_names {
            let stream = inputs
                .partition(name)
                .ok_or_else(|| JetDiffError::UnknownPartition(name.to_string()))?;
            if stream.len() != primary.len() {
                return Err(JetDiffError::UnalignedPartitions {
                    partition: name.to_string(),
                    expected: primary.len(),
                    found: stream.len(),
                });
            }
        }

        let reference = inputs.reference.as_ref();
        let reference_fields = &config.reference.fields;
        require_fields(reference, reference_fields.required())?;
        require_fields(
            reference,
            set.algorithms().iter().map(|a| a.reference_field.as_str()),
        )?;
        require_fields(primary, config.candidate.fields.required())?;
        for algorithm in set.algorithms() {
            if let Some(stream) = inputs.partition(&algorithm.partition) {
                require_fields(stream, algorithm.candidate_fields())?;
            }
        }

        let reference_index =
            EventIndex::build(reference, &reference_fields.event_id, config.record_cap())?;
        let mut candidate_index =
            EventIndex::build(primary, &config.candidate.fields.event_id, None)?;
        candidate_index.restrict_to(&reference_index);
        tracing::info!(
            "Reference index: {} events from {} records",
            reference_index.len(),
            reference_index.indexed_records()
        );
        tracing::info!(
            "Found matches for {} out of {} events",
            candidate_index.len(),
            reference_index.len()
        );

        Ok(Self {
            config,
            set,
            inputs,
            primary,
            reference_index,
            candidate_index,
        })
    }

    pub fn reference_index(&self) -> &EventIndex {
        &self.reference_index
    }

    pub fn candidate_index(&self) -> &EventIndex {
        &self.candidate_index
    }

    /// Reference records the run covers
    pub fn limit(&self) -> usize {
        let len = self.inputs.reference.len();
        self.config.record_cap().map_or(len, |cap| cap.min(len))
    }

    fn new_partial(&self) -> Partial {
        Partial {
            aggregator: DiffAggregator::new(self.set, self.config.binning),
            reporter: OutlierReporter::new(self.config.thresholds, self.config.verbosity),
            stats: RunStats::default(),
            outliers: Vec::new(),
        }
    }

    fn process_range(
        &self,
        range: Range<usize>,
        stop: &AtomicBool,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<Partial> {
        let config = self.config;
        let inputs = self.inputs;
        let reference = inputs.reference.as_ref();
        let matcher = JetMatcher::new(
            self.primary,
            &config.candidate.fields,
            &self.candidate_index,
            config.tolerance,
        );
        let evaluator = PairEvaluator::new(self.set, reference, |name| inputs.partition(name))?;
        let mut partial = self.new_partial();

        for position in range {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            let done = position as u64 + 1;
            if config.progress_every > 0 && done % config.progress_every == 0 {
                tracing::info!("Event #{}", done);
            }
            partial.stats.scanned += 1;

            let jet = config.reference.fields.read(reference, position)?;
            if jet.mass < config.min_reference_mass {
                partial.stats.light_jets += 1;
                continue;
            }
            partial.reporter.before_match(sink, &jet);

            match matcher.find(&jet)? {
                MatchOutcome::EventAbsent => partial.stats.event_absent += 1,
                MatchOutcome::NoCandidate => partial.stats.no_candidate += 1,
                outcome @ MatchOutcome::Matched(candidate) => {
                    if let Some(pair) = outcome.pair(&jet) {
                        tracing::trace!("Matched {} -> {}", pair.reference, pair.candidate);
                    }
                    let evaluation = evaluator.evaluate(&jet, &candidate)?;
                    partial.aggregator.record(&evaluation);
                    partial.stats.matched += 1;
                    if let Some(outlier) = partial.reporter.report_pair(sink, self.set, &evaluation)
                    {
                        partial.outliers.push(outlier);
                    }
                }
            }
        }
        partial.stats.outliers = partial.reporter.outliers();
        Ok(partial)
    }

    /// Run over the capped reference prefix.
    ///
    /// # Errors
    /// Any error here is fatal for the whole run, e.g.
    /// [`JetDiffError::IndexCorrupted`]; in a threaded run the first failing
    /// worker stops the others.
    pub fn run(&self, sink: &mut dyn DiagnosticSink) -> Result<RunReport> {
        let limit = self.limit();
        let threads = self.config.threads.max(1);
        let stop = AtomicBool::new(false);

        let mut total = if threads == 1 || limit < threads.saturating_mul(2) {
            self.process_range(0..limit, &stop, sink)?
        } else {
            self.run_threaded(limit, threads, &stop, sink)?
        };

        total.stats.reference_events = self.reference_index.len();
        total.stats.candidate_events = self.candidate_index.len();
        if total.reporter.sink_failures() > 0 {
            tracing::warn!(
                "{} diagnostic writes failed",
                total.reporter.sink_failures()
            );
        }
        tracing::info!(
            "Matched {} of {} reference jets ({} outliers)",
            total.stats.matched,
            total.stats.scanned,
            total.stats.outliers
        );

        Ok(RunReport {
            stats: total.stats,
            diff: total.aggregator.finalize(),
            outliers: total.outliers,
        })
    }

    fn run_threaded(
        &self,
        limit: usize,
        threads: usize,
        stop: &AtomicBool,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<Partial> {
        let chunk = limit.div_ceil(threads);
        let ranges: Vec<Range<usize>> = (0..threads)
            .map(|i| (i * chunk)..((i + 1) * chunk).min(limit))
            .filter(|r| !r.is_empty())
            .collect();
        tracing::debug!("Splitting {} records over {} workers", limit, ranges.len());

        let results = crossbeam::scope(|s| {
            let handles: Vec<_> = ranges
                .into_iter()
                .map(|range| {
                    s.spawn(move |_| {
                        let mut buffer = BufferSink::default();
                        let result = self.process_range(range, stop, &mut buffer);
                        if result.is_err() {
                            stop.store(true, Ordering::Relaxed);
                        }
                        (result, buffer)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect::<Vec<_>>()
        })
        .unwrap_or_else(|e| std::panic::resume_unwind(e));

        let mut total = self.new_partial();
        for (result, mut buffer) in results {
            let partial = result?;
            if let Err(e) = buffer.drain_into(sink) {
                tracing::warn!("Diagnostic output failed: {}", e);
            }
            total.aggregator.merge(&partial.aggregator)?;
            total.reporter.absorb(&partial.reporter);
            total.stats.absorb(&partial.stats);
            total.outliers.extend(partial.outliers);
        }
        Ok(total)
    }
}

/// Load, prepare and run in one go
pub fn run_compare(
    config: &CompareConfig,
    set: &AlgorithmSet,
    sink: &mut dyn DiagnosticSink,
) -> Result<RunReport> {
    let inputs = CompareInputs::load(config, set)?;
    Comparison::prepare(config, set, &inputs)?.run(sink)
}
