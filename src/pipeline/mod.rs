//! Run orchestration: assembler and scorer per fragment, then one
//! deduplication pass over the whole batch.

pub mod processing;

use std::collections::HashMap;

use serde::Serialize;
use tracing::{error, info};

use crate::config::Config;
use crate::domain::{CanonicalEvent, Fragment};
use crate::error::Result;
use processing::assemble;
use processing::dedup::Deduplicator;
use processing::score::CompletenessScorer;

/// Per-source extraction counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceStats {
    pub fragments_seen: u64,
    pub candidates_assembled: u64,
    pub candidates_skipped: u64,
}

/// Aggregated counters for one pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub fragments_seen: u64,
    pub candidates_assembled: u64,
    pub candidates_skipped: u64,
    pub extraction_anomalies: u64,
    pub clusters_formed: u64,
    pub canonical_events: u64,
    pub per_source: HashMap<String, SourceStats>,
}

/// In-memory result set handed to the catalog sink.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub canonical_events: Vec<CanonicalEvent>,
    pub stats: RunStats,
}

pub struct Pipeline {
    config: Config,
    scorer: CompletenessScorer,
}

impl Pipeline {
    /// Validates configuration before any fragment is touched; a bad weight
    /// table or threshold aborts here, not mid-batch.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let scorer = CompletenessScorer::new(config.scoring.clone())?;
        Ok(Self { config, scorer })
    }

    /// Process one batch of fragments into canonical events.
    ///
    /// Extraction and scoring are pure per-fragment functions; a corrupt
    /// fragment is logged and skipped, never aborting the batch.
    /// Deduplication runs once over the complete batch - cluster membership
    /// depends on every event seen in the run, so it cannot stream.
    pub fn run(&self, fragments: Vec<Fragment>) -> Result<RunOutput> {
        let mut stats = RunStats::default();
        let mut scored = Vec::new();

        for fragment in &fragments {
            stats.fragments_seen += 1;
            let per_source = stats
                .per_source
                .entry(fragment.source.source_id.clone())
                .or_default();
            per_source.fragments_seen += 1;

            match assemble::assemble(fragment) {
                Ok(Some(candidate)) => {
                    per_source.candidates_assembled += 1;
                    stats.candidates_assembled += 1;
                    scored.push(self.scorer.score(candidate));
                }
                Ok(None) => {
                    per_source.candidates_skipped += 1;
                    stats.candidates_skipped += 1;
                }
                Err(e) => {
                    error!(
                        source_id = %fragment.source.source_id,
                        source_url = %fragment.source.source_url,
                        error = %e,
                        "extraction anomaly, skipping fragment"
                    );
                    per_source.candidates_skipped += 1;
                    stats.candidates_skipped += 1;
                    stats.extraction_anomalies += 1;
                }
            }
        }

        // Synchronization barrier: the deduplicator needs the whole batch
        let mut deduplicator = Deduplicator::new(self.config.dedup.clone(), &self.scorer)?;
        for event in scored {
            deduplicator.observe(event);
        }
        stats.clusters_formed = deduplicator.cluster_count() as u64;

        let canonical_events = deduplicator.finalize();
        stats.canonical_events = canonical_events.len() as u64;

        info!(
            fragments = stats.fragments_seen,
            assembled = stats.candidates_assembled,
            skipped = stats.candidates_skipped,
            anomalies = stats.extraction_anomalies,
            clusters = stats.clusters_formed,
            "pipeline run complete"
        );

        Ok(RunOutput {
            canonical_events,
            stats,
        })
    }
}
