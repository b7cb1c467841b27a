use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Top-level pipeline configuration, loaded once at startup.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scoring: ScoringWeights,
    #[serde(default)]
    pub dedup: DedupConfig,
}

/// Weight table for completeness scoring. Field order here is the
/// declaration order reported in missing_fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub title: u32,
    pub start_date: u32,
    pub event_type: u32,
    pub format: u32,
    pub description: u32,
    pub location: u32,
    pub organizer_name: u32,
    pub registration_url: u32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            title: 20,
            start_date: 20,
            event_type: 10,
            format: 10,
            description: 10,
            location: 10,
            organizer_name: 10,
            registration_url: 10,
        }
    }
}

impl ScoringWeights {
    pub fn sum(&self) -> u32 {
        self.title
            + self.start_date
            + self.event_type
            + self.format
            + self.description
            + self.location
            + self.organizer_name
            + self.registration_url
    }
}

/// Which cluster member wins when two sources both carry a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecencyTiebreak {
    /// Prefer the value from the more recently fetched source
    PreferNewer,
    /// Keep the value already held by the cluster representative
    FirstSeen,
}

/// Numeric knobs for the deduplicator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Combined similarity must exceed this to count as a match
    pub similarity_threshold: f64,
    /// Weight of normalized-title similarity in the combined score
    pub title_weight: f64,
    /// Weight of date proximity in the combined score
    pub date_weight: f64,
    /// Dates this many days apart still count as the same week
    pub same_week_days: i64,
    pub recency_tiebreak: RecencyTiebreak,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.6,
            title_weight: 0.7,
            date_weight: 0.3,
            same_week_days: 7,
            recency_tiebreak: RecencyTiebreak::PreferNewer,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        config.validate()?;
        Ok(config)
    }

    /// Fail-fast validation, run before any fragment is processed.
    pub fn validate(&self) -> Result<()> {
        let sum = self.scoring.sum();
        if sum != 100 {
            return Err(PipelineError::Config(format!(
                "scoring weights must sum to 100, got {}",
                sum
            )));
        }
        let d = &self.dedup;
        if !(0.0..=1.0).contains(&d.similarity_threshold) {
            return Err(PipelineError::Config(format!(
                "similarity_threshold must be in [0, 1], got {}",
                d.similarity_threshold
            )));
        }
        if !(0.0..=1.0).contains(&d.title_weight) || !(0.0..=1.0).contains(&d.date_weight) {
            return Err(PipelineError::Config(
                "similarity component weights must be in [0, 1]".to_string(),
            ));
        }
        if d.same_week_days < 0 {
            return Err(PipelineError::Config(format!(
                "same_week_days must be non-negative, got {}",
                d.same_week_days
            )));
        }
        Ok(())
    }
}
