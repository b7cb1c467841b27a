//! Fuzzy-match deduplication: clusters scored events across sources and
//! merges each cluster into one canonical record.
//!
//! Similarity is two independent scoring functions (lexical title overlap,
//! date proximity) combined by a fixed weighted formula, so each half stays
//! testable in isolation from the clustering control flow.

use tracing::debug;

use crate::config::{DedupConfig, RecencyTiebreak};
use crate::domain::{normalize_for_matching, CandidateEvent, CanonicalEvent, ScoredEvent};
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::score::{CompletenessScorer, WeightedField};

/// Jaccard overlap of normalized title tokens. Zero when either side has
/// no tokens; identical normalized strings score 1.0.
pub fn lexical_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_for_matching(a);
    let b = normalize_for_matching(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let tokens_a: std::collections::HashSet<&str> = a.split_whitespace().collect();
    let tokens_b: std::collections::HashSet<&str> = b.split_whitespace().collect();
    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    intersection as f64 / union as f64
}

/// Date proximity: exact day scores highest, same week scores partial,
/// anything else (including a missing date on either side) scores zero.
pub fn date_proximity(a: &ScoredEvent, b: &ScoredEvent, same_week_days: i64) -> f64 {
    match (a.event.start_date, b.event.start_date) {
        (Some(da), Some(db)) => {
            let days = (da.date_naive() - db.date_naive()).num_days().abs();
            if days == 0 {
                1.0
            } else if days <= same_week_days {
                0.5
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// A set of scored events believed to describe the same real-world event.
#[derive(Debug, Clone)]
pub struct EventCluster {
    pub members: Vec<ScoredEvent>,
    /// Merged record recomputed after every membership change
    pub representative: ScoredEvent,
}

/// Per-run clustering state. Owns the open-cluster set exclusively for the
/// duration of one run; requires the complete batch before finalization.
pub struct Deduplicator<'a> {
    config: DedupConfig,
    scorer: &'a CompletenessScorer,
    clusters: Vec<EventCluster>,
}

impl<'a> Deduplicator<'a> {
    pub fn new(config: DedupConfig, scorer: &'a CompletenessScorer) -> Result<Self> {
        if !(0.0..=1.0).contains(&config.similarity_threshold) {
            return Err(PipelineError::Config(format!(
                "similarity_threshold must be in [0, 1], got {}",
                config.similarity_threshold
            )));
        }
        Ok(Self {
            config,
            scorer,
            clusters: Vec::new(),
        })
    }

    fn combined_similarity(&self, event: &ScoredEvent, representative: &ScoredEvent) -> f64 {
        let lexical = lexical_similarity(&event.event.title, &representative.event.title);
        let proximity = date_proximity(event, representative, self.config.same_week_days);
        self.config.title_weight * lexical + self.config.date_weight * proximity
    }

    fn is_match(&self, event: &ScoredEvent, representative: &ScoredEvent, combined: f64) -> bool {
        if combined <= self.config.similarity_threshold {
            return false;
        }
        // Dates further apart than a week describe different occurrences,
        // however similar the titles
        if let (Some(a), Some(b)) = (event.event.start_date, representative.event.start_date) {
            let days = (a.date_naive() - b.date_naive()).num_days().abs();
            if days > self.config.same_week_days {
                return false;
            }
        }
        true
    }

    /// Route one scored event into the best-matching open cluster, or open a
    /// new cluster when nothing clears the threshold. Exact score ties go to
    /// the first-seen cluster.
    pub fn observe(&mut self, event: ScoredEvent) {
        let mut best: Option<(usize, f64)> = None;

        for (index, cluster) in self.clusters.iter().enumerate() {
            let combined = self.combined_similarity(&event, &cluster.representative);
            if !self.is_match(&event, &cluster.representative, combined) {
                continue;
            }
            // Strict greater-than keeps the earliest cluster on ties
            if best.map_or(true, |(_, score)| combined > score) {
                best = Some((index, combined));
            }
        }

        match best {
            Some((index, combined)) => {
                debug!(
                    title = %event.event.title,
                    cluster = index,
                    similarity = combined,
                    "merged event into existing cluster"
                );
                let cluster = &mut self.clusters[index];
                cluster.members.push(event);
                let merged = merge_members(&cluster.members, self.config.recency_tiebreak);
                cluster.representative = self.scorer.score(merged);
            }
            None => {
                self.clusters.push(EventCluster {
                    representative: event.clone(),
                    members: vec![event],
                });
            }
        }
    }

    /// Collapse every cluster into one canonical event. Deterministic for a
    /// given batch and order.
    pub fn finalize(self) -> Vec<CanonicalEvent> {
        self.clusters
            .into_iter()
            .map(|cluster| {
                let mut contributing_sources: Vec<String> = cluster
                    .members
                    .iter()
                    .map(|m| m.event.source.source_id.clone())
                    .collect();
                contributing_sources.sort();
                contributing_sources.dedup();

                let representative = cluster.representative;
                CanonicalEvent {
                    fingerprint: representative.event.fingerprint(),
                    completeness_score: representative.completeness_score,
                    missing_fields: representative.missing_fields,
                    contributing_sources,
                    event: representative.event,
                }
            })
            .collect()
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }
}

fn first_non_empty(values: impl IntoIterator<Item = Option<String>>) -> Option<String> {
    values.into_iter().flatten().find(|v| !v.is_empty())
}

/// Merge cluster members into one candidate, field by field. A field present
/// on any member is never lost; when several members carry it, the tiebreak
/// decides which source wins. Values are never averaged or concatenated.
fn merge_members(members: &[ScoredEvent], tiebreak: RecencyTiebreak) -> CandidateEvent {
    // Priority order: the member consulted first wins contested fields
    let mut ordered: Vec<&ScoredEvent> = members.iter().collect();
    if tiebreak == RecencyTiebreak::PreferNewer {
        // Stable sort keeps insertion order for equal timestamps
        ordered.sort_by(|a, b| b.event.source.fetched_at.cmp(&a.event.source.fetched_at));
    }

    let primary = ordered[0];
    let mut merged = primary.event.clone();

    let pick = |field: WeightedField| {
        ordered
            .iter()
            .find(|m| field.is_present(&m.event))
            .map(|m| &m.event)
    };

    if let Some(event) = pick(WeightedField::Title) {
        merged.title = event.title.clone();
    }
    if let Some(event) = pick(WeightedField::StartDate) {
        merged.start_date = event.start_date;
    }
    if let Some(event) = pick(WeightedField::EventType) {
        merged.event_type = event.event_type;
    }
    if let Some(event) = pick(WeightedField::Description) {
        merged.description = event.description.clone();
    }
    if let Some(event) = pick(WeightedField::OrganizerName) {
        merged.organizer.name = event.organizer.name.clone();
    }

    merged.end_date = ordered.iter().find_map(|m| m.event.end_date);

    // Nested objects merge per sub-field, still preferring the highest
    // priority member that carries each value
    merged.location.venue =
        first_non_empty(ordered.iter().map(|m| m.event.location.venue.clone()));
    merged.location.address =
        first_non_empty(ordered.iter().map(|m| m.event.location.address.clone()));
    merged.location.city = first_non_empty(ordered.iter().map(|m| m.event.location.city.clone()));
    merged.location.country =
        first_non_empty(ordered.iter().map(|m| m.event.location.country.clone()));
    merged.location.online_url =
        first_non_empty(ordered.iter().map(|m| m.event.location.online_url.clone()));

    merged.organizer.url = first_non_empty(ordered.iter().map(|m| m.event.organizer.url.clone()));
    merged.organizer.email =
        first_non_empty(ordered.iter().map(|m| m.event.organizer.email.clone()));

    merged.registration.url =
        first_non_empty(ordered.iter().map(|m| m.event.registration.url.clone()));
    merged.registration.deadline = ordered.iter().find_map(|m| m.event.registration.deadline);
    merged.registration.fee =
        first_non_empty(ordered.iter().map(|m| m.event.registration.fee.clone()));

    // A stated format outranks an inferred default from a newer source
    if let Some(event) = ordered
        .iter()
        .map(|m| &m.event)
        .find(|e| e.format_resolution == crate::domain::FormatResolution::Stated)
    {
        merged.format = event.format;
        merged.format_resolution = event.format_resolution;
    } else {
        merged.format = primary.event.format;
        merged.format_resolution = primary.event.format_resolution;
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringWeights;
    use crate::domain::{
        EventFormat, EventType, FormatResolution, Location, Organizer, Registration,
        SourceContext, SourceType,
    };
    use chrono::{DateTime, TimeZone, Utc};

    fn scorer() -> CompletenessScorer {
        CompletenessScorer::new(ScoringWeights::default()).unwrap()
    }

    fn source(id: &str, fetched_at: DateTime<Utc>) -> SourceContext {
        SourceContext {
            source_id: id.to_string(),
            source_name: id.to_uppercase(),
            source_url: format!("https://{id}.example"),
            source_type: SourceType::Website,
            fetched_at,
        }
    }

    fn event(
        title: &str,
        day: Option<(i32, u32, u32)>,
        source_id: &str,
        fetched: (i32, u32, u32),
    ) -> CandidateEvent {
        CandidateEvent {
            title: title.to_string(),
            description: String::new(),
            event_type: EventType::Other,
            format: EventFormat::Online,
            format_resolution: FormatResolution::Inferred,
            start_date: day.map(|(y, m, d)| Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()),
            end_date: None,
            location: Location::default(),
            organizer: Organizer::default(),
            registration: Registration::default(),
            source: source(
                source_id,
                Utc.with_ymd_and_hms(fetched.0, fetched.1, fetched.2, 0, 0, 0).unwrap(),
            ),
            raw_text: String::new(),
        }
    }

    fn run(events: Vec<CandidateEvent>, config: DedupConfig) -> Vec<CanonicalEvent> {
        let scorer = scorer();
        let mut dedup = Deduplicator::new(config, &scorer).unwrap();
        for e in events {
            let scored = scorer.score(e);
            dedup.observe(scored);
        }
        dedup.finalize()
    }

    #[test]
    fn lexical_similarity_is_token_set_overlap() {
        assert_eq!(lexical_similarity("Annual Conference", "ANNUAL conference!"), 1.0);
        assert_eq!(lexical_similarity("Annual Conference", ""), 0.0);
        let partial = lexical_similarity("Annual Conference 2025", "Annual Workshop 2025");
        assert!(partial > 0.4 && partial < 0.6); // 2 of 4 tokens shared
    }

    #[test]
    fn same_week_events_from_different_sources_cluster_together() {
        let canonical = run(
            vec![
                event("Annual Conference 2025", Some((2025, 6, 1)), "org-a", (2025, 1, 1)),
                event("Annual Conference 2025", Some((2025, 6, 2)), "org-b", (2025, 1, 2)),
            ],
            DedupConfig::default(),
        );
        assert_eq!(canonical.len(), 1);
        assert_eq!(canonical[0].contributing_sources, vec!["org-a", "org-b"]);
    }

    #[test]
    fn distant_dates_do_not_cluster_despite_identical_titles() {
        let canonical = run(
            vec![
                event("Annual Conference", Some((2025, 6, 1)), "org-a", (2025, 1, 1)),
                event("Annual Conference", Some((2025, 9, 1)), "org-b", (2025, 1, 1)),
            ],
            DedupConfig::default(),
        );
        assert_eq!(canonical.len(), 2);
    }

    #[test]
    fn deduplication_is_idempotent_for_a_fixed_batch() {
        let batch = vec![
            event("Annual Conference 2025", Some((2025, 6, 1)), "org-a", (2025, 1, 1)),
            event("Annual Conference 2025", Some((2025, 6, 2)), "org-b", (2025, 1, 2)),
            event("Winter Lecture", Some((2025, 12, 5)), "org-c", (2025, 1, 3)),
        ];
        let first = run(batch.clone(), DedupConfig::default());
        let second = run(batch, DedupConfig::default());

        let render = |out: &[CanonicalEvent]| {
            out.iter()
                .map(|c| format!("{}:{}:{:?}", c.fingerprint, c.completeness_score, c.missing_fields))
                .collect::<Vec<_>>()
        };
        assert_eq!(render(&first), render(&second));
    }

    #[test]
    fn merge_never_loses_fields_and_score_is_monotonic() {
        let sparse = event("Annual Conference 2025", Some((2025, 6, 1)), "org-a", (2025, 1, 5));
        let mut rich = event("Annual Conference 2025", Some((2025, 6, 1)), "org-b", (2025, 1, 1));
        rich.description = "Plenaries, panels and clinical workshops over three days.".to_string();
        rich.location.city = Some("Vienna".to_string());
        rich.organizer.name = "The Society".to_string();
        rich.registration.url = Some("https://example.org/register".to_string());

        let rich_score = scorer().score(rich.clone()).completeness_score;
        assert_eq!(rich_score, 90);

        // Sparse arrives from the newer source; its absent fields must not
        // overwrite the rich member's present ones
        let canonical = run(vec![rich, sparse], DedupConfig::default());
        assert_eq!(canonical.len(), 1);
        assert!(canonical[0].completeness_score >= rich_score);
        assert_eq!(canonical[0].event.location.city.as_deref(), Some("Vienna"));
        assert_eq!(canonical[0].event.organizer.name, "The Society");
        assert_eq!(
            canonical[0].event.registration.url.as_deref(),
            Some("https://example.org/register")
        );
    }

    #[test]
    fn contested_fields_go_to_the_more_recent_source() {
        let mut older = event("Case Conference", Some((2025, 3, 1)), "org-a", (2025, 1, 1));
        older.description = "Older description with enough substance to count as present.".to_string();
        let mut newer = event("Case Conference", Some((2025, 3, 1)), "org-b", (2025, 2, 1));
        newer.description = "Newer description with enough substance to count as present.".to_string();

        let canonical = run(vec![older.clone(), newer.clone()], DedupConfig::default());
        assert!(canonical[0].event.description.starts_with("Newer"));

        let mut config = DedupConfig::default();
        config.recency_tiebreak = RecencyTiebreak::FirstSeen;
        let canonical = run(vec![older, newer], config);
        assert!(canonical[0].event.description.starts_with("Older"));
    }

    #[test]
    fn exact_similarity_ties_go_to_the_first_seen_cluster() {
        let scorer = scorer();
        let mut dedup = Deduplicator::new(DedupConfig::default(), &scorer).unwrap();

        // Two clusters with identical titles, too far apart in date to merge
        dedup.observe(scorer.score(event("Annual Gathering", Some((2025, 6, 1)), "org-a", (2025, 1, 1))));
        dedup.observe(scorer.score(event("Annual Gathering", Some((2025, 8, 1)), "org-b", (2025, 1, 1))));
        assert_eq!(dedup.cluster_count(), 2);

        // Undated event ties on lexical similarity alone; first cluster wins
        dedup.observe(scorer.score(event("Annual Gathering", None, "org-c", (2025, 1, 2))));
        assert_eq!(dedup.cluster_count(), 2);

        let canonical = dedup.finalize();
        assert!(canonical[0].contributing_sources.contains(&"org-c".to_string()));
        assert_eq!(canonical[1].contributing_sources, vec!["org-b"]);
    }

    #[test]
    fn stated_format_survives_merge_with_inferred_default() {
        let mut stated = event("Hybrid Symposium", Some((2025, 5, 1)), "org-a", (2025, 1, 1));
        stated.format = EventFormat::Hybrid;
        stated.format_resolution = FormatResolution::Stated;
        let inferred = event("Hybrid Symposium", Some((2025, 5, 1)), "org-b", (2025, 2, 1));

        let canonical = run(vec![stated, inferred], DedupConfig::default());
        assert_eq!(canonical[0].event.format, EventFormat::Hybrid);
        assert_eq!(canonical[0].event.format_resolution, FormatResolution::Stated);
    }
}
