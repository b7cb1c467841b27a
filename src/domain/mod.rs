use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Where a fragment came from: a scraped website listing or a newsletter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Website,
    Newsletter,
}

/// Provenance attached to every fragment and carried through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceContext {
    pub source_id: String,
    pub source_name: String,
    pub source_url: String,
    pub source_type: SourceType,
    pub fetched_at: DateTime<Utc>,
}

/// One markup/text block believed to describe a single event, prior to
/// extraction. Produced by collaborators, consumed once per run.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub html: String,
    pub source: SourceContext,
}

/// Delivery format of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventFormat {
    Online,
    InPerson,
    Hybrid,
}

/// Whether the format was stated in the fragment or defaulted by policy.
/// Unclassifiable fragments default to online; that default is flagged
/// here so downstream consumers can tell it apart from an explicit claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatResolution {
    Stated,
    Inferred,
}

/// Kind of event. Extraction leaves this at `Other`; it is only populated
/// when a richer source supplies it during merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Conference,
    Workshop,
    Lecture,
    Seminar,
    Webinar,
    Course,
    Other,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Location {
    pub venue: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub online_url: Option<String>,
}

impl Location {
    pub fn is_empty(&self) -> bool {
        self.venue.is_none()
            && self.address.is_none()
            && self.city.is_none()
            && self.country.is_none()
            && self.online_url.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Organizer {
    /// Empty string means the organizer is unknown
    pub name: String,
    pub url: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registration {
    pub url: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    /// Matched fee text, e.g. "$50" or "free"
    pub fee: Option<String>,
}

/// An assembled but unscored event record.
///
/// Invariants: `title` is never absent (empty string when unextractable);
/// dates, when present, are UTC instants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateEvent {
    pub title: String,
    pub description: String,
    pub event_type: EventType,
    pub format: EventFormat,
    pub format_resolution: FormatResolution,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub location: Location,
    pub organizer: Organizer,
    pub registration: Registration,
    pub source: SourceContext,
    /// Flattened fragment text retained for audit
    pub raw_text: String,
}

impl CandidateEvent {
    /// Title normalized for matching: case-folded, punctuation stripped,
    /// whitespace collapsed.
    pub fn normalized_title(&self) -> String {
        normalize_for_matching(&self.title)
    }

    /// Stable cross-run identifier derived from the normalized title and the
    /// day-truncated start date. The same real-world event keeps the same
    /// fingerprint across runs and sources.
    pub fn fingerprint(&self) -> String {
        let day = self
            .start_date
            .map(|d| d.date_naive().to_string())
            .unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(self.normalized_title().as_bytes());
        hasher.update(b"|");
        hasher.update(day.as_bytes());
        hex::encode(hasher.finalize())[..16].to_string()
    }
}

pub fn normalize_for_matching(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A candidate event plus its completeness assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredEvent {
    pub event: CandidateEvent,
    /// 0-100, sum of the weights of present fields
    pub completeness_score: u32,
    /// Weighted fields absent from the event, in weight-table order
    pub missing_fields: Vec<String>,
}

/// One merged, finalized record per cluster, owned by the catalog across
/// runs. Superseded (not deleted) when a later run produces a more complete
/// version with the same fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub fingerprint: String,
    pub event: CandidateEvent,
    pub completeness_score: u32,
    pub missing_fields: Vec<String>,
    /// Source ids that contributed members to the cluster, sorted
    pub contributing_sources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candidate(title: &str, day: Option<(i32, u32, u32)>) -> CandidateEvent {
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
            source: SourceContext {
                source_id: "src".to_string(),
                source_name: "Source".to_string(),
                source_url: "https://example.org".to_string(),
                source_type: SourceType::Website,
                fetched_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            },
            raw_text: String::new(),
        }
    }

    #[test]
    fn normalization_strips_punctuation_and_case() {
        assert_eq!(
            normalize_for_matching("  Annual   Conference: 2025!  "),
            "annual conference 2025"
        );
    }

    #[test]
    fn fingerprint_is_stable_across_title_punctuation() {
        let a = candidate("Annual Conference 2025", Some((2025, 6, 1)));
        let b = candidate("Annual  Conference, 2025", Some((2025, 6, 1)));
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);
    }

    #[test]
    fn fingerprint_differs_by_day() {
        let a = candidate("Annual Conference 2025", Some((2025, 6, 1)));
        let b = candidate("Annual Conference 2025", Some((2025, 6, 2)));
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_handles_missing_date() {
        let a = candidate("Open House", None);
        let b = candidate("Open House", None);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
