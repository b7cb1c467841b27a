//! Completeness scoring: a pure, deterministic function of which weighted
//! fields are present on a candidate event.

use crate::config::ScoringWeights;
use crate::domain::{CandidateEvent, EventType, ScoredEvent};
use crate::error::{PipelineError, Result};

/// The weighted fields, in the declaration order used for missing_fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightedField {
    Title,
    StartDate,
    EventType,
    Format,
    Description,
    Location,
    OrganizerName,
    RegistrationUrl,
}

impl WeightedField {
    pub const ALL: [WeightedField; 8] = [
        WeightedField::Title,
        WeightedField::StartDate,
        WeightedField::EventType,
        WeightedField::Format,
        WeightedField::Description,
        WeightedField::Location,
        WeightedField::OrganizerName,
        WeightedField::RegistrationUrl,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            WeightedField::Title => "title",
            WeightedField::StartDate => "start_date",
            WeightedField::EventType => "event_type",
            WeightedField::Format => "format",
            WeightedField::Description => "description",
            WeightedField::Location => "location",
            WeightedField::OrganizerName => "organizer.name",
            WeightedField::RegistrationUrl => "registration.url",
        }
    }

    /// Field-specific non-emptiness rule.
    pub fn is_present(&self, event: &CandidateEvent) -> bool {
        match self {
            WeightedField::Title => !event.title.trim().is_empty(),
            WeightedField::StartDate => event.start_date.is_some(),
            WeightedField::EventType => event.event_type != EventType::Other,
            // Format always resolves, stated or defaulted
            WeightedField::Format => true,
            WeightedField::Description => !event.description.trim().is_empty(),
            WeightedField::Location => {
                let loc = &event.location;
                loc.venue.as_deref().is_some_and(|v| !v.is_empty())
                    || loc.city.as_deref().is_some_and(|c| !c.is_empty())
                    || loc.online_url.as_deref().is_some_and(|u| !u.is_empty())
            }
            WeightedField::OrganizerName => !event.organizer.name.trim().is_empty(),
            WeightedField::RegistrationUrl => {
                event.registration.url.as_deref().is_some_and(|u| !u.is_empty())
            }
        }
    }
}

pub struct CompletenessScorer {
    weights: ScoringWeights,
}

impl CompletenessScorer {
    /// Weight table must sum to 100; anything else is a configuration error
    /// caught before any fragment is processed.
    pub fn new(weights: ScoringWeights) -> Result<Self> {
        if weights.sum() != 100 {
            return Err(PipelineError::Config(format!(
                "scoring weights must sum to 100, got {}",
                weights.sum()
            )));
        }
        Ok(Self { weights })
    }

    fn weight_of(&self, field: WeightedField) -> u32 {
        match field {
            WeightedField::Title => self.weights.title,
            WeightedField::StartDate => self.weights.start_date,
            WeightedField::EventType => self.weights.event_type,
            WeightedField::Format => self.weights.format,
            WeightedField::Description => self.weights.description,
            WeightedField::Location => self.weights.location,
            WeightedField::OrganizerName => self.weights.organizer_name,
            WeightedField::RegistrationUrl => self.weights.registration_url,
        }
    }

    /// Score a candidate. missing_fields preserves the weight table's
    /// declaration order so output stays diffable run to run.
    pub fn score(&self, event: CandidateEvent) -> ScoredEvent {
        let mut score = 0;
        let mut missing_fields = Vec::new();

        for field in WeightedField::ALL {
            if field.is_present(&event) {
                score += self.weight_of(field);
            } else {
                missing_fields.push(field.name().to_string());
            }
        }

        ScoredEvent {
            event,
            completeness_score: score,
            missing_fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        EventFormat, FormatResolution, Location, Organizer, Registration, SourceContext, SourceType,
    };
    use chrono::{TimeZone, Utc};

    fn bare_event(title: &str) -> CandidateEvent {
        CandidateEvent {
            title: title.to_string(),
            description: String::new(),
            event_type: EventType::Other,
            format: EventFormat::Online,
            format_resolution: FormatResolution::Inferred,
            start_date: None,
            end_date: None,
            location: Location::default(),
            organizer: Organizer::default(),
            registration: Registration::default(),
            source: SourceContext {
                source_id: "org-a".to_string(),
                source_name: "Org A".to_string(),
                source_url: "https://org-a.example".to_string(),
                source_type: SourceType::Website,
                fetched_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            },
            raw_text: String::new(),
        }
    }

    fn scorer() -> CompletenessScorer {
        CompletenessScorer::new(ScoringWeights::default()).unwrap()
    }

    #[test]
    fn title_and_date_with_default_format_scores_fifty() {
        let mut event = bare_event("Clinical Seminar");
        event.start_date = Some(Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap());

        let scored = scorer().score(event);
        assert_eq!(scored.completeness_score, 50);
        assert_eq!(
            scored.missing_fields,
            vec![
                "event_type",
                "description",
                "location",
                "organizer.name",
                "registration.url"
            ]
        );
    }

    #[test]
    fn empty_title_loses_its_weight() {
        let scored = scorer().score(bare_event("   "));
        assert_eq!(scored.completeness_score, 10); // format only
        assert_eq!(scored.missing_fields[0], "title");
    }

    #[test]
    fn fully_populated_event_scores_hundred() {
        let mut event = bare_event("Annual Congress");
        event.start_date = Some(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        event.event_type = EventType::Conference;
        event.description = "Three days of panels and clinical workshops.".to_string();
        event.location.city = Some("Vienna".to_string());
        event.organizer.name = "The Society".to_string();
        event.registration.url = Some("https://example.org/register".to_string());

        let scored = scorer().score(event);
        assert_eq!(scored.completeness_score, 100);
        assert!(scored.missing_fields.is_empty());
    }

    #[test]
    fn location_counts_via_online_url_alone() {
        let mut event = bare_event("Webinar on technique");
        event.location.online_url = Some("https://zoom.us/j/1".to_string());

        let scored = scorer().score(event);
        assert!(!scored.missing_fields.contains(&"location".to_string()));
    }

    #[test]
    fn missing_fields_follow_table_order_not_discovery_order() {
        let mut event = bare_event("");
        event.registration.url = None;
        event.organizer.name = String::new();

        let scored = scorer().score(event);
        let expected = vec![
            "title",
            "start_date",
            "event_type",
            "description",
            "location",
            "organizer.name",
            "registration.url",
        ];
        assert_eq!(scored.missing_fields, expected);
    }

    #[test]
    fn rejects_bad_weight_table() {
        let mut weights = ScoringWeights::default();
        weights.description = 25;
        assert!(CompletenessScorer::new(weights).is_err());
    }
}
