//! Cross-run event catalog with score-monotonic supersession.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::CanonicalEvent;

/// Fingerprint-keyed catalog of canonical events, owned across runs.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    events: HashMap<String, CanonicalEvent>,
}

/// What one run changed in the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogDelta {
    pub added: u64,
    pub superseded: u64,
    pub retained: u64,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the catalog from previously persisted events.
    pub fn from_events(events: Vec<CanonicalEvent>) -> Self {
        let events = events
            .into_iter()
            .map(|e| (e.fingerprint.clone(), e))
            .collect();
        Self { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, fingerprint: &str) -> Option<&CanonicalEvent> {
        self.events.get(fingerprint)
    }

    /// Fold one run's output into the catalog. A stored record is replaced
    /// only by a strictly more complete one with the same fingerprint; a
    /// later, less complete record never overwrites it.
    pub fn absorb(&mut self, incoming: Vec<CanonicalEvent>) -> CatalogDelta {
        let mut delta = CatalogDelta::default();

        for event in incoming {
            match self.events.get(&event.fingerprint) {
                None => {
                    delta.added += 1;
                    self.events.insert(event.fingerprint.clone(), event);
                }
                Some(existing) if event.completeness_score > existing.completeness_score => {
                    debug!(
                        fingerprint = %event.fingerprint,
                        old_score = existing.completeness_score,
                        new_score = event.completeness_score,
                        "superseding stored event"
                    );
                    delta.superseded += 1;
                    self.events.insert(event.fingerprint.clone(), event);
                }
                Some(_) => {
                    delta.retained += 1;
                }
            }
        }

        info!(
            added = delta.added,
            superseded = delta.superseded,
            retained = delta.retained,
            total = self.events.len(),
            "catalog updated"
        );
        delta
    }

    /// Events in a stable order (start date, then title) for diffable output.
    pub fn sorted_events(&self) -> Vec<CanonicalEvent> {
        let mut events: Vec<CanonicalEvent> = self.events.values().cloned().collect();
        events.sort_by(|a, b| {
            a.event
                .start_date
                .cmp(&b.event.start_date)
                .then_with(|| a.event.title.cmp(&b.event.title))
        });
        events
    }
}
