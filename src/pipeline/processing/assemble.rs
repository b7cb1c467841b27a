//! Composes field extraction results into a candidate event record.

use tracing::{debug, warn};

use crate::domain::{CandidateEvent, EventType, Fragment};
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::extract::{FragmentDocument, RAW_SNIPPET_MAX_LEN};

/// Runs every field extractor over one fragment and attaches provenance.
///
/// Returns `Ok(None)` when the fragment carries no usable signal: a title
/// that came back empty AND no extractable date. Partial data is still
/// emitted; missing-field accounting belongs to the scorer.
pub fn assemble(fragment: &Fragment) -> Result<Option<CandidateEvent>> {
    if fragment.html.trim().is_empty() {
        return Err(PipelineError::MalformedFragment(format!(
            "empty fragment from source '{}'",
            fragment.source.source_id
        )));
    }

    let document = FragmentDocument::parse(&fragment.html);

    let title = document.title();
    let start_date = document.date();

    if title.is_empty() && start_date.is_none() {
        debug!(
            source_id = %fragment.source.source_id,
            "skipping fragment with neither title nor date"
        );
        return Ok(None);
    }

    let (format, format_resolution) = document.format();
    let raw_text = document.flattened_text();
    let snippet = raw_text.chars().take(RAW_SNIPPET_MAX_LEN).collect();

    if title.is_empty() {
        warn!(
            source_id = %fragment.source.source_id,
            "assembled dated event without a title"
        );
    }

    Ok(Some(CandidateEvent {
        title,
        description: document.description(),
        event_type: EventType::Other,
        format,
        format_resolution,
        start_date,
        end_date: None,
        location: document.location(),
        organizer: Default::default(),
        registration: document.registration(),
        source: fragment.source.clone(),
        raw_text: snippet,
    }))
}
