//! Multi-strategy field extraction from one markup/text fragment.
//!
//! Every extractor is an ordered list of heuristics; the first to produce a
//! value wins and later strategies are not attempted. Absence is a normal
//! outcome (`None` or empty string), never an error.

pub mod dates;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::domain::{EventFormat, FormatResolution, Location, Registration};

const TITLE_MIN_LEN: usize = 5;
const TITLE_MAX_LEN: usize = 500;
const TITLE_FALLBACK_MAX_LEN: usize = 200;
const DESCRIPTION_MIN_LEN: usize = 50;
const DESCRIPTION_MAX_LEN: usize = 2000;
pub const RAW_SNIPPET_MAX_LEN: usize = 500;

static TITLE_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["h1", "h2", "h3", ".event-title", ".title", "[class*=\"title\"]", "a"]
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});

static DESCRIPTION_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [".description", ".event-description", ".summary", "p", ".content"]
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});

static DATE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".date, .event-date, time[datetime], [class*=\"date\"]").unwrap());

static LOCATION_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".location, .venue, .address, [class*=\"location\"]").unwrap());

static MEETING_LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a[href*=\"zoom\"], a[href*=\"meet.google\"], a[href*=\"teams\"]").unwrap()
});

static REGISTRATION_LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        "a[href*=\"register\"], a[href*=\"registration\"], a[href*=\"signup\"], a[href*=\"sign-up\"]",
    )
    .unwrap()
});

// Ordered: first pattern to match anywhere in the text wins
static FEE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\$\d+(?:\.\d{2})?",
        r"€\d+(?:\.\d{2})?",
        r"£\d+(?:\.\d{2})?",
        r"(?i)\bfree\b",
        r"(?i)no charge",
        r"(?i)complimentary",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

// Hybrid checked first: hybrid announcements usually also contain "online"
// or "in-person" substrings
const HYBRID_KEYWORDS: [&str; 3] = ["hybrid", "both online and in-person", "in-person and online"];
const ONLINE_KEYWORDS: [&str; 7] =
    ["online", "virtual", "webinar", "zoom", "via zoom", "remote", "web-based"];
const IN_PERSON_KEYWORDS: [&str; 6] =
    ["in-person", "in person", "venue", "location:", "address:", "on-site"];

fn element_text(element: ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

/// One fragment parsed for extraction. Parsing is done once; the individual
/// field extractors all read from the same document.
pub struct FragmentDocument {
    document: Html,
}

impl FragmentDocument {
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_fragment(html),
        }
    }

    fn root(&self) -> ElementRef {
        self.document.root_element()
    }

    /// Flattened, whitespace-collapsed text of the whole fragment.
    pub fn flattened_text(&self) -> String {
        element_text(self.root())
    }

    /// Extract the event title. Never None: falls back to the leading text
    /// of the fragment, and to the empty string for a textless fragment.
    pub fn title(&self) -> String {
        for selector in TITLE_SELECTORS.iter() {
            if let Some(element) = self.root().select(selector).next() {
                let text = element_text(element);
                if text.chars().count() > TITLE_MIN_LEN {
                    return truncate(&text, TITLE_MAX_LEN);
                }
            }
        }
        truncate(&self.flattened_text(), TITLE_FALLBACK_MAX_LEN)
    }

    /// Extract the event start date. Stages, in trust order: machine-readable
    /// `datetime` attribute on a date-labeled element, lenient parse of that
    /// element's text, lenient parse of the whole fragment, ordered regex
    /// patterns over the whole fragment. First success wins.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        let mut labeled_text = String::new();
        if let Some(element) = self.root().select(&DATE_SELECTOR).next() {
            if let Some(value) = element.value().attr("datetime") {
                if let Some(parsed) = dates::parse_machine(value) {
                    return Some(parsed);
                }
            }
            labeled_text = element_text(element);
        }
        if !labeled_text.is_empty() {
            if let Some(parsed) = dates::parse_flexible(&labeled_text) {
                return Some(parsed);
            }
        }
        let full_text = self.flattened_text();
        if let Some(parsed) = dates::parse_flexible(&full_text) {
            return Some(parsed);
        }
        dates::parse_first_pattern(&full_text)
    }

    /// Classify the delivery format. Keyword matches are explicit statements;
    /// anything else is inferred: in-person when a location-like element
    /// exists, otherwise the online default (deliberate policy for
    /// unclassifiable fragments, kept flagged as inferred).
    pub fn format(&self) -> (EventFormat, FormatResolution) {
        let text = self.flattened_text().to_lowercase();

        if HYBRID_KEYWORDS.iter().any(|kw| text.contains(kw)) {
            return (EventFormat::Hybrid, FormatResolution::Stated);
        }
        if ONLINE_KEYWORDS.iter().any(|kw| text.contains(kw)) {
            return (EventFormat::Online, FormatResolution::Stated);
        }
        if IN_PERSON_KEYWORDS.iter().any(|kw| text.contains(kw)) {
            return (EventFormat::InPerson, FormatResolution::Stated);
        }

        if self.root().select(&LOCATION_SELECTOR).next().is_some() {
            (EventFormat::InPerson, FormatResolution::Inferred)
        } else {
            (EventFormat::Online, FormatResolution::Inferred)
        }
    }

    /// Extract location details. The venue is the text of a location-labeled
    /// element; city and country are assigned from a comma split only when at
    /// least two segments exist. A conferencing link is recorded as the
    /// online URL independently of any physical venue (hybrid case).
    pub fn location(&self) -> Location {
        let mut location = Location::default();

        if let Some(element) = self.root().select(&LOCATION_SELECTOR).next() {
            let text = element_text(element);
            if !text.is_empty() {
                let parts: Vec<&str> = text.split(',').map(str::trim).collect();
                if parts.len() >= 2 {
                    location.city = Some(parts[0].to_string());
                    location.country = Some(parts[parts.len() - 1].to_string());
                }
                location.venue = Some(text);
            }
        }

        if let Some(link) = self.root().select(&MEETING_LINK_SELECTOR).next() {
            if let Some(href) = link.value().attr("href") {
                location.online_url = Some(href.to_string());
            }
        }

        location
    }

    /// Extract registration link and fee text.
    pub fn registration(&self) -> Registration {
        let mut registration = Registration::default();

        if let Some(link) = self.root().select(&REGISTRATION_LINK_SELECTOR).next() {
            if let Some(href) = link.value().attr("href") {
                registration.url = Some(href.to_string());
            }
        }

        let text = self.flattened_text();
        for pattern in FEE_PATTERNS.iter() {
            if let Some(m) = pattern.find(&text) {
                registration.fee = Some(m.as_str().to_string());
                break;
            }
        }

        registration
    }

    /// Extract a description, rejecting short or boilerplate snippets.
    /// Empty string when nothing substantive is found.
    pub fn description(&self) -> String {
        for selector in DESCRIPTION_SELECTORS.iter() {
            if let Some(element) = self.root().select(selector).next() {
                let text = element_text(element);
                if text.chars().count() > DESCRIPTION_MIN_LEN {
                    return truncate(&text, DESCRIPTION_MAX_LEN);
                }
            }
        }
        String::new()
    }
}
