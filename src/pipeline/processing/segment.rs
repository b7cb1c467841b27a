//! Newsletter segmentation: splits one email body into per-event fragments.
//!
//! Newsletters have no fixed DOM shape, so segmentation is a prioritized
//! strategy list: explicitly event-marked blocks first, then generic
//! list-item/table-row/div blocks. Every candidate passes a cheap
//! date-indicator scan before it is worth the assembler's time.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::info;

use crate::domain::{Fragment, SourceContext};

static EVENT_BLOCK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".event, [class*=\"event\"], .calendar-item").unwrap());

static LIST_ITEM_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("li").unwrap());
static TABLE_ROW_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
static DIV_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("div").unwrap());

// Cheap scan for anything date-like: slash/ISO numeric shapes, month names
// and abbreviations, weekday names and abbreviations
static DATE_INDICATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\d{1,2}/\d{1,2}/\d{2,4}|\d{4}-\d{2}-\d{2}|January|February|March|April|May|June|July|August|September|October|November|December|\b(?:Jan|Feb|Mar|Apr|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\b|Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday|\b(?:Mon|Tue|Wed|Thu|Fri|Sat|Sun)\b",
    )
    .unwrap()
});

static PLAIN_TEXT_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},?\s+\d{4}",
    )
    .unwrap()
});

const NAV_KEYWORDS: [&str; 4] =
    ["unsubscribe", "privacy policy", "terms of service", "copyright"];

const MIN_BLOCK_TEXT_LEN: usize = 20;
const MIN_PLAIN_BLOCK_LEN: usize = 30;
const DIV_TEXT_RANGE: (usize, usize) = (50, 1000);

fn block_text(element: ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// A block is worth extracting when it mentions a date, has substance, and
/// is not navigation/footer boilerplate.
fn is_likely_event(text: &str) -> bool {
    if !DATE_INDICATOR.is_match(text) {
        return false;
    }
    if text.chars().count() < MIN_BLOCK_TEXT_LEN {
        return false;
    }
    let lowered = text.to_lowercase();
    !NAV_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}

/// Split an HTML newsletter body into candidate event fragments.
pub fn segment_html(body: &str, source: &SourceContext) -> Vec<Fragment> {
    let document = Html::parse_document(body);

    // Strategy 1: blocks explicitly marked as events
    let mut sections: Vec<ElementRef> = document.select(&EVENT_BLOCK_SELECTOR).collect();

    // Strategy 2: generic blocks that mention a date
    if sections.is_empty() {
        for li in document.select(&LIST_ITEM_SELECTOR) {
            if DATE_INDICATOR.is_match(&block_text(li)) {
                sections.push(li);
            }
        }
        for tr in document.select(&TABLE_ROW_SELECTOR) {
            if DATE_INDICATOR.is_match(&block_text(tr)) {
                sections.push(tr);
            }
        }
        for div in document.select(&DIV_SELECTOR) {
            let text = block_text(div);
            let len = text.chars().count();
            if DATE_INDICATOR.is_match(&text) && len > DIV_TEXT_RANGE.0 && len < DIV_TEXT_RANGE.1 {
                sections.push(div);
            }
        }
    }

    let fragments: Vec<Fragment> = sections
        .into_iter()
        .filter(|section| is_likely_event(&block_text(*section)))
        .map(|section| Fragment {
            html: section.html(),
            source: source.clone(),
        })
        .collect();

    info!(
        source_id = %source.source_id,
        count = fragments.len(),
        "segmented newsletter body"
    );
    fragments
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Split a plain-text newsletter into fragments, using "Month D, YYYY"
/// matches as block separators. The first non-date line of each block
/// becomes the title.
pub fn segment_plain_text(text: &str, source: &SourceContext) -> Vec<Fragment> {
    let matches: Vec<_> = PLAIN_TEXT_DATE.find_iter(text).collect();
    let mut fragments = Vec::new();

    for (i, m) in matches.iter().enumerate() {
        let start = m.start();
        let end = matches.get(i + 1).map(|n| n.start()).unwrap_or(text.len());
        let block = text[start..end].trim();

        if block.chars().count() < MIN_PLAIN_BLOCK_LEN {
            continue;
        }

        let title = block
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty() && !PLAIN_TEXT_DATE.is_match(line))
            .map(|line| line.chars().take(200).collect::<String>());

        if let Some(title) = title {
            fragments.push(Fragment {
                html: format!(
                    "<div><h2>{}</h2><span class=\"date\">{}</span><p>{}</p></div>",
                    escape_html(&title),
                    escape_html(m.as_str()),
                    escape_html(block)
                ),
                source: source.clone(),
            });
        }
    }

    info!(
        source_id = %source.source_id,
        count = fragments.len(),
        "segmented plain-text newsletter"
    );
    fragments
}
