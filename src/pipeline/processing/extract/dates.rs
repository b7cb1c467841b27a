//! Date inference for loosely formatted event announcements.
//!
//! Three entry points, matching the trust order of the extraction stages:
//! machine-readable attribute values, a lenient scan of free text, and an
//! ordered regex pattern list as the last resort.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

const MONTHS: &str = "january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sep|sept|oct|nov|dec";

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap());

static SLASH_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{2,4})\b").unwrap());

// "January 15-17, 2024" - multi-day events resolve to the range start
static MONTH_DAY_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b({MONTHS})\.?\s+(\d{{1,2}})\s*-\s*\d{{1,2}},?\s+(\d{{4}})"
    ))
    .unwrap()
});

// "January 15, 2024" or "January 15" (year defaults to the current one)
static MONTH_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b({MONTHS})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?(?:,?\s+(\d{{4}}))?\b"
    ))
    .unwrap()
});

// "15 January 2024"
static DAY_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(\d{{1,2}})\s+({MONTHS})\.?\s+(\d{{4}})\b")).unwrap()
});

fn month_number(name: &str) -> Option<u32> {
    let key = name.to_lowercase();
    let month = match key.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn to_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0).unwrap().and_utc()
}

/// Parse a machine-readable date value, e.g. the `datetime` attribute of a
/// `<time>` element. Strict formats only; highest trust.
pub fn parse_machine(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(to_utc(date));
    }
    None
}

/// Lenient parser for free text: scans for the first recognizable date shape
/// anywhere in the input. A month-day without a year resolves to the current
/// year. Returns None when nothing date-like is present.
pub fn parse_flexible(text: &str) -> Option<DateTime<Utc>> {
    if let Some(caps) = ISO_DATE.captures(text) {
        let date = NaiveDate::from_ymd_opt(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        );
        if let Some(date) = date {
            return Some(to_utc(date));
        }
    }
    if let Some(caps) = MONTH_DAY_RANGE.captures(text) {
        let month = month_number(&caps[1])?;
        let day: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(to_utc(date));
        }
    }
    if let Some(caps) = MONTH_DAY.captures(text) {
        let month = month_number(&caps[1])?;
        let day: u32 = caps[2].parse().ok()?;
        let year: i32 = match caps.get(3) {
            Some(y) => y.as_str().parse().ok()?,
            None => Utc::now().year(),
        };
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(to_utc(date));
        }
    }
    if let Some(caps) = DAY_MONTH.captures(text) {
        let day: u32 = caps[1].parse().ok()?;
        let month = month_number(&caps[2])?;
        let year: i32 = caps[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(to_utc(date));
        }
    }
    if let Some(caps) = SLASH_DATE.captures(text) {
        return parse_slash_captures(&caps[1], &caps[2], &caps[3]);
    }
    None
}

fn parse_slash_captures(first: &str, second: &str, year: &str) -> Option<DateTime<Utc>> {
    let a: u32 = first.parse().ok()?;
    let b: u32 = second.parse().ok()?;
    let mut year: i32 = year.parse().ok()?;
    if year < 100 {
        year += 2000;
    }
    // Month/day order first; swap when that produces an impossible month
    NaiveDate::from_ymd_opt(year, a, b)
        .or_else(|| NaiveDate::from_ymd_opt(year, b, a))
        .map(to_utc)
}

/// Last-resort stage: an ordered list of regex date patterns applied to the
/// whole text. The first pattern to match and parse wins.
pub fn parse_first_pattern(text: &str) -> Option<DateTime<Utc>> {
    if let Some(caps) = SLASH_DATE.captures(text) {
        if let Some(dt) = parse_slash_captures(&caps[1], &caps[2], &caps[3]) {
            return Some(dt);
        }
    }
    if let Some(m) = ISO_DATE.find(text) {
        if let Some(dt) = parse_machine(m.as_str()) {
            return Some(dt);
        }
    }
    if let Some(caps) = MONTH_DAY.captures(text) {
        if caps.get(3).is_some() {
            if let Some(dt) = parse_flexible(caps.get(0).unwrap().as_str()) {
                return Some(dt);
            }
        }
    }
    if let Some(caps) = DAY_MONTH.captures(text) {
        if let Some(dt) = parse_flexible(caps.get(0).unwrap().as_str()) {
            return Some(dt);
        }
    }
    if let Some(caps) = MONTH_DAY_RANGE.captures(text) {
        if let Some(dt) = parse_flexible(caps.get(0).unwrap().as_str()) {
            return Some(dt);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn machine_parses_iso_date_and_rfc3339() {
        assert_eq!(parse_machine("2024-03-10"), Some(day(2024, 3, 10)));
        assert_eq!(
            parse_machine("2024-03-10T18:30:00Z"),
            Some(Utc.with_ymd_and_hms(2024, 3, 10, 18, 30, 0).unwrap())
        );
        assert_eq!(parse_machine("next tuesday"), None);
    }

    #[test]
    fn flexible_finds_month_name_dates_in_text() {
        assert_eq!(
            parse_flexible("Join us on January 15, 2024 at the institute"),
            Some(day(2024, 1, 15))
        );
        assert_eq!(
            parse_flexible("Deadline: 15 January 2024"),
            Some(day(2024, 1, 15))
        );
    }

    #[test]
    fn flexible_resolves_range_to_start_day() {
        assert_eq!(
            parse_flexible("Annual meeting January 15-17, 2024"),
            Some(day(2024, 1, 15))
        );
    }

    #[test]
    fn flexible_defaults_missing_year_to_current() {
        let parsed = parse_flexible("Seminar on March 10").unwrap();
        assert_eq!(parsed.month(), 3);
        assert_eq!(parsed.day(), 10);
        assert_eq!(parsed.year(), Utc::now().year());
    }

    #[test]
    fn flexible_rejects_undated_text() {
        assert_eq!(parse_flexible("sometime in spring"), None);
        assert_eq!(parse_flexible(""), None);
    }

    #[test]
    fn slash_dates_swap_when_month_is_impossible() {
        assert_eq!(parse_flexible("due 3/10/2024"), Some(day(2024, 3, 10)));
        assert_eq!(parse_flexible("due 25/3/2024"), Some(day(2024, 3, 25)));
    }

    #[test]
    fn pattern_stage_prefers_slash_over_month_name() {
        assert_eq!(
            parse_first_pattern("3/10/2024 also known as April 1, 2030"),
            Some(day(2024, 3, 10))
        );
    }

    #[test]
    fn pattern_stage_requires_explicit_year_for_month_names() {
        // "Month D" without a year is the lenient parser's territory; the
        // pattern list only accepts fully specified dates
        assert_eq!(parse_first_pattern("March 10"), None);
        assert_eq!(parse_first_pattern("March 10, 2024"), Some(day(2024, 3, 10)));
    }
}
