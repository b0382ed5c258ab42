//! Due Date Classifier
//!
//! Finds a "due <Month>[.] <Day>[,] <Year>" phrase in a posting label and
//! decides whether that date has passed.
//!
//! Unparseable text is never an error: it yields `None` and the posting
//! counts as still active.

use crate::types::{ClassifiedRecord, ListingRecord};
use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

static DUE_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)due\s+([a-z]+\.?)\s*(\d{1,2}),?\s*(\d{4})\b").expect("due date pattern is valid")
});

/// Map an English month name or abbreviation to 1..=12.
fn month_number(token: &str) -> Option<u32> {
    let token = token.trim_end_matches('.').to_lowercase();
    let month = match token.as_str() {
        "jan" | "january" => 1,
        "feb" | "february" => 2,
        "mar" | "march" => 3,
        "apr" | "april" => 4,
        "may" => 5,
        "jun" | "june" => 6,
        "jul" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dec" | "december" => 12,
        _ => return None,
    };
    Some(month)
}

/// Parse the first due-date phrase found in `text`.
///
/// Returns `None` when there is no phrase, the month token is unknown, or the
/// day does not exist in that month (e.g. `due Feb 30, 2024`).
pub fn parse_due_date(text: &str) -> Option<NaiveDate> {
    let caps = DUE_DATE_RE.captures(text)?;
    let month = month_number(caps.get(1)?.as_str())?;
    let day: u32 = caps.get(2)?.as_str().parse().ok()?;
    let year: i32 = caps.get(3)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// A date is expired only when it falls on a calendar day strictly before
/// `reference`. Same-day due dates are still active.
pub fn is_expired(date: NaiveDate, reference: NaiveDate) -> bool {
    date < reference
}

pub fn classify(record: ListingRecord, reference: NaiveDate) -> ClassifiedRecord {
    let due_date = parse_due_date(&record.label);
    let expired = due_date.is_some_and(|d| is_expired(d, reference));
    ClassifiedRecord {
        record,
        due_date,
        is_expired: expired,
    }
}

pub fn classify_all(records: Vec<ListingRecord>, reference: NaiveDate) -> Vec<ClassifiedRecord> {
    records.into_iter().map(|r| classify(r, reference)).collect()
}
