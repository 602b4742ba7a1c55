//! Calendar arithmetic for recurring occurrences.

use chrono::{Datelike, NaiveDate};

/// Number of days in `month` of `year`, leap years included.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = next_month(year, month);
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

/// The month after `(year, month)`; December rolls into January of the next year.
pub fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month >= 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

/// The anchor's occurrence in `(year, month)`.
///
/// The day-of-month always comes from `anchor`, clamped to the target month's
/// last day, so Jan 31 maps to Feb 28/29 and back to Mar 31.
pub fn occurrence_in(anchor: NaiveDate, year: i32, month: u32) -> NaiveDate {
    let day = anchor.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(anchor)
}
