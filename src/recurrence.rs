//! Occurrence calculation for recurrence patterns.
//!
//! Everything here is pure: the same pattern and range always yield the same
//! ascending, duplicate-free list of due dates.

use chrono::{Datelike, Days, NaiveDate};

use crate::error::PatternError;
use crate::models::{Frequency, RecurrencePattern};

const WEEKDAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// Computes every due date implied by `pattern` in `from..=to`.
///
/// The requested range is first narrowed to the pattern's own
/// `start_date`/`end_date`, so no date outside the rule's validity window is
/// ever returned. An inverted range, or one that does not overlap the
/// pattern's bounds, yields an empty list.
pub fn generate_occurrences(pattern: &RecurrencePattern, from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    let from = match pattern.start_date {
        Some(start) if start > from => start,
        _ => from,
    };
    let to = match pattern.end_date {
        Some(end) if end < to => end,
        _ => to,
    };
    if from > to {
        return Vec::new();
    }

    match &pattern.frequency {
        Frequency::Daily => days_between(from, to).collect(),
        Frequency::Weekly { days_of_week } => {
            // An empty weekday set is a misconfigured rule, not an error.
            if days_of_week.is_empty() {
                return Vec::new();
            }
            days_between(from, to)
                .filter(|d| days_of_week.contains(&weekday_index(*d)))
                .collect()
        }
        Frequency::Monthly { day_of_month } => monthly(*day_of_month, from, to),
    }
}

/// Day of week with 0 = Sunday .. 6 = Saturday.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// Short lowercase name for a weekday index, `"?"` when out of range.
pub fn weekday_name(day: u8) -> &'static str {
    WEEKDAY_NAMES.get(day as usize).copied().unwrap_or("?")
}

/// Parses a weekday given either as a number (0 = Sunday) or a name
/// ("mon", "Monday", ...).
pub fn parse_weekday(input: &str) -> Result<u8, PatternError> {
    let s = input.trim().to_lowercase();
    if let Ok(n) = s.parse::<u8>() {
        return if n <= 6 { Ok(n) } else { Err(PatternError::WeekdayOutOfRange(n)) };
    }
    WEEKDAY_NAMES
        .iter()
        .position(|name| s.len() >= 3 && s.starts_with(name))
        .map(|i| i as u8)
        .ok_or_else(|| PatternError::UnknownWeekday(input.to_string()))
}

/// Builds a pattern frequency from its CLI spelling.
///
/// `days` is only consulted for weekly rules and `day_of_month` only for
/// monthly ones (default 1).
pub fn parse_frequency(kind: &str, days: &[String], day_of_month: Option<u32>) -> Result<Frequency, PatternError> {
    match kind.to_lowercase().as_str() {
        "daily" => Ok(Frequency::Daily),
        "weekly" => {
            let days_of_week = days
                .iter()
                .flat_map(|d| d.split(','))
                .filter(|d| !d.trim().is_empty())
                .map(parse_weekday)
                .collect::<Result<_, _>>()?;
            Ok(Frequency::Weekly { days_of_week })
        }
        "monthly" => Ok(Frequency::Monthly {
            day_of_month: day_of_month.unwrap_or(1),
        }),
        other => Err(PatternError::UnknownFrequency(other.to_string())),
    }
}

/// Checks that a pattern is well formed enough to be stored as a new rule.
pub fn validate_pattern(pattern: &RecurrencePattern) -> Result<(), PatternError> {
    match &pattern.frequency {
        Frequency::Daily => {}
        Frequency::Weekly { days_of_week } => {
            if days_of_week.is_empty() {
                return Err(PatternError::NoWeekdays);
            }
            if let Some(bad) = days_of_week.iter().find(|d| **d > 6) {
                return Err(PatternError::WeekdayOutOfRange(*bad));
            }
        }
        Frequency::Monthly { day_of_month } => {
            if !(1..=31).contains(day_of_month) {
                return Err(PatternError::DayOfMonthOutOfRange(*day_of_month));
            }
        }
    }
    if let (Some(start), Some(end)) = (pattern.start_date, pattern.end_date) {
        if start > end {
            return Err(PatternError::InvertedBounds { start, end });
        }
    }
    Ok(())
}

/// Last calendar day of the given month.
pub fn last_day_of_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

fn days_between(from: NaiveDate, to: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    from.iter_days().take_while(move |d| *d <= to)
}

fn monthly(day_of_month: u32, from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let (mut year, mut month) = (from.year(), from.month());
    loop {
        let day = day_of_month.clamp(1, last_day_of_month(year, month));
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            if date > to {
                break;
            }
            if date >= from {
                out.push(date);
            }
        }
        if (year, month) >= (to.year(), to.month()) {
            break;
        }
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
    out
}

/// The calendar day after `date`, saturating at the end of chrono's range.
pub(crate) fn next_day(date: NaiveDate) -> NaiveDate {
    date.checked_add_days(Days::new(1)).unwrap_or(date)
}
