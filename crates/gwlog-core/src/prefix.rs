//! Date-partitioned key prefixes.
//!
//! Gateway logs are delivered under `{year}/{month}/{day}/` with no zero
//! padding. A [`PrefixPlan`] yields one prefix per day of a [`DateRange`],
//! end date excluded.

use chrono::{Datelike, Duration, NaiveDate};
use gwlog_common::DateRange;

/// Storage prefix for one calendar day.
pub fn day_prefix(day: NaiveDate) -> String {
    format!("{}/{}/{}/", day.year(), day.month(), day.day())
}

/// Parse a prefix produced by [`day_prefix`] back into its date.
pub fn parse_day_prefix(prefix: &str) -> Option<NaiveDate> {
    let mut parts = prefix.trim_end_matches('/').splitn(3, '/');
    let year = parts.next()?.parse().ok()?;
    let month = parts.next()?.parse().ok()?;
    let day = parts.next()?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Lazy, finite, single-pass sequence of day prefixes.
#[derive(Debug, Clone)]
pub struct PrefixPlan {
    next: NaiveDate,
    remaining: u64,
}

impl PrefixPlan {
    pub fn new(range: &DateRange) -> Self {
        Self {
            next: range.start(),
            remaining: range.days(),
        }
    }
}

impl Iterator for PrefixPlan {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.remaining == 0 {
            return None;
        }
        let prefix = day_prefix(self.next);
        self.remaining -= 1;
        if self.remaining > 0 {
            self.next += Duration::days(1);
        }
        Some(prefix)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for PrefixPlan {}
