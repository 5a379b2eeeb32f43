use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

pub const WINDOW_DAYS: i64 = 7;

/// One day of a fixed dashboard window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayBucket {
    pub date: NaiveDate,
    pub label: String,
    pub count: u64,
}

/// The 7 calendar days ending on a given day, inclusive. All day boundaries
/// are UTC; a record buckets into the UTC date of its timestamp.
#[derive(Debug, Clone, Copy)]
pub struct DayWindow {
    last: NaiveDate,
}

impl DayWindow {
    pub fn ending(last: NaiveDate) -> Self {
        Self { last }
    }

    pub fn ending_today() -> Self {
        Self::ending(Utc::now().date_naive())
    }

    pub fn first(&self) -> NaiveDate {
        self.last - Duration::days(WINDOW_DAYS - 1)
    }

    /// Inclusive lower bound of the window as an instant.
    pub fn start(&self) -> DateTime<Utc> {
        day_start(self.first())
    }

    /// Exclusive upper bound of the window as an instant.
    pub fn end(&self) -> DateTime<Utc> {
        day_start(self.last + Duration::days(1))
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let first = self.first();
        (0..WINDOW_DAYS).map(move |offset| first + Duration::days(offset))
    }

    /// Merge per-day counts into the fixed skeleton: always exactly 7 entries
    /// in ascending date order, zero-filled where nothing matched.
    pub fn fill(&self, counts: &HashMap<NaiveDate, u64>) -> Vec<DayBucket> {
        self.days()
            .map(|date| DayBucket {
                date,
                label: date.format("%a").to_string(),
                count: counts.get(&date).copied().unwrap_or(0),
            })
            .collect()
    }
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}
