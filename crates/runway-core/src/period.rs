//! Calendar month value type
//!
//! Every month-scoped operation in the engine takes a `Period` instead of a
//! loose (month, year) pair. A `Period` is always valid, orders
//! chronologically and knows how to clamp a day-of-month to its own length.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A calendar month, e.g. `2024-02`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    /// Create a period, rejecting months outside 1..=12
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::Validation(format!(
                "month must be between 1 and 12, got {}",
                month
            )));
        }
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(Error::Validation(format!("year {} is out of range", year)));
        }
        Ok(Self { year, month })
    }

    /// The period containing `date`
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        // Constructor guarantees a representable first day
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.first_day()
            .checked_add_months(Months::new(1))
            .and_then(|d| d.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    /// Number of days in the month
    pub fn days(&self) -> u32 {
        self.last_day().day()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// The date for `day` in this month, clamped to the month's last day
    /// (day 31 in February lands on the 28th or 29th)
    pub fn clamp_day(&self, day: u32) -> NaiveDate {
        let day = day.clamp(1, self.days());
        NaiveDate::from_ymd_opt(self.year, self.month, day).unwrap_or_else(|| self.last_day())
    }

    /// The following month
    pub fn succ(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// The preceding month
    pub fn pred(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Whether `[start, end]` (open-ended when `end` is None) touches this month
    pub fn overlaps(&self, start: NaiveDate, end: Option<NaiveDate>) -> bool {
        start <= self.last_day() && end.map_or(true, |e| e >= self.first_day())
    }

    /// Inclusive range of periods from `self` through `last`
    pub fn through(self, last: Period) -> impl Iterator<Item = Period> {
        let mut next = Some(self);
        std::iter::from_fn(move || {
            let current = next?;
            if current > last {
                return None;
            }
            next = Some(current.succ());
            Some(current)
        })
    }

    /// Storage key, `YYYY-MM`
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| Error::Validation(format!("invalid period '{}', use YYYY-MM", s)))?;
        let year: i32 = year
            .parse()
            .map_err(|_| Error::Validation(format!("invalid year in period '{}'", s)))?;
        let month: u32 = month
            .parse()
            .map_err(|_| Error::Validation(format!("invalid month in period '{}'", s)))?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for Period {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}
