//! ISO 8601 week arithmetic.

use std::fmt;

use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::error::{CoreError, Result};

/// Number of ISO weeks in an ISO week-year (52 or 53).
///
/// December 28th always falls in the last week of its ISO year.
pub fn weeks_in_year(year: i32) -> u32 {
    NaiveDate::from_ymd_opt(year, 12, 28)
        .map(|date| date.iso_week().week())
        .unwrap_or(52)
}

/// A week identified by ISO week-year and week number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeekOfYear {
    year: i32,
    week: u32,
    monday: NaiveDate,
}

impl WeekOfYear {
    pub fn new(year: i32, week: u32) -> Result<Self> {
        if week == 0 || week > weeks_in_year(year) {
            return Err(CoreError::InvalidWeek { year, week });
        }
        let monday = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)
            .ok_or(CoreError::InvalidWeek { year, week })?;
        Ok(Self { year, week, monday })
    }

    /// The ISO week a date belongs to.
    pub fn containing(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        let monday = date - Days::new(u64::from(date.weekday().num_days_from_monday()));
        Self {
            year: iso.year(),
            week: iso.week(),
            monday,
        }
    }

    /// Resolve a bare week number against today's date.
    ///
    /// Week numbers at or after the current week refer to the current ISO
    /// year, earlier ones to the next year. A week 53 that the resolved year
    /// does not have is an error.
    pub fn upcoming(week: u32, today: NaiveDate) -> Result<Self> {
        let current = Self::containing(today);
        if week >= current.week {
            Self::new(current.year, week)
        } else {
            Self::new(current.year + 1, week)
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn week(&self) -> u32 {
        self.week
    }

    /// First day of the week.
    pub fn monday(&self) -> NaiveDate {
        self.monday
    }

    /// The following week, rolling into the next ISO year after its last week.
    pub fn succ(&self) -> Self {
        let (year, week) = if self.week >= weeks_in_year(self.year) {
            (self.year + 1, 1)
        } else {
            (self.year, self.week + 1)
        };
        Self {
            year,
            week,
            monday: self.monday + Days::new(7),
        }
    }

    pub fn advance(&self, weeks: u32) -> Self {
        (0..weeks).fold(*self, |week, _| week.succ())
    }
}

impl fmt::Display for WeekOfYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}
