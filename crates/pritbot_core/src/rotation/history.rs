//! Previous responsibility weeks recovered from a calendar feed.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, TimeDelta};
use miette::Diagnostic;
use thiserror::Error;

use crate::error::CoreError;
use crate::ical::{Calendar, Event};
use crate::summary::SummaryFormat;

/// Allowed deviation from exactly seven days, covering DST transitions in
/// feeds that store whole days as local midnights.
const WEEK_TOLERANCE: TimeDelta = TimeDelta::hours(1);

/// A week in which a group of members was responsible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsibleWeek {
    pub start: NaiveDate,
    /// Exclusive end date.
    pub end: NaiveDate,
    /// Never empty.
    pub responsible: BTreeSet<String>,
}

impl ResponsibleWeek {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

/// Why the history of a guild could not be read.
///
/// Distinct from an empty history: a guild with a working calendar that
/// contains no responsibility events has `Ok(vec![])`.
#[derive(Error, Diagnostic, Debug)]
pub enum HistoryUnavailable {
    #[error("No responsibility calendar is configured")]
    #[diagnostic(
        code(pritbot_core::history::not_configured),
        help("Set one with /config calendar set <url>")
    )]
    NotConfigured,

    #[error("Could not fetch the responsibility calendar from {url}")]
    #[diagnostic(code(pritbot_core::history::fetch))]
    Fetch {
        url: String,
        #[source]
        cause: reqwest::Error,
    },

    #[error("Could not read the responsibility calendar")]
    #[diagnostic(code(pritbot_core::history::parse))]
    Parse {
        #[source]
        #[diagnostic_source]
        cause: CoreError,
    },
}

/// Whether an event looks like a responsibility week: whole days, one week long.
fn is_week_long(event: &Event) -> bool {
    if !event.is_all_day() {
        return false;
    }
    (event.duration() - TimeDelta::weeks(1)).abs() <= WEEK_TOLERANCE
}

/// Extract responsibility weeks from a calendar, oldest first.
///
/// Events are kept when they span whole days, last one week and carry the
/// summary marker. Events whose summary holds no names are dropped.
pub fn extract_history(calendar: &Calendar, format: &SummaryFormat) -> Vec<ResponsibleWeek> {
    let mut weeks: Vec<ResponsibleWeek> = calendar
        .events
        .iter()
        .filter(|event| is_week_long(event))
        .filter_map(|event| {
            let summary = event.summary.as_deref()?;
            if !format.matches(summary) {
                return None;
            }
            let responsible = format.members(summary);
            if responsible.is_empty() {
                tracing::debug!(summary, "responsibility event without names");
                return None;
            }
            Some(ResponsibleWeek {
                start: event.start.date(),
                end: event.end.date(),
                responsible,
            })
        })
        .collect();

    weeks.sort_by_key(|week| week.start);
    weeks
}

/// The responsibility week covering a date.
pub fn responsible_at(history: &[ResponsibleWeek], date: NaiveDate) -> Option<&ResponsibleWeek> {
    history.iter().rev().find(|week| week.covers(date))
}

/// Day of the responsibility week for a date, starting at 1.
///
/// Counted from the start of the covering week, or the ISO weekday when no
/// week covers the date.
pub fn day_of_responsibility_week(history: &[ResponsibleWeek], date: NaiveDate) -> u32 {
    match responsible_at(history, date) {
        Some(week) => u32::try_from((date - week.start).num_days() + 1).unwrap_or(1),
        None => date.weekday().number_from_monday(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ical::EventTime;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn all_day(summary: &str, start: NaiveDate, days: u64) -> Event {
        Event {
            uid: None,
            stamp: None,
            summary: Some(summary.to_string()),
            start: EventTime::Date(start),
            end: EventTime::Date(start + chrono::Days::new(days)),
        }
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn keeps_only_week_long_marked_events() {
        let timed = Event {
            uid: None,
            stamp: None,
            summary: Some("Ansvar: Eve".into()),
            start: EventTime::Utc(Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap()),
            end: EventTime::Utc(Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap()),
        };
        let calendar = Calendar::new("feed").with_events(vec![
            all_day("Ansvar: Cecilia", date(2025, 3, 10), 7),
            all_day("Ansvar: Alice, Bob", date(2025, 3, 3), 7),
            all_day("Ansvar: Dave", date(2025, 3, 3), 3),
            all_day("Pubkväll", date(2025, 3, 3), 7),
            all_day("Ansvar:", date(2025, 3, 17), 7),
            timed,
        ]);

        let history = extract_history(&calendar, &SummaryFormat::default());
        assert_eq!(
            history,
            vec![
                ResponsibleWeek {
                    start: date(2025, 3, 3),
                    end: date(2025, 3, 10),
                    responsible: set(&["Alice", "Bob"]),
                },
                ResponsibleWeek {
                    start: date(2025, 3, 10),
                    end: date(2025, 3, 17),
                    responsible: set(&["Cecilia"]),
                },
            ]
        );
    }

    #[test]
    fn finds_the_covering_week() {
        let history = vec![
            ResponsibleWeek {
                start: date(2025, 3, 3),
                end: date(2025, 3, 10),
                responsible: set(&["Alice"]),
            },
            ResponsibleWeek {
                start: date(2025, 3, 12),
                end: date(2025, 3, 19),
                responsible: set(&["Bob"]),
            },
        ];

        assert_eq!(responsible_at(&history, date(2025, 3, 9)), Some(&history[0]));
        assert_eq!(responsible_at(&history, date(2025, 3, 10)), None);
        assert_eq!(day_of_responsibility_week(&history, date(2025, 3, 3)), 1);
        // Wednesday start, so the following Monday is day 6.
        assert_eq!(day_of_responsibility_week(&history, date(2025, 3, 17)), 6);
        // No covering week: 2025-03-11 is a Tuesday.
        assert_eq!(day_of_responsibility_week(&history, date(2025, 3, 11)), 2);
    }
}
