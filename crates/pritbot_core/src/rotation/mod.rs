//! Responsibility-week rotation.
//!
//! The pipeline runs leaves first: [`extract_history`] reads previous weeks
//! from a calendar, [`analyze`] summarizes them per member,
//! [`distribute_members`] builds the next rotation and [`create_events`]
//! places it on the calendar. Everything here is synchronous and pure
//! except for the UUIDs and timestamps on generated events.

mod distribute;
mod history;
mod materialize;
mod stats;

use std::collections::BTreeSet;
use std::num::NonZeroUsize;

use chrono::NaiveDate;

pub use distribute::{DEFAULT_GROUP_SIZE, distribute_members};
pub use history::{
    HistoryUnavailable, ResponsibleWeek, day_of_responsibility_week, extract_history,
    responsible_at,
};
pub use materialize::{
    GENERATED_CALENDAR_DESCRIPTION, GENERATED_CALENDAR_NAME, ResponsibilityEvent, create_calendar,
    create_events,
};
pub use stats::{MemberWeekStatistics, analyze};

use crate::summary::SummaryFormat;
use crate::week::WeekOfYear;

/// Week to start a new rotation in when none is given.
///
/// The week after the latest assignment if that assignment has not ended
/// yet, otherwise the current week.
pub fn default_start_week(history: &[ResponsibleWeek], today: NaiveDate) -> WeekOfYear {
    match history.iter().map(|week| week.end).max() {
        Some(end) if end > today => WeekOfYear::containing(end),
        _ => WeekOfYear::containing(today),
    }
}

/// Distribute a roster and place the result on consecutive weeks.
pub fn plan_rotation(
    members: &BTreeSet<String>,
    history: &[ResponsibleWeek],
    group_size: NonZeroUsize,
    start_week: WeekOfYear,
    format: &SummaryFormat,
) -> Vec<ResponsibilityEvent> {
    let weeks = distribute_members(members, history.iter().map(|week| &week.responsible), group_size);
    create_events(&weeks, start_week, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn week(start: NaiveDate) -> ResponsibleWeek {
        ResponsibleWeek {
            start,
            end: start + chrono::Days::new(7),
            responsible: ["Alice".to_string()].into_iter().collect(),
        }
    }

    #[test]
    fn starts_after_a_running_assignment() {
        let history = vec![week(date(2026, 10, 12)), week(date(2026, 10, 19))];
        let today = date(2026, 10, 14);
        assert_eq!(default_start_week(&history, today), WeekOfYear::new(2026, 44).unwrap());
    }

    #[test]
    fn starts_now_when_history_is_over() {
        let history = vec![week(date(2026, 9, 7))];
        let today = date(2026, 10, 14);
        assert_eq!(default_start_week(&history, today), WeekOfYear::new(2026, 42).unwrap());
        assert_eq!(default_start_week(&[], today), WeekOfYear::new(2026, 42).unwrap());
    }
}
