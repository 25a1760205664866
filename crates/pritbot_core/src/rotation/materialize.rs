//! Turning distributed weeks into calendar events.

use std::collections::BTreeSet;

use chrono::{DateTime, Days, NaiveDate, Utc};
use uuid::Uuid;

use crate::ical::{Calendar, Event, EventTime};
use crate::summary::SummaryFormat;
use crate::week::WeekOfYear;

pub const GENERATED_CALENDAR_NAME: &str = "Genererade ansvarsveckor";
pub const GENERATED_CALENDAR_DESCRIPTION: &str = "Automatiskt genererade ansvarsveckor från P.R.I.T. Bot";

/// A generated responsibility week.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsibilityEvent {
    pub uid: Uuid,
    pub created_at: DateTime<Utc>,
    pub week: WeekOfYear,
    pub members: BTreeSet<String>,
    pub summary: String,
}

impl ResponsibilityEvent {
    /// Monday of the week.
    pub fn start(&self) -> NaiveDate {
        self.week.monday()
    }

    /// Exclusive end, one week after the start.
    pub fn end(&self) -> NaiveDate {
        self.week.monday() + Days::new(7)
    }
}

impl From<&ResponsibilityEvent> for Event {
    fn from(event: &ResponsibilityEvent) -> Self {
        Event {
            uid: Some(event.uid.to_string()),
            stamp: Some(event.created_at),
            summary: Some(event.summary.clone()),
            start: EventTime::Date(event.start()),
            end: EventTime::Date(event.end()),
        }
    }
}

/// Place the i-th group in the i-th week from `start_week`.
pub fn create_events(
    weeks: &[BTreeSet<String>],
    start_week: WeekOfYear,
    format: &SummaryFormat,
) -> Vec<ResponsibilityEvent> {
    let mut week = start_week;
    weeks
        .iter()
        .map(|members| {
            let event = ResponsibilityEvent {
                uid: Uuid::new_v4(),
                created_at: Utc::now(),
                week,
                members: members.clone(),
                summary: format.format(members),
            };
            week = week.succ();
            event
        })
        .collect()
}

/// A calendar holding generated events.
pub fn create_calendar(events: &[ResponsibilityEvent]) -> Calendar {
    Calendar::new(GENERATED_CALENDAR_NAME)
        .with_description(GENERATED_CALENDAR_DESCRIPTION)
        .with_events(events.iter().map(Event::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn consecutive_weeks_across_year_end() {
        let weeks = vec![set(&["Bob", "Alice"]), set(&["Cecilia"]), set(&["Dave"])];
        let events = create_events(&weeks, WeekOfYear::new(2026, 52).unwrap(), &SummaryFormat::default());

        assert_eq!(
            events.iter().map(|e| e.week.to_string()).collect::<Vec<_>>(),
            ["2026-W52", "2026-W53", "2027-W01"]
        );
        assert_eq!(events[0].summary, "Ansvar: Alice, Bob");
        assert_eq!(events[0].start(), date(2026, 12, 21));
        assert_eq!(events[2].start(), date(2027, 1, 4));
        assert_eq!(events[2].end(), date(2027, 1, 11));
        assert_ne!(events[0].uid, events[1].uid);
    }

    #[test]
    fn calendar_events_are_all_day_weeks() {
        let events = create_events(
            &[set(&["Alice"])],
            WeekOfYear::new(2025, 10).unwrap(),
            &SummaryFormat::default(),
        );
        let calendar = create_calendar(&events);
        assert_eq!(calendar.name.as_deref(), Some(GENERATED_CALENDAR_NAME));

        let event = &calendar.events[0];
        assert!(event.is_all_day());
        assert_eq!(event.start, EventTime::Date(date(2025, 3, 3)));
        assert_eq!(event.duration(), chrono::TimeDelta::weeks(1));
        assert_eq!(event.uid, Some(events[0].uid.to_string()));
    }
}
