//! Minimal iCalendar (RFC 5545) support for responsibility calendars.
//!
//! Only the `VEVENT` properties the rotation engine needs are modelled:
//! `UID`, `DTSTAMP`, `DTSTART`, `DTEND`/`DURATION` and `SUMMARY`. Everything
//! else in a feed is skipped.

mod parse;
mod write;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};

pub use parse::parse_calendar;
pub use write::serialize_calendar;

/// Product identifier written to generated calendars.
pub const PROD_ID: &str = "-//P.R.I.T.//pritbot//SV";

/// A `DTSTART`/`DTEND` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTime {
    /// A whole-day value (`VALUE=DATE`).
    Date(NaiveDate),
    /// An absolute instant, either written in UTC or resolved from a `TZID`.
    Utc(DateTime<Utc>),
    /// A floating local time without zone information.
    Floating(NaiveDateTime),
}

impl EventTime {
    /// Whether this is a whole-day value without a time-of-day component.
    pub fn is_date(&self) -> bool {
        matches!(self, EventTime::Date(_))
    }

    /// Calendar date of this value.
    pub fn date(&self) -> NaiveDate {
        match self {
            EventTime::Date(date) => *date,
            EventTime::Utc(instant) => instant.date_naive(),
            EventTime::Floating(local) => local.date(),
        }
    }

    /// Point on a shared timeline used for duration arithmetic.
    ///
    /// Dates count from midnight. UTC and floating values are compared on
    /// their wall-clock reading, which is what feeds mixing the two mean.
    fn timeline(&self) -> NaiveDateTime {
        match self {
            EventTime::Date(date) => date.and_time(chrono::NaiveTime::MIN),
            EventTime::Utc(instant) => instant.naive_utc(),
            EventTime::Floating(local) => *local,
        }
    }

    pub fn checked_add(&self, delta: TimeDelta) -> Option<EventTime> {
        match self {
            EventTime::Date(date) => {
                let shifted = date.and_time(chrono::NaiveTime::MIN).checked_add_signed(delta)?;
                Some(EventTime::Date(shifted.date()))
            }
            EventTime::Utc(instant) => instant.checked_add_signed(delta).map(EventTime::Utc),
            EventTime::Floating(local) => local.checked_add_signed(delta).map(EventTime::Floating),
        }
    }
}

/// A calendar event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub uid: Option<String>,
    pub stamp: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub start: EventTime,
    /// Exclusive end. Always present after parsing: derived from `DURATION`
    /// or the RFC 5545 defaults when `DTEND` is missing.
    pub end: EventTime,
}

impl Event {
    /// Time between start and end.
    pub fn duration(&self) -> TimeDelta {
        self.end.timeline() - self.start.timeline()
    }

    /// Whether both ends are whole-day values.
    pub fn is_all_day(&self) -> bool {
        self.start.is_date() && self.end.is_date()
    }

    /// Whether a date falls within `[start, end)`.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start.date() <= date && date < self.end.date()
    }
}

/// A parsed or generated calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calendar {
    pub prod_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub events: Vec<Event>,
}

impl Calendar {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            prod_id: PROD_ID.to_string(),
            name: Some(name.into()),
            description: None,
            events: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_events(mut self, events: Vec<Event>) -> Self {
        self.events = events;
        self
    }

    /// Serialize to iCalendar text.
    pub fn serialize(&self) -> String {
        serialize_calendar(self)
    }
}
