use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

use super::{Calendar, Event, EventTime};
use crate::error::{CoreError, Result};

/// A single unfolded content line: `NAME;PARAM=VALUE:value`.
#[derive(Debug)]
struct ContentLine<'a> {
    name: String,
    params: Vec<(String, &'a str)>,
    value: &'a str,
}

impl ContentLine<'_> {
    fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.trim_matches('"'))
    }
}

/// Properties collected for an event while its component is open.
#[derive(Debug, Default)]
struct PendingEvent {
    uid: Option<String>,
    stamp: Option<DateTime<Utc>>,
    summary: Option<String>,
    start: Option<EventTime>,
    end: Option<EventTime>,
    duration: Option<TimeDelta>,
}

impl PendingEvent {
    fn finish(self) -> Option<Event> {
        let start = self.start?;
        let end = match (self.end, self.duration) {
            (Some(end), _) => end,
            (None, Some(duration)) => start.checked_add(duration)?,
            // RFC 5545 3.6.1: a date start without an end lasts one day,
            // a date-time start without an end is instantaneous.
            (None, None) if start.is_date() => start.checked_add(TimeDelta::days(1))?,
            (None, None) => start,
        };
        Some(Event {
            uid: self.uid,
            stamp: self.stamp,
            summary: self.summary,
            start,
            end,
        })
    }
}

/// Parse iCalendar text into a [`Calendar`].
///
/// Parsing is lenient about properties it does not understand, and an event
/// with an unreadable date, date-time or duration is left out. The component
/// structure must be well formed: a document without a `VCALENDAR`, or with
/// unbalanced `BEGIN`/`END` lines, is rejected.
pub fn parse_calendar(text: &str) -> Result<Calendar> {
    let mut calendar = Calendar {
        prod_id: String::new(),
        name: None,
        description: None,
        events: Vec::new(),
    };
    let mut stack: Vec<String> = Vec::new();
    let mut pending: Option<PendingEvent> = None;
    let mut saw_calendar = false;

    for (number, line) in unfold(text) {
        if line.trim().is_empty() {
            continue;
        }
        let Some(content) = split_content_line(&line) else {
            return Err(CoreError::calendar_parse(number, "missing ':' separator"));
        };

        match content.name.as_str() {
            "BEGIN" => {
                let component = content.value.trim().to_ascii_uppercase();
                if component == "VCALENDAR" {
                    saw_calendar = true;
                } else if stack.is_empty() {
                    return Err(CoreError::calendar_parse(
                        number,
                        format!("{} outside of VCALENDAR", component),
                    ));
                }
                if component == "VEVENT" && stack.last().map(String::as_str) == Some("VCALENDAR") {
                    pending = Some(PendingEvent::default());
                }
                stack.push(component);
            }
            "END" => {
                let component = content.value.trim().to_ascii_uppercase();
                match stack.pop() {
                    Some(open) if open == component => {}
                    Some(open) => {
                        return Err(CoreError::calendar_parse(
                            number,
                            format!("END:{} while {} is open", component, open),
                        ));
                    }
                    None => {
                        return Err(CoreError::calendar_parse(
                            number,
                            format!("END:{} without BEGIN", component),
                        ));
                    }
                }
                if component == "VEVENT" && stack.last().map(String::as_str) == Some("VCALENDAR") {
                    match pending.take().map(PendingEvent::finish) {
                        Some(Some(event)) => calendar.events.push(event),
                        Some(None) => {
                            tracing::debug!(line = number, "skipping event without a usable DTSTART");
                        }
                        None => {}
                    }
                }
            }
            _ => match stack.last().map(String::as_str) {
                Some("VEVENT") => {
                    let malformed = pending
                        .as_mut()
                        .and_then(|event| apply_event_property(event, &content, number).err());
                    if let Some(e) = malformed {
                        tracing::debug!(line = number, error = %e, "skipping event with a malformed property");
                        pending = None;
                    }
                }
                Some("VCALENDAR") => match content.name.as_str() {
                    "PRODID" => calendar.prod_id = unescape_text(content.value),
                    "X-WR-CALNAME" => calendar.name = Some(unescape_text(content.value)),
                    "X-WR-CALDESC" => calendar.description = Some(unescape_text(content.value)),
                    _ => {}
                },
                _ => {}
            },
        }
    }

    if let Some(open) = stack.last() {
        return Err(CoreError::calendar_parse(
            0,
            format!("{} is never closed", open),
        ));
    }
    if !saw_calendar {
        return Err(CoreError::calendar_parse(0, "no VCALENDAR component"));
    }

    Ok(calendar)
}

fn apply_event_property(event: &mut PendingEvent, content: &ContentLine<'_>, number: usize) -> Result<()> {
    match content.name.as_str() {
        "UID" => event.uid = Some(unescape_text(content.value)),
        "SUMMARY" => event.summary = Some(unescape_text(content.value)),
        "DTSTAMP" => {
            if let EventTime::Utc(instant) = parse_time(content, number)? {
                event.stamp = Some(instant);
            }
        }
        "DTSTART" => event.start = Some(parse_time(content, number)?),
        "DTEND" => event.end = Some(parse_time(content, number)?),
        "DURATION" => event.duration = Some(parse_duration(content.value.trim(), number)?),
        _ => {}
    }
    Ok(())
}

/// Join folded lines, yielding each logical line with its starting line number.
fn unfold(text: &str) -> Vec<(usize, String)> {
    let mut lines: Vec<(usize, String)> = Vec::new();
    for (index, raw) in text.split('\n').enumerate() {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        if let Some(continuation) = raw.strip_prefix([' ', '\t']) {
            if let Some((_, last)) = lines.last_mut() {
                last.push_str(continuation);
                continue;
            }
        }
        lines.push((index + 1, raw.to_string()));
    }
    lines
}

fn split_content_line(line: &str) -> Option<ContentLine<'_>> {
    // The value starts at the first ':' outside a quoted parameter value.
    let mut in_quotes = false;
    let mut colon = None;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ':' if !in_quotes => {
                colon = Some(index);
                break;
            }
            _ => {}
        }
    }
    let colon = colon?;
    let (head, value) = (&line[..colon], &line[colon + 1..]);

    let mut parts = head.split(';');
    let name = parts.next()?.trim().to_ascii_uppercase();
    let params = parts
        .filter_map(|param| {
            let (key, value) = param.split_once('=')?;
            Some((key.trim().to_ascii_uppercase(), value))
        })
        .collect();

    Some(ContentLine {
        name,
        params,
        value,
    })
}

fn parse_time(content: &ContentLine<'_>, number: usize) -> Result<EventTime> {
    let value = content.value.trim();
    let is_date = content
        .param("VALUE")
        .map(|v| v.eq_ignore_ascii_case("DATE"))
        .unwrap_or(value.len() == 8 && !value.contains('T'));

    if is_date {
        return NaiveDate::parse_from_str(value, "%Y%m%d")
            .map(EventTime::Date)
            .map_err(|e| CoreError::calendar_parse(number, format!("invalid date '{}': {}", value, e)));
    }

    if let Some(utc) = value.strip_suffix('Z') {
        let naive = parse_naive_datetime(utc, number)?;
        return Ok(EventTime::Utc(Utc.from_utc_datetime(&naive)));
    }

    let naive = parse_naive_datetime(value, number)?;
    match content.param("TZID").and_then(|tzid| Tz::from_str(tzid).ok()) {
        Some(tz) => match tz.from_local_datetime(&naive).earliest() {
            Some(local) => Ok(EventTime::Utc(local.with_timezone(&Utc))),
            None => Ok(EventTime::Floating(naive)),
        },
        None => Ok(EventTime::Floating(naive)),
    }
}

fn parse_naive_datetime(value: &str, number: usize) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S")
        .map_err(|e| CoreError::calendar_parse(number, format!("invalid date-time '{}': {}", value, e)))
}

/// Parse an RFC 5545 duration such as `P1W`, `P7D` or `-PT1H30M`.
fn parse_duration(value: &str, number: usize) -> Result<TimeDelta> {
    let invalid = || CoreError::calendar_parse(number, format!("invalid duration '{}'", value));

    let (negative, rest) = match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };
    let rest = rest.strip_prefix('P').ok_or_else(invalid)?;

    let mut total = TimeDelta::zero();
    let mut digits = String::new();
    let mut in_time = false;
    for ch in rest.chars() {
        match ch {
            '0'..='9' => digits.push(ch),
            'T' => in_time = true,
            unit => {
                let amount: i64 = digits.parse().map_err(|_| invalid())?;
                digits.clear();
                let part = match (unit, in_time) {
                    ('W', false) => TimeDelta::try_weeks(amount),
                    ('D', false) => TimeDelta::try_days(amount),
                    ('H', true) => TimeDelta::try_hours(amount),
                    ('M', true) => TimeDelta::try_minutes(amount),
                    ('S', true) => TimeDelta::try_seconds(amount),
                    _ => None,
                }
                .ok_or_else(invalid)?;
                total = total.checked_add(&part).ok_or_else(invalid)?;
            }
        }
    }
    if !digits.is_empty() {
        return Err(invalid());
    }

    Ok(if negative { -total } else { total })
}

fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FEED: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//Google Inc//Google Calendar 70.9054//EN\r\n\
X-WR-CALNAME:Ansvarsveckor\r\n\
BEGIN:VTIMEZONE\r\n\
TZID:Europe/Stockholm\r\n\
END:VTIMEZONE\r\n\
BEGIN:VEVENT\r\n\
DTSTART;VALUE=DATE:20250303\r\n\
DTEND;VALUE=DATE:20250310\r\n\
DTSTAMP:20250301T101500Z\r\n\
UID:abc@google.com\r\n\
SUMMARY:Ansvar: Alice\\, Bob\r\n\
BEGIN:VALARM\r\n\
ACTION:DISPLAY\r\n\
SUMMARY:not the event summary\r\n\
END:VALARM\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
DTSTART;TZID=Europe/Stockholm:20250304T170000\r\n\
DTEND;TZID=Europe/Stockholm:20250304T190000\r\n\
SUMMARY:Pub\r\n\
\x20quiz\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    #[test]
    fn parses_events_and_calendar_properties() {
        let calendar = parse_calendar(FEED).unwrap();
        assert_eq!(calendar.name.as_deref(), Some("Ansvarsveckor"));
        assert_eq!(calendar.events.len(), 2);

        let week = &calendar.events[0];
        assert_eq!(week.summary.as_deref(), Some("Ansvar: Alice, Bob"));
        assert_eq!(week.uid.as_deref(), Some("abc@google.com"));
        assert!(week.is_all_day());
        assert_eq!(week.duration(), TimeDelta::weeks(1));

        let pub_quiz = &calendar.events[1];
        assert_eq!(pub_quiz.summary.as_deref(), Some("Pubquiz"));
        assert!(!pub_quiz.is_all_day());
        // 17:00 CET is 16:00 UTC.
        assert_eq!(
            pub_quiz.start,
            EventTime::Utc(Utc.with_ymd_and_hms(2025, 3, 4, 16, 0, 0).unwrap())
        );
    }

    #[test]
    fn fills_in_missing_end() {
        let text = "BEGIN:VCALENDAR\n\
BEGIN:VEVENT\n\
DTSTART;VALUE=DATE:20250303\n\
DURATION:P1W\n\
END:VEVENT\n\
BEGIN:VEVENT\n\
DTSTART:20250303\n\
END:VEVENT\n\
END:VCALENDAR\n";
        let calendar = parse_calendar(text).unwrap();
        assert_eq!(calendar.events[0].duration(), TimeDelta::weeks(1));
        assert_eq!(calendar.events[1].duration(), TimeDelta::days(1));
    }

    #[test]
    fn skips_events_with_malformed_times() {
        let text = "BEGIN:VCALENDAR\n\
BEGIN:VEVENT\n\
DTSTART;VALUE=DATE:20250303\n\
SUMMARY:Ansvar: Alice\n\
END:VEVENT\n\
BEGIN:VEVENT\n\
DTSTART:2025-03-10\n\
SUMMARY:Ansvar: Bob\n\
END:VEVENT\n\
BEGIN:VEVENT\n\
DTSTART;VALUE=DATE:20250317\n\
DURATION:en vecka\n\
SUMMARY:Ansvar: Cecilia\n\
END:VEVENT\n\
BEGIN:VEVENT\n\
DTSTART;VALUE=DATE:20250324\n\
DTEND;VALUE=DATE:20250331\n\
SUMMARY:Ansvar: Dave\n\
END:VEVENT\n\
END:VCALENDAR\n";
        let calendar = parse_calendar(text).unwrap();
        let summaries: Vec<_> = calendar.events.iter().filter_map(|e| e.summary.as_deref()).collect();
        assert_eq!(summaries, vec!["Ansvar: Alice", "Ansvar: Dave"]);
    }

    #[test]
    fn parses_durations() {
        assert_eq!(parse_duration("P1DT2H30M", 1).unwrap(), TimeDelta::minutes(26 * 60 + 30));
        assert_eq!(parse_duration("-PT15M", 1).unwrap(), TimeDelta::minutes(-15));
        assert!(parse_duration("1D", 1).is_err());
        assert!(parse_duration("P1H", 1).is_err());
    }

    #[test]
    fn rejects_broken_structure() {
        assert!(parse_calendar("hello world").is_err());
        assert!(parse_calendar("BEGIN:VCALENDAR\nBEGIN:VEVENT\nEND:VCALENDAR\n").is_err());
        assert!(parse_calendar("BEGIN:VCALENDAR\n").is_err());
        assert!(parse_calendar("").is_err());
    }

    #[test]
    fn keeps_colons_in_quoted_parameters() {
        let line = split_content_line("ATTENDEE;CN=\"Doe: John\":mailto:j@example.com").unwrap();
        assert_eq!(line.name, "ATTENDEE");
        assert_eq!(line.param("CN"), Some("Doe: John"));
        assert_eq!(line.value, "mailto:j@example.com");
    }
}
