use chrono::{DateTime, Utc};

use super::{Calendar, Event, EventTime};

/// Content lines are folded at 75 octets (RFC 5545 3.1).
const MAX_LINE_OCTETS: usize = 75;

/// Serialize a calendar to iCalendar text with CRLF line endings.
pub fn serialize_calendar(calendar: &Calendar) -> String {
    let mut out = String::new();
    push_line(&mut out, "BEGIN:VCALENDAR");
    push_line(&mut out, "VERSION:2.0");
    push_line(&mut out, &format!("PRODID:{}", escape_text(&calendar.prod_id)));
    push_line(&mut out, "CALSCALE:GREGORIAN");
    if let Some(name) = &calendar.name {
        push_line(&mut out, &format!("X-WR-CALNAME:{}", escape_text(name)));
    }
    if let Some(description) = &calendar.description {
        push_line(&mut out, &format!("X-WR-CALDESC:{}", escape_text(description)));
    }
    for event in &calendar.events {
        write_event(&mut out, event);
    }
    push_line(&mut out, "END:VCALENDAR");
    out
}

fn write_event(out: &mut String, event: &Event) {
    push_line(out, "BEGIN:VEVENT");
    if let Some(uid) = &event.uid {
        push_line(out, &format!("UID:{}", escape_text(uid)));
    }
    if let Some(stamp) = &event.stamp {
        push_line(out, &format!("DTSTAMP:{}", format_utc(stamp)));
    }
    push_line(out, &format_time("DTSTART", &event.start));
    push_line(out, &format_time("DTEND", &event.end));
    if let Some(summary) = &event.summary {
        push_line(out, &format!("SUMMARY:{}", escape_text(summary)));
    }
    push_line(out, "END:VEVENT");
}

fn format_time(name: &str, time: &EventTime) -> String {
    match time {
        EventTime::Date(date) => format!("{};VALUE=DATE:{}", name, date.format("%Y%m%d")),
        EventTime::Utc(instant) => format!("{}:{}", name, format_utc(instant)),
        EventTime::Floating(local) => format!("{}:{}", name, local.format("%Y%m%dT%H%M%S")),
    }
}

fn format_utc(instant: &DateTime<Utc>) -> String {
    instant.format("%Y%m%dT%H%M%SZ").to_string()
}

fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            other => out.push(other),
        }
    }
    out
}

/// Append a content line, folding it without splitting UTF-8 sequences.
fn push_line(out: &mut String, line: &str) {
    let mut width = 0;
    for ch in line.chars() {
        let len = ch.len_utf8();
        if width + len > MAX_LINE_OCTETS {
            out.push_str("\r\n ");
            // The leading space of a continuation line counts towards its length.
            width = 1;
        }
        out.push(ch);
        width += len;
    }
    out.push_str("\r\n");
}
