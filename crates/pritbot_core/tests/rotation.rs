//! Integration tests for the rotation pipeline.
//!
//! Generated calendars are written to iCalendar text, parsed back and fed
//! into the next rotation, the way the bot chains `/weeks generate` runs.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use pritbot_core::ical::parse_calendar;
use pritbot_core::rotation::{
    analyze, create_calendar, create_events, distribute_members, extract_history, plan_rotation,
};
use pritbot_core::{Roster, SummaryFormat, WeekOfYear};

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn size(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

#[test]
fn generated_calendar_reads_back_as_the_same_groups() {
    let format = SummaryFormat::default();
    let roster = Roster::parse("Alice,Bob,Cecilia,Dave,Eve,Östen Öberg", &format).unwrap();
    let weeks = distribute_members(roster.members(), &Vec::new(), size(2));
    let events = create_events(&weeks, WeekOfYear::new(2026, 51).unwrap(), &format);

    let text = create_calendar(&events).serialize();
    let parsed = parse_calendar(&text).unwrap();
    let history = extract_history(&parsed, &format);

    assert_eq!(history.len(), 3);
    assert_eq!(
        history.iter().map(|w| w.responsible.clone()).collect::<Vec<_>>(),
        weeks
    );
    assert_eq!(history[0].start, NaiveDate::from_ymd_opt(2026, 12, 14).unwrap());
    // 2026 is a long year, so the third group lands in week 53.
    assert_eq!(history[2].start, NaiveDate::from_ymd_opt(2026, 12, 28).unwrap());
}

#[test]
fn feed_with_mixed_events() {
    let feed = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
DTSTART;VALUE=DATE:20250303\r\n\
DTEND;VALUE=DATE:20250310\r\n\
SUMMARY:Ansvar: Alice\\, Bob\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
DTSTART;VALUE=DATE:20250310\r\n\
DTEND;VALUE=DATE:20250313\r\n\
SUMMARY:Ansvar: Cecilia\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
DTSTART:20250310T090000Z\r\n\
DTEND:20250317T090000Z\r\n\
SUMMARY:Ansvar: Dave\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    let history = extract_history(&parse_calendar(feed).unwrap(), &SummaryFormat::default());
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].responsible, set(&["Alice", "Bob"]));
}

#[test]
fn chained_rotations_stay_fair() {
    let format = SummaryFormat::default();
    let roster = set(&["A", "B", "C", "D", "E"]);
    let mut history = Vec::new();
    let mut week = WeekOfYear::new(2025, 1).unwrap();

    for _ in 0..6 {
        let events = plan_rotation(&roster, &history, size(2), week, &format);
        let parsed = parse_calendar(&create_calendar(&events).serialize()).unwrap();
        history.extend(extract_history(&parsed, &format));
        week = week.advance(events.len() as u32);
    }

    let stats = analyze(&roster, history.iter().map(|w| &w.responsible));
    let counts: Vec<u32> = stats.values().map(|s| s.week_count).collect();
    let (min, max) = (counts.iter().min().unwrap(), counts.iter().max().unwrap());
    assert!(max - min <= 1, "uneven week counts {:?}", counts);

    // Nobody holds two consecutive weeks across a rotation boundary either.
    for pair in history.windows(2) {
        assert!(
            pair[0].responsible.is_disjoint(&pair[1].responsible),
            "{:?} followed by {:?}",
            pair[0].responsible,
            pair[1].responsible
        );
    }
}

#[test]
fn fewer_weeks_are_scheduled_earlier() {
    let roster = set(&["A", "B", "C", "D", "E", "F"]);
    let history = vec![set(&["A", "B"]), set(&["A", "C"]), set(&["B", "D"])];
    let stats = analyze(&roster, &history);
    let weeks = distribute_members(&roster, &history, size(2));

    let position = |member: &str| weeks.iter().position(|w| w.contains(member)).unwrap();
    for a in &roster {
        for b in &roster {
            if stats[a].week_count < stats[b].week_count {
                assert!(position(a) <= position(b), "{} should not come after {}", a, b);
            }
        }
    }
}

#[test]
fn chained_rotations_do_not_repeat_pairs() {
    // Six members in pairs can go five rotations with every pair once.
    let format = SummaryFormat::default();
    let roster = set(&["A", "B", "C", "D", "E", "F"]);
    let mut history = Vec::new();
    let mut week = WeekOfYear::new(2025, 1).unwrap();

    for _ in 0..5 {
        let events = plan_rotation(&roster, &history, size(2), week, &format);
        let parsed = parse_calendar(&create_calendar(&events).serialize()).unwrap();
        history.extend(extract_history(&parsed, &format));
        week = week.advance(events.len() as u32);
    }

    assert_eq!(history.len(), 15);
    let mut pairs = BTreeSet::new();
    for entry in &history {
        assert!(pairs.insert(entry.responsible.clone()), "{:?} paired again", entry.responsible);
    }
    for pair in history.windows(2) {
        assert!(pair[0].responsible.is_disjoint(&pair[1].responsible));
    }
}
