use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, NaiveTime, TimeDelta, TimeZone, Timelike};

use crate::error::{CoreError, Result};

/// A wall-clock time such as `09:00` or `15:30:00.250`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    pub fn as_naive(&self) -> NaiveTime {
        self.0
    }

    /// The first instant strictly after `after` at which the wall clock reads
    /// this time.
    ///
    /// A time skipped by a daylight-saving jump resolves to the instant the
    /// clock jumps to. An ambiguous time resolves to its earlier reading.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> DateTime<Tz> {
        let zone = after.timezone();
        let today = after.date_naive();
        for offset in 0..=2 {
            let Some(date) = today.checked_add_days(Days::new(offset)) else {
                break;
            };
            let local = date.and_time(self.0);
            let resolved = zone.from_local_datetime(&local).earliest().or_else(|| {
                // Inside a DST gap: step forward until the clock exists again.
                (1..=4).find_map(|step| {
                    let shifted = local + TimeDelta::minutes(30 * step);
                    zone.from_local_datetime(&shifted).earliest()
                })
            });
            if let Some(candidate) = resolved {
                if candidate > *after {
                    return candidate;
                }
            }
        }
        after.clone() + TimeDelta::days(1)
    }
}

impl FromStr for TimeOfDay {
    type Err = CoreError;

    /// Parse `HH[:MM[:SS[.mmm]]]`. Later parts may be left out but not skipped.
    fn from_str(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let parts: Vec<&str> = trimmed.split([':', '.']).collect();
        if parts.len() > 4 {
            return Err(CoreError::invalid_time(input, "too many parts"));
        }

        let mut values = [0u32; 4];
        for (index, part) in parts.iter().enumerate() {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(CoreError::invalid_time(input, "parts must be integers"));
            }
            values[index] = part
                .parse()
                .map_err(|_| CoreError::invalid_time(input, "part out of range"))?;
        }

        let [hour, minute, second, milli] = values;
        if hour > 23 {
            return Err(CoreError::invalid_time(input, "hours must be between 0 and 23"));
        }
        if minute > 59 {
            return Err(CoreError::invalid_time(input, "minutes must be between 0 and 59"));
        }
        if second > 59 {
            return Err(CoreError::invalid_time(input, "seconds must be between 0 and 59"));
        }
        if milli > 999 {
            return Err(CoreError::invalid_time(
                input,
                "milliseconds must be between 0 and 999",
            ));
        }

        NaiveTime::from_hms_milli_opt(hour, minute, second, milli)
            .map(Self)
            .ok_or_else(|| CoreError::invalid_time(input, "not a time of day"))
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0.hour(), self.0.minute())?;
        let millis = self.0.nanosecond() / 1_000_000;
        if self.0.second() != 0 || millis != 0 {
            write!(f, ":{:02}", self.0.second())?;
        }
        if millis != 0 {
            write!(f, ".{:03}", millis)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Stockholm;

    fn time(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    #[test]
    fn parses_partial_times() {
        assert_eq!(time("9"), TimeOfDay::new(9, 0).unwrap());
        assert_eq!(time("09:30"), TimeOfDay::new(9, 30).unwrap());
        assert_eq!(time("15:00:07.250").to_string(), "15:00:07.250");
        assert_eq!(time(" 08:00 ").to_string(), "08:00");
    }

    #[test]
    fn rejects_bad_times() {
        for bad in ["", "24:00", "12:60", "12:00:60", "1:2:3:4:5", "12:xx", "12::00", "-1"] {
            assert!(bad.parse::<TimeOfDay>().is_err(), "{:?} should not parse", bad);
        }
    }

    #[test]
    fn next_occurrence_is_today_or_tomorrow() {
        let morning = Stockholm.with_ymd_and_hms(2026, 10, 14, 7, 0, 0).unwrap();
        let next = time("08:00").next_after(&morning);
        assert_eq!(next, Stockholm.with_ymd_and_hms(2026, 10, 14, 8, 0, 0).unwrap());

        let at_eight = Stockholm.with_ymd_and_hms(2026, 10, 14, 8, 0, 0).unwrap();
        let next = time("08:00").next_after(&at_eight);
        assert_eq!(next, Stockholm.with_ymd_and_hms(2026, 10, 15, 8, 0, 0).unwrap());
    }

    #[test]
    fn skips_the_daylight_saving_gap() {
        // Clocks go from 02:00 to 03:00 on 2026-03-29 in Stockholm.
        let before = Stockholm.with_ymd_and_hms(2026, 3, 29, 1, 0, 0).unwrap();
        let next = time("02:30").next_after(&before);
        assert_eq!(next, Stockholm.with_ymd_and_hms(2026, 3, 29, 3, 0, 0).unwrap());
    }
}
