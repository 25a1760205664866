//! Configured member rosters.

use std::collections::BTreeSet;

use crate::error::{CoreError, Result};
use crate::summary::SummaryFormat;

/// The members taking part in the responsibility-week rotation of a guild.
///
/// Names are the join key against calendar summaries and against guild
/// nicknames, so construction rejects names that would be ambiguous in
/// either place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    members: BTreeSet<String>,
}

impl Roster {
    /// Parse the comma-joined form stored in guild configuration.
    pub fn parse(list: &str, format: &SummaryFormat) -> Result<Self> {
        Self::from_names(
            list.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty()),
            format,
        )
    }

    pub fn from_names<I, S>(names: I, format: &SummaryFormat) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut members = BTreeSet::new();
        for name in names {
            let name = name.into();
            if !format.can_encode(&name) {
                return Err(CoreError::invalid_roster(format!(
                    "'{}' cannot be written to a calendar summary",
                    name
                )));
            }
            if !members.insert(name.clone()) {
                return Err(CoreError::invalid_roster(format!(
                    "'{}' is listed more than once",
                    name
                )));
            }
        }

        if members.is_empty() {
            return Err(CoreError::invalid_roster("no members given"));
        }

        // Guild members are found by case-insensitive substring match, so
        // "Ann" and "Anna" would resolve to the same person.
        let lowered: Vec<(String, &String)> =
            members.iter().map(|m| (m.to_lowercase(), m)).collect();
        for (i, (a, a_name)) in lowered.iter().enumerate() {
            for (b, b_name) in lowered.iter().skip(i + 1) {
                if a.contains(b.as_str()) || b.contains(a.as_str()) {
                    return Err(CoreError::invalid_roster(format!(
                        "'{}' and '{}' overlap, use names that are not part of each other",
                        a_name, b_name
                    )));
                }
            }
        }

        Ok(Self { members })
    }

    pub fn members(&self) -> &BTreeSet<String> {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(String::as_str)
    }

    /// The comma-joined form written to guild configuration.
    pub fn to_stored(&self) -> String {
        self.iter().collect::<Vec<_>>().join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stored_list() {
        let format = SummaryFormat::default();
        let roster = Roster::parse("Bob, Alice,,Cecilia ", &format).unwrap();
        assert_eq!(roster.iter().collect::<Vec<_>>(), ["Alice", "Bob", "Cecilia"]);
        assert_eq!(roster.to_stored(), "Alice,Bob,Cecilia");
    }

    #[test]
    fn rejects_empty_and_duplicates() {
        let format = SummaryFormat::default();
        assert!(Roster::parse(" , ", &format).is_err());
        assert!(Roster::parse("Alice,Alice", &format).is_err());
    }

    #[test]
    fn rejects_overlapping_names() {
        let format = SummaryFormat::default();
        assert!(Roster::parse("Ann,Anna", &format).is_err());
        assert!(Roster::parse("ANNA,anna karin", &format).is_err());
        assert!(Roster::parse("Anna,Hanna", &format).is_err());
        assert!(Roster::parse("Anna,Bea", &format).is_ok());
    }

    #[test]
    fn rejects_marker_in_name() {
        let format = SummaryFormat::default();
        assert!(Roster::parse("Ansvarige,Bob", &format).is_err());
    }
}
