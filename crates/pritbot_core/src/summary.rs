//! Event summary encoding for responsibility weeks.
//!
//! A responsibility event's summary follows the grammar
//! `prefix SP name ("," SP name)*`, with names sorted. [`SummaryFormat`] owns
//! both directions: [`SummaryFormat::format`] writes a summary and
//! [`SummaryFormat::members`] reads one back, so a generated calendar is
//! recovered as exactly the groups that produced it.

use std::collections::BTreeSet;

use regex::{Regex, RegexBuilder};

use crate::error::{CoreError, Result};

/// Summary prefix written on generated events.
pub const DEFAULT_PREFIX: &str = "Ansvar:";

/// Marker that identifies a responsibility event, matched case-insensitively.
pub const DEFAULT_MARKER: &str = "ansvar";

/// Characters that separate member names in a summary.
const SEPARATORS: [char; 3] = [',', '\n', '\r'];

#[derive(Debug, Clone)]
pub struct SummaryFormat {
    prefix: String,
    leading_prefix: Regex,
    marker: Regex,
}

/// Case-insensitive match of `prefix` at the start of a summary.
fn leading_prefix(prefix: &str) -> Regex {
    RegexBuilder::new(&format!(r"^\s*{}", regex::escape(prefix)))
        .case_insensitive(true)
        .build()
        .expect("escaped prefix is a valid pattern")
}

impl SummaryFormat {
    /// Build a format from a prefix and a marker pattern.
    ///
    /// The marker is a regular expression compiled case-insensitively. The
    /// prefix must match the marker, and a group formatted with the prefix
    /// must read back as the same group.
    pub fn new(prefix: impl Into<String>, marker: &str) -> Result<Self> {
        let prefix = prefix.into().trim().to_string();
        let marker = RegexBuilder::new(marker)
            .case_insensitive(true)
            .build()
            .map_err(|cause| CoreError::InvalidMarker {
                pattern: marker.to_string(),
                cause,
            })?;

        if !marker.is_match(&prefix) {
            return Err(CoreError::PrefixWithoutMarker {
                prefix,
                marker: marker.as_str().to_string(),
            });
        }

        let format = Self {
            leading_prefix: leading_prefix(&prefix),
            prefix,
            marker,
        };
        let sample: BTreeSet<String> = ["Alice", "Bob"].map(String::from).into();
        if format.members(&format.format(&sample)) != sample {
            return Err(CoreError::UnreadablePrefix {
                prefix: format.prefix,
            });
        }
        Ok(format)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn marker(&self) -> &Regex {
        &self.marker
    }

    /// Whether a summary carries the responsibility marker.
    pub fn matches(&self, summary: &str) -> bool {
        self.marker.is_match(summary)
    }

    /// Encode a group of members as an event summary.
    ///
    /// `BTreeSet` iteration is sorted, which keeps the output deterministic.
    pub fn format(&self, members: &BTreeSet<String>) -> String {
        let names = members
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} {}", self.prefix, names)
    }

    /// Names in a summary, in the order they appear.
    ///
    /// Summaries starting with the prefix (ignoring case) have it cut off.
    /// Other summaries, typed by hand into the calendar, have every marker
    /// occurrence removed together with the colon that usually follows it.
    /// The rest is split on commas and line breaks and each token is
    /// trimmed. Empty tokens are dropped.
    pub fn names(&self, summary: &str) -> Vec<String> {
        let tokens = |text: &str| -> Vec<String> {
            text.split(SEPARATORS)
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        };

        if let Some(found) = self.leading_prefix.find(summary) {
            return tokens(&summary[found.end()..]);
        }

        summary
            .split(SEPARATORS)
            .filter_map(|segment| {
                let stripped = self.marker.replace_all(segment, "");
                let name = stripped
                    .trim()
                    .trim_start_matches(':')
                    .trim_end_matches(':')
                    .trim();
                (!name.is_empty()).then(|| name.to_string())
            })
            .collect()
    }

    /// The set of members encoded in a summary.
    pub fn members(&self, summary: &str) -> BTreeSet<String> {
        self.names(summary).into_iter().collect()
    }

    /// Whether a member name can be written and read back unchanged.
    pub fn can_encode(&self, name: &str) -> bool {
        let trimmed = name.trim();
        !trimmed.is_empty()
            && trimmed == name
            && !name.contains(SEPARATORS)
            && !name.starts_with(':')
            && !name.ends_with(':')
            && !self.marker.is_match(name)
    }
}

impl Default for SummaryFormat {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            leading_prefix: leading_prefix(DEFAULT_PREFIX),
            marker: RegexBuilder::new(DEFAULT_MARKER)
                .case_insensitive(true)
                .build()
                .expect("default marker is a valid pattern"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn formats_sorted_names_after_prefix() {
        let format = SummaryFormat::default();
        assert_eq!(
            format.format(&set(&["Bob", "Alice", "Cecilia"])),
            "Ansvar: Alice, Bob, Cecilia"
        );
    }

    #[test]
    fn reads_names_back() {
        let format = SummaryFormat::default();
        assert_eq!(format.names("Ansvar: Alice, Bob"), vec!["Alice", "Bob"]);
        assert_eq!(format.names("ansvar:Alice,  Bob ,"), vec!["Alice", "Bob"]);
        assert_eq!(format.names("Alice, Bob ANSVAR"), vec!["Alice", "Bob"]);
    }

    #[test]
    fn keeps_spaces_inside_names() {
        let format = SummaryFormat::default();
        assert_eq!(
            format.members("Ansvar: Anna Karin, Per"),
            set(&["Anna Karin", "Per"])
        );
    }

    #[test]
    fn summary_round_trips() {
        let format = SummaryFormat::default();
        let group = set(&["Östen", "Anna Karin", "a.b"]);
        assert_eq!(format.members(&format.format(&group)), group);
    }

    #[test]
    fn custom_marker_is_case_insensitive() {
        let format = SummaryFormat::new("Responsibility:", "responsib").unwrap();
        assert!(format.matches("RESPONSIBILITY week"));
        assert_eq!(
            format.members("Responsibility: Alice, Bob"),
            set(&["Alice", "Bob"])
        );
    }

    #[test]
    fn longer_prefix_round_trips() {
        let format = SummaryFormat::new("Ansvarsvecka:", "ansvar").unwrap();
        let group = set(&["Alice", "Bob"]);
        let summary = format.format(&group);
        assert_eq!(summary, "Ansvarsvecka: Alice, Bob");
        assert_eq!(format.members(&summary), group);
        assert_eq!(format.members("ANSVARSVECKA: Cecilia"), set(&["Cecilia"]));
        // Hand-written summaries still fall back to marker stripping.
        assert_eq!(format.members("Ansvar: Dennis"), set(&["Dennis"]));
    }

    #[test]
    fn custom_prefixes_read_back() {
        let group = set(&["Alice", "Bob", "Cecilia"]);
        for (prefix, marker) in [
            ("Ansvarsvecka:", "ansvar"),
            ("Veckans ansvar -", "ansvar"),
            ("Responsibility:", "responsib"),
            ("Ansvar, vecka", "ansvar"),
        ] {
            let format = SummaryFormat::new(prefix, marker).unwrap();
            assert_eq!(format.members(&format.format(&group)), group, "{}", prefix);
        }
    }

    #[test]
    fn prefix_must_contain_marker() {
        assert!(SummaryFormat::new("Duty:", "ansvar").is_err());
    }

    #[test]
    fn rejects_names_that_cannot_round_trip() {
        let format = SummaryFormat::default();
        assert!(format.can_encode("Alice"));
        assert!(!format.can_encode("Alice, Bob"));
        assert!(!format.can_encode("Ansvarig"));
        assert!(!format.can_encode(" Alice"));
        assert!(!format.can_encode(""));
    }
}
