//! Per-member statistics over previous responsibility weeks.

use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberWeekStatistics {
    /// Responsibility weeks the member has had.
    pub week_count: u32,
    /// Times the member was responsible two entries in a row.
    pub repeat_count: u32,
    /// Times the member shared a week with each other member.
    pub pair_count: BTreeMap<String, u32>,
    /// The others in the member's latest week.
    pub most_recently_with: BTreeSet<String>,
}

impl MemberWeekStatistics {
    /// Number of shared weeks with any of the given members.
    pub fn pairings_with<'a>(&self, others: impl IntoIterator<Item = &'a String>) -> u32 {
        others
            .into_iter()
            .map(|other| self.pair_count.get(other).copied().unwrap_or(0))
            .sum()
    }
}

/// Walk the history oldest first and collect statistics for every member.
///
/// Only roster members get a record, each with a zero pair count for every
/// other roster member. Pairings with people who have since left the roster
/// are still counted on the remaining members' records.
pub fn analyze<'a, H>(members: &BTreeSet<String>, history: H) -> BTreeMap<String, MemberWeekStatistics>
where
    H: IntoIterator<Item = &'a BTreeSet<String>>,
{
    let mut stats: BTreeMap<String, MemberWeekStatistics> = members
        .iter()
        .map(|member| {
            let pair_count = members
                .iter()
                .filter(|other| *other != member)
                .map(|other| (other.clone(), 0))
                .collect();
            (
                member.clone(),
                MemberWeekStatistics {
                    pair_count,
                    ..Default::default()
                },
            )
        })
        .collect();

    let mut previous: Option<&BTreeSet<String>> = None;
    for week in history {
        for member in week {
            let Some(record) = stats.get_mut(member) else {
                continue;
            };
            record.week_count += 1;
            if previous.is_some_and(|previous| previous.contains(member)) {
                record.repeat_count += 1;
            }

            let others: BTreeSet<String> = week.iter().filter(|other| *other != member).cloned().collect();
            for other in &others {
                *record.pair_count.entry(other.clone()).or_insert(0) += 1;
            }
            record.most_recently_with = others;
        }
        previous = Some(week);
    }

    stats
}
