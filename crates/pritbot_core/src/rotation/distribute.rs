//! Greedy distribution of members into responsibility weeks.

use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroUsize;

use super::stats::{MemberWeekStatistics, analyze};

/// Default number of members responsible per week.
pub const DEFAULT_GROUP_SIZE: NonZeroUsize = match NonZeroUsize::new(2) {
    Some(size) => size,
    None => unreachable!(),
};

/// Ordering key for picking the next member of a week; lowest wins.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Priority<'a> {
    week_count: u32,
    in_previous_week: bool,
    repeat_count: u32,
    pairings_in_week: u32,
    recently_with_in_week: usize,
    name: &'a str,
}

fn priority<'a>(
    name: &'a str,
    stats: Option<&MemberWeekStatistics>,
    previous_week: &BTreeSet<String>,
    chosen: &BTreeSet<String>,
) -> Priority<'a> {
    let (week_count, repeat_count, pairings_in_week, recently_with_in_week) = match stats {
        Some(stats) => (
            stats.week_count,
            stats.repeat_count,
            stats.pairings_with(chosen),
            stats.most_recently_with.intersection(chosen).count(),
        ),
        None => (0, 0, 0, 0),
    };
    Priority {
        week_count,
        in_previous_week: previous_week.contains(name),
        repeat_count,
        pairings_in_week,
        recently_with_in_week,
        name,
    }
}

type Stats = BTreeMap<String, MemberWeekStatistics>;

/// Earlier pairings inside the week, then pairs that were together in their
/// latest week. Each pair is counted from both sides.
fn week_cost(week: &BTreeSet<String>, stats: &Stats) -> (u32, usize) {
    week.iter()
        .filter_map(|member| stats.get(member))
        .fold((0, 0), |(pairings, recent), record| {
            (
                pairings + record.pairings_with(week),
                recent + record.most_recently_with.intersection(week).count(),
            )
        })
}

fn rotation_cost(weeks: &[BTreeSet<String>], stats: &Stats) -> (u32, usize) {
    weeks
        .iter()
        .map(|week| week_cost(week, stats))
        .fold((0, 0), |(a, b), (c, d)| (a + c, b + d))
}

/// Members holding two consecutive weeks, starting from the last history week.
fn back_to_back(last_week: &BTreeSet<String>, weeks: &[BTreeSet<String>]) -> usize {
    std::iter::once(last_week)
        .chain(weeks.iter())
        .zip(weeks.iter())
        .map(|(before, after)| before.intersection(after).count())
        .sum()
}

/// Exchanges of two members with the same week count between two weeks.
fn exchanges<'w>(
    weeks: &'w [BTreeSet<String>],
    stats: &'w Stats,
) -> impl Iterator<Item = (usize, &'w str, usize, &'w str)> + 'w {
    let week_count = move |name: &str| stats.get(name).map(|record| record.week_count);
    (0..weeks.len()).flat_map(move |i| {
        (i + 1..weeks.len()).flat_map(move |j| {
            weeks[i].iter().flat_map(move |x| {
                weeks[j]
                    .iter()
                    .filter(move |y| week_count(x.as_str()) == week_count(y.as_str()))
                    .map(move |y| (i, x.as_str(), j, y.as_str()))
            })
        })
    })
}

fn exchanged(weeks: &[BTreeSet<String>], (i, x, j, y): (usize, &str, usize, &str)) -> Vec<BTreeSet<String>> {
    let mut next = weeks.to_vec();
    next[i].remove(x);
    next[i].insert(y.to_string());
    next[j].remove(y);
    next[j].insert(x.to_string());
    next
}

/// Exchange members between weeks while that lowers the rotation cost.
///
/// A single exchange is tried first, then a pair of exchanges, which gets out
/// of rotations where the last weeks are left with only repeated pairs. The
/// back-to-back count never grows and week count order is kept.
fn improve(weeks: &mut Vec<BTreeSet<String>>, stats: &Stats, last_week: &BTreeSet<String>) {
    loop {
        let current = weeks.as_slice();
        let cost = rotation_cost(current, stats);
        let overlap = back_to_back(last_week, current);
        let better = |candidate: &[BTreeSet<String>]| {
            rotation_cost(candidate, stats) < cost && back_to_back(last_week, candidate) <= overlap
        };

        let next = exchanges(current, stats)
            .map(|exchange| exchanged(current, exchange))
            .find(|candidate| better(candidate.as_slice()))
            .or_else(|| {
                exchanges(current, stats).find_map(|exchange| {
                    let middle = exchanged(current, exchange);
                    exchanges(&middle, stats)
                        .map(|second| exchanged(&middle, second))
                        .find(|candidate| better(candidate.as_slice()))
                })
            });

        match next {
            Some(next) => *weeks = next,
            None => break,
        }
    }
}

/// Split members into weeks of `group_size`, oldest history first.
///
/// Weeks are filled one at a time. Each slot takes the remaining member who
/// has had the fewest weeks, preferring members that were not responsible
/// the week before (the last history entry for the first week), then fewer
/// back-to-back repeats, then fewer earlier pairings with the members already
/// in the week, then not having just worked with them, then name order.
///
/// The greedy fill is then improved by exchanging members with equal week
/// counts between weeks.
///
/// The weeks are disjoint and together hold every member. All of them have
/// `group_size` members except possibly the last.
pub fn distribute_members<'a, H>(
    members: &BTreeSet<String>,
    history: H,
    group_size: NonZeroUsize,
) -> Vec<BTreeSet<String>>
where
    H: IntoIterator<Item = &'a BTreeSet<String>>,
{
    let history: Vec<&BTreeSet<String>> = history.into_iter().collect();
    let stats = analyze(members, history.iter().copied());

    let group_size = group_size.get();
    let mut remaining: BTreeSet<&str> = members.iter().map(String::as_str).collect();
    let mut weeks: Vec<BTreeSet<String>> = Vec::with_capacity(members.len().div_ceil(group_size));
    let last_week: BTreeSet<String> = history.last().map(|week| (*week).clone()).unwrap_or_default();
    let mut previous_week = last_week.clone();

    while !remaining.is_empty() {
        let target = group_size.min(remaining.len());
        let mut week = BTreeSet::new();

        while week.len() < target {
            let Some(next) = remaining
                .iter()
                .copied()
                .min_by_key(|name| priority(*name, stats.get(*name), &previous_week, &week))
            else {
                break;
            };
            remaining.remove(next);
            week.insert(next.to_string());
        }

        previous_week = week.clone();
        weeks.push(week);
    }
    improve(&mut weeks, &stats, &last_week);

    tracing::debug!(
        members = members.len(),
        history = history.len(),
        weeks = weeks.len(),
        "distributed responsibility weeks"
    );
    weeks
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn no_history() -> Vec<BTreeSet<String>> {
        Vec::new()
    }

    #[test]
    fn empty_history_is_alphabetical() {
        assert_eq!(
            distribute_members(&set(&["D", "B", "A", "C"]), &no_history(), size(2)),
            vec![set(&["A", "B"]), set(&["C", "D"])]
        );
        assert_eq!(
            distribute_members(&set(&["A", "B", "C"]), &no_history(), size(2)),
            vec![set(&["A", "B"]), set(&["C"])]
        );
    }

    #[test]
    fn degenerate_inputs() {
        assert!(distribute_members(&BTreeSet::new(), &no_history(), size(2)).is_empty());
        assert_eq!(
            distribute_members(&set(&["A", "B", "C"]), &no_history(), size(5)),
            vec![set(&["A", "B", "C"])]
        );
    }

    #[test]
    fn avoids_repeating_last_week() {
        let history = vec![set(&["A", "B"])];
        let weeks = distribute_members(&set(&["A", "B", "C", "D"]), &history, size(2));
        assert_ne!(weeks[0], set(&["A", "B"]));
        assert_eq!(weeks[0], set(&["C", "D"]));
    }

    #[test]
    fn members_with_fewer_weeks_go_first() {
        let history = vec![set(&["A", "B"]), set(&["C", "A"]), set(&["B", "C"])];
        let weeks = distribute_members(&set(&["A", "B", "C", "D", "E"]), &history, size(2));
        assert_eq!(weeks[0], set(&["D", "E"]));
        assert_eq!(weeks.len(), 3);
    }

    #[test]
    fn prefers_new_pairs() {
        // Everyone has one week; A and B were paired before.
        let history = vec![set(&["A", "B"]), set(&["C", "D"]), set(&["E", "F"])];
        let weeks = distribute_members(&set(&["A", "B", "C", "D", "E", "F"]), &history, size(2));
        // E and F were in the previous week, so A goes first and avoids B.
        assert_eq!(weeks[0], set(&["A", "C"]));
    }

    #[test]
    fn exchanges_out_of_repeated_pairs() {
        // Three earlier rotations of six; every pair left for the last slots
        // would repeat under the plain greedy fill.
        let history = vec![
            set(&["A", "B"]),
            set(&["C", "D"]),
            set(&["E", "F"]),
            set(&["A", "C"]),
            set(&["D", "E"]),
            set(&["B", "F"]),
            set(&["A", "E"]),
            set(&["B", "C"]),
            set(&["D", "F"]),
        ];
        let weeks = distribute_members(&set(&["A", "B", "C", "D", "E", "F"]), &history, size(2));
        assert_eq!(weeks, vec![set(&["B", "E"]), set(&["A", "D"]), set(&["C", "F"])]);
    }

    #[test]
    fn exchanges_keep_week_count_order() {
        let history = vec![set(&["A", "B"]), set(&["A", "C"]), set(&["B", "D"])];
        let stats = analyze(&set(&["A", "B", "C", "D", "E", "F"]), &history);
        let mut weeks = vec![set(&["E", "F"]), set(&["C", "D"]), set(&["A", "B"])];
        improve(&mut weeks, &stats, &set(&["B", "D"]));
        // Members with equal week counts already share a week, so nobody moves.
        assert_eq!(weeks, vec![set(&["E", "F"]), set(&["C", "D"]), set(&["A", "B"])]);
    }

    #[test]
    fn result_covers_roster_and_respects_size() {
        let roster: BTreeSet<String> = (0..11).map(|i| format!("M{:02}", i)).collect();
        let history = vec![set(&["M01", "M02", "M03"]), set(&["M04", "M05", "M06"])];
        let weeks = distribute_members(&roster, &history, size(3));

        assert_eq!(weeks.len(), 4);
        assert!(weeks[..3].iter().all(|week| week.len() == 3));
        assert_eq!(weeks[3].len(), 2);

        let mut seen = BTreeSet::new();
        for week in &weeks {
            for member in week {
                assert!(seen.insert(member.clone()), "{} scheduled twice", member);
            }
        }
        assert_eq!(seen, roster);
    }

    #[test]
    fn is_deterministic() {
        let roster = set(&["Alice", "Bob", "Cecilia", "Dave", "Eve"]);
        let history = vec![set(&["Alice", "Eve"]), set(&["Bob", "Dave"])];
        let first = distribute_members(&roster, &history, size(2));
        for _ in 0..10 {
            assert_eq!(distribute_members(&roster, &history, size(2)), first);
        }
    }
}
