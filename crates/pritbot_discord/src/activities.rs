//! Rotating presence activities.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use serenity::all::{ActivityData, Context};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum ActivityKind {
    #[default]
    Playing,
    Listening,
    Watching,
    Competing,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Activity {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ActivityKind,
}

impl Activity {
    pub fn to_activity_data(&self) -> ActivityData {
        match self.kind {
            ActivityKind::Playing => ActivityData::playing(&self.name),
            ActivityKind::Listening => ActivityData::listening(&self.name),
            ActivityKind::Watching => ActivityData::watching(&self.name),
            ActivityKind::Competing => ActivityData::competing(&self.name),
        }
    }
}

pub fn default_activities() -> Vec<Activity> {
    vec![Activity {
        name: "Dansbandstechno".to_string(),
        kind: ActivityKind::Listening,
    }]
}

/// Parse `[{ name, type }]`. Empty or invalid lists are `None`.
pub fn parse_activities(text: &str) -> Option<Vec<Activity>> {
    match serde_json::from_str::<Vec<Activity>>(text) {
        Ok(activities) if activities.is_empty() => {
            warn!("Empty activities list, using default activities");
            None
        }
        Ok(activities) => Some(activities),
        Err(e) => {
            warn!("Invalid activities, using default activities: {}", e);
            None
        }
    }
}

pub async fn load_activities(path: &Path) -> Vec<Activity> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => parse_activities(&text).unwrap_or_else(default_activities),
        Err(_) => default_activities(),
    }
}

/// Pick a random activity, never the previous one when there is a choice.
pub fn pick_activity<'a, R: Rng + ?Sized>(
    activities: &'a [Activity],
    previous: Option<&Activity>,
    rng: &mut R,
) -> Option<&'a Activity> {
    let candidates: Vec<&Activity> = match activities {
        [] => return None,
        [only] => return Some(only),
        _ => activities
            .iter()
            .filter(|activity| Some(*activity) != previous)
            .collect(),
    };
    if candidates.is_empty() {
        return activities.first();
    }
    Some(candidates[rng.random_range(0..candidates.len())])
}

/// Change the bot's activity every `interval`, re-reading the file each time.
pub async fn cycle_activities(ctx: Context, file: PathBuf, interval: Duration) {
    let mut previous: Option<Activity> = None;
    loop {
        let activities = load_activities(&file).await;
        let next = pick_activity(&activities, previous.as_ref(), &mut rand::rng()).cloned();
        if let Some(activity) = next {
            info!("Set activity to ({:?}) {}", activity.kind, activity.name);
            ctx.set_activity(Some(activity.to_activity_data()));
            previous = Some(activity);
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn activity(name: &str, kind: ActivityKind) -> Activity {
        Activity {
            name: name.to_string(),
            kind,
        }
    }

    #[test]
    fn parses_activity_files() {
        let parsed = parse_activities(
            r#"[{"name": "Kaffe", "type": "Watching"}, {"name": "Schack"}]"#,
        )
        .unwrap();
        assert_eq!(
            parsed,
            [
                activity("Kaffe", ActivityKind::Watching),
                activity("Schack", ActivityKind::Playing)
            ]
        );
        assert_eq!(parse_activities("[]"), None);
        assert_eq!(parse_activities(r#"[{"name": "x", "type": "Dancing"}]"#), None);
        assert_eq!(parse_activities("inte json"), None);
    }

    #[test]
    fn never_repeats_when_there_is_a_choice() {
        let activities = vec![
            activity("a", ActivityKind::Playing),
            activity("b", ActivityKind::Listening),
            activity("c", ActivityKind::Competing),
        ];
        let mut rng = StdRng::seed_from_u64(7);
        let mut previous = activities[0].clone();
        for _ in 0..50 {
            let next = pick_activity(&activities, Some(&previous), &mut rng).unwrap();
            assert_ne!(next, &previous);
            previous = next.clone();
        }
    }

    #[test]
    fn single_activity_repeats() {
        let activities = default_activities();
        let mut rng = StdRng::seed_from_u64(1);
        let picked = pick_activity(&activities, Some(&activities[0]), &mut rng);
        assert_eq!(picked.map(|a| a.name.as_str()), Some("Dansbandstechno"));
        assert!(pick_activity(&[], None, &mut rng).is_none());
    }

    #[tokio::test]
    async fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            load_activities(&dir.path().join("activities.json")).await,
            default_activities()
        );
    }
}
