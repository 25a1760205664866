//! JSON document store for per-guild settings.
//!
//! The whole document is kept in memory behind an async mutex and written
//! back after every change through a temporary file and a rename, so a crash
//! mid-write leaves the previous document in place.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::schedule::TimeOfDay;

/// Days of a responsibility week that reminders can be attached to.
pub const REMINDER_DAYS: std::ops::RangeInclusive<u8> = 1..=7;

#[derive(Error, Diagnostic, Debug)]
pub enum StoreError {
    #[error("Failed to read or write {}", .path.display())]
    #[diagnostic(code(pritbot_core::store::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not a valid data document", .path.display())]
    #[diagnostic(
        code(pritbot_core::store::json),
        help("Fix or remove the file, a missing file starts an empty document")
    )]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Day {day} is not a day of the responsibility week")]
    #[diagnostic(code(pritbot_core::store::invalid_day), help("Use a day from 1 to 7"))]
    InvalidDay { day: u8 },

    #[error("There are no reminders on day {day}")]
    #[diagnostic(code(pritbot_core::store::no_reminders))]
    NoReminders { day: u8 },

    #[error("There is no reminder number {index} on day {day}")]
    #[diagnostic(code(pritbot_core::store::no_such_reminder))]
    NoSuchReminder { day: u8, index: usize },

    #[error("Reminders are already muted")]
    #[diagnostic(code(pritbot_core::store::already_muted))]
    AlreadyMuted,

    #[error("Reminders are not muted")]
    #[diagnostic(code(pritbot_core::store::not_muted))]
    NotMuted,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The full data document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookit_cookie: Option<String>,
    #[serde(default)]
    pub guilds: BTreeMap<String, GuildData>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Settings and state for one guild.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announce_channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responsible_role: Option<String>,
    /// Role that is reminded to schedule new responsibility weeks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responsible_responsible_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responsible_calendar_url: Option<String>,
    /// Comma-joined roster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_time"
    )]
    pub announce_time: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_time"
    )]
    pub reminders_time: Option<String>,
    /// Reaction id to the id of the user who first triggered it.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub discovered_reactions: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub no_react_channels: Vec<String>,
    #[serde(default)]
    pub reminders: RemindersData,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Accept both `"HH:MM"` strings and milliseconds since midnight.
fn deserialize_time<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(time)) => Some(time),
        Some(Value::Number(ms)) => ms.as_u64().map(|ms| {
            let minutes = ms / 60_000;
            let seconds = (ms / 1000) % 60;
            if seconds == 0 {
                format!("{:02}:{:02}", (minutes / 60) % 24, minutes % 60)
            } else {
                format!("{:02}:{:02}:{:02}", (minutes / 60) % 24, minutes % 60, seconds)
            }
        }),
        _ => None,
    })
}

impl GuildData {
    pub fn announce_time(&self) -> Option<TimeOfDay> {
        self.announce_time.as_deref().and_then(|time| time.parse().ok())
    }

    pub fn reminders_time(&self) -> Option<TimeOfDay> {
        self.reminders_time.as_deref().and_then(|time| time.parse().ok())
    }

    pub fn no_react_channels(&self) -> BTreeSet<&str> {
        self.no_react_channels.iter().map(String::as_str).collect()
    }

    /// Record who discovered a reaction, or forget it with `None`.
    pub fn set_discoverer(&mut self, reaction_id: &str, user_id: Option<String>) {
        match user_id {
            Some(user_id) => {
                self.discovered_reactions.insert(reaction_id.to_string(), user_id);
            }
            None => {
                self.discovered_reactions.remove(reaction_id);
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemindersData {
    /// Reminders per day of the responsibility week, keyed "1" to "7".
    #[serde(default)]
    pub days: BTreeMap<String, Vec<String>>,
    /// Users who do not want to be pinged.
    #[serde(default)]
    pub muted: Vec<String>,
}

impl RemindersData {
    pub fn for_day(&self, day: u8) -> &[String] {
        self.days
            .get(&day.to_string())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Days with reminders, in order.
    pub fn by_day(&self) -> Vec<(u8, &[String])> {
        let mut days: Vec<(u8, &[String])> = self
            .days
            .iter()
            .filter_map(|(day, messages)| Some((day.parse().ok()?, messages.as_slice())))
            .collect();
        days.sort_by_key(|(day, _)| *day);
        days
    }

    pub fn add(&mut self, day: u8, message: impl Into<String>) -> StoreResult<()> {
        if !REMINDER_DAYS.contains(&day) {
            return Err(StoreError::InvalidDay { day });
        }
        self.days
            .entry(day.to_string())
            .or_default()
            .push(message.into());
        Ok(())
    }

    /// Remove the `index`-th (1-based) reminder of a day and return it.
    pub fn remove(&mut self, day: u8, index: usize) -> StoreResult<String> {
        let key = day.to_string();
        let Some(messages) = self.days.get_mut(&key) else {
            return Err(StoreError::NoReminders { day });
        };
        if index == 0 || index > messages.len() {
            return Err(StoreError::NoSuchReminder { day, index });
        }
        let removed = messages.remove(index - 1);
        if messages.is_empty() {
            self.days.remove(&key);
        }
        Ok(removed)
    }

    pub fn is_muted(&self, user_id: &str) -> bool {
        self.muted.iter().any(|muted| muted == user_id)
    }

    pub fn mute(&mut self, user_id: impl Into<String>) -> StoreResult<()> {
        let user_id = user_id.into();
        if self.is_muted(&user_id) {
            return Err(StoreError::AlreadyMuted);
        }
        self.muted.push(user_id);
        Ok(())
    }

    pub fn unmute(&mut self, user_id: &str) -> StoreResult<()> {
        let before = self.muted.len();
        self.muted.retain(|muted| muted != user_id);
        if self.muted.len() == before {
            return Err(StoreError::NotMuted);
        }
        Ok(())
    }
}

/// Guild settings reachable through `/config <key>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuildSetting {
    Calendar,
    Channel,
    Role,
    ScheduleRole,
    AnnounceTime,
    RemindersTime,
    Members,
}

impl GuildSetting {
    pub const ALL: [GuildSetting; 7] = [
        GuildSetting::Calendar,
        GuildSetting::Channel,
        GuildSetting::Role,
        GuildSetting::ScheduleRole,
        GuildSetting::AnnounceTime,
        GuildSetting::RemindersTime,
        GuildSetting::Members,
    ];

    /// Name used as the `/config` subcommand group.
    pub fn key(&self) -> &'static str {
        match self {
            GuildSetting::Calendar => "calendar",
            GuildSetting::Channel => "channel",
            GuildSetting::Role => "role",
            GuildSetting::ScheduleRole => "schedulerole",
            GuildSetting::AnnounceTime => "announcetime",
            GuildSetting::RemindersTime => "reminderstime",
            GuildSetting::Members => "members",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|setting| setting.key() == key)
    }

    /// Human readable name shown in replies.
    pub fn pretty_name(&self) -> &'static str {
        match self {
            GuildSetting::Calendar => "Länk till kalendern",
            GuildSetting::Channel => "Kanal för utskick",
            GuildSetting::Role => "Roll som har ansvarsvecka",
            GuildSetting::ScheduleRole => "Roll som har ansvar att sätta ansvarsveckor",
            GuildSetting::AnnounceTime => "Tid för utskick",
            GuildSetting::RemindersTime => "Tid för påminnelser",
            GuildSetting::Members => "Medlemmar i ansvarsrotationen",
        }
    }

    pub fn get<'a>(&self, data: &'a GuildData) -> Option<&'a str> {
        match self {
            GuildSetting::Calendar => data.responsible_calendar_url.as_deref(),
            GuildSetting::Channel => data.announce_channel.as_deref(),
            GuildSetting::Role => data.responsible_role.as_deref(),
            GuildSetting::ScheduleRole => data.responsible_responsible_role.as_deref(),
            GuildSetting::AnnounceTime => data.announce_time.as_deref(),
            GuildSetting::RemindersTime => data.reminders_time.as_deref(),
            GuildSetting::Members => data.members.as_deref(),
        }
    }

    pub fn set(&self, data: &mut GuildData, value: Option<String>) {
        let slot = match self {
            GuildSetting::Calendar => &mut data.responsible_calendar_url,
            GuildSetting::Channel => &mut data.announce_channel,
            GuildSetting::Role => &mut data.responsible_role,
            GuildSetting::ScheduleRole => &mut data.responsible_responsible_role,
            GuildSetting::AnnounceTime => &mut data.announce_time,
            GuildSetting::RemindersTime => &mut data.reminders_time,
            GuildSetting::Members => &mut data.members,
        };
        *slot = value;
    }
}

/// Shared handle to the data document on disk.
#[derive(Debug)]
pub struct GuildStore {
    path: PathBuf,
    data: Mutex<BotData>,
}

impl GuildStore {
    /// Load the document, starting empty when the file does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(text) if text.trim().is_empty() => BotData::default(),
            Ok(text) => serde_json::from_str(&text).map_err(|source| StoreError::Json {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No data file at {}, starting empty", path.display());
                BotData::default()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        debug!(guilds = data.guilds.len(), "loaded guild data");
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A copy of a guild's data, empty for unknown guilds.
    pub async fn guild(&self, guild_id: u64) -> GuildData {
        self.data
            .lock()
            .await
            .guilds
            .get(&guild_id.to_string())
            .cloned()
            .unwrap_or_default()
    }

    pub async fn guild_ids(&self) -> Vec<u64> {
        self.data
            .lock()
            .await
            .guilds
            .keys()
            .filter_map(|id| id.parse().ok())
            .collect()
    }

    pub async fn bookit_cookie(&self) -> Option<String> {
        self.data.lock().await.bookit_cookie.clone()
    }

    /// Modify a guild's data and persist the document.
    ///
    /// Nothing is written when `update` fails. The lock is held across the
    /// write so concurrent updates never interleave.
    pub async fn update_guild<F, R>(&self, guild_id: u64, update: F) -> StoreResult<R>
    where
        F: FnOnce(&mut GuildData) -> StoreResult<R>,
    {
        let mut data = self.data.lock().await;
        let key = guild_id.to_string();
        let mut guild = data.guilds.get(&key).cloned().unwrap_or_default();
        let result = update(&mut guild)?;
        data.guilds.insert(key, guild);
        self.persist(&data).await?;
        Ok(result)
    }

    pub async fn add_reminder(&self, guild_id: u64, day: u8, message: &str) -> StoreResult<()> {
        self.update_guild(guild_id, |guild| guild.reminders.add(day, message))
            .await
    }

    pub async fn remove_reminder(&self, guild_id: u64, day: u8, index: usize) -> StoreResult<String> {
        self.update_guild(guild_id, |guild| guild.reminders.remove(day, index))
            .await
    }

    pub async fn mute_reminders(&self, guild_id: u64, user_id: &str) -> StoreResult<()> {
        self.update_guild(guild_id, |guild| guild.reminders.mute(user_id))
            .await
    }

    pub async fn unmute_reminders(&self, guild_id: u64, user_id: &str) -> StoreResult<()> {
        self.update_guild(guild_id, |guild| guild.reminders.unmute(user_id))
            .await
    }

    pub async fn set_discoverer(
        &self,
        guild_id: u64,
        reaction_id: &str,
        user_id: Option<String>,
    ) -> StoreResult<()> {
        self.update_guild(guild_id, |guild| {
            guild.set_discoverer(reaction_id, user_id);
            Ok(())
        })
        .await
    }

    pub async fn set_no_react_channels(
        &self,
        guild_id: u64,
        channels: impl IntoIterator<Item = String>,
    ) -> StoreResult<()> {
        let channels: BTreeSet<String> = channels.into_iter().collect();
        self.update_guild(guild_id, |guild| {
            guild.no_react_channels = channels.into_iter().collect();
            Ok(())
        })
        .await
    }

    async fn persist(&self, data: &BotData) -> StoreResult<()> {
        let text = serde_json::to_string_pretty(data).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, text)
            .await
            .map_err(|source| StoreError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| StoreError::Io {
                path: self.path.clone(),
                source,
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reads_existing_documents() {
        let text = r#"{
            "bookitCookie": "secret",
            "guilds": {
                "123": {
                    "announceChannel": "456",
                    "announceTime": 28800000,
                    "remindersTime": "09:30",
                    "discoveredReactions": {"hej": "789"},
                    "reminders": {"days": {"1": ["Städa"], "5": ["Handla", "Diska"]}, "muted": ["789"]},
                    "setupDone": true
                }
            }
        }"#;
        let data: BotData = serde_json::from_str(text).unwrap();
        let guild = &data.guilds["123"];

        assert_eq!(data.bookit_cookie.as_deref(), Some("secret"));
        assert_eq!(guild.announce_channel.as_deref(), Some("456"));
        assert_eq!(guild.announce_time.as_deref(), Some("08:00"));
        assert_eq!(guild.reminders_time(), TimeOfDay::new(9, 30));
        assert_eq!(guild.reminders.for_day(5), ["Handla", "Diska"]);
        assert!(guild.reminders.is_muted("789"));
        assert_eq!(guild.extra["setupDone"], Value::Bool(true));

        let written = serde_json::to_value(&data).unwrap();
        assert_eq!(written["guilds"]["123"]["reminders"]["days"]["5"][1], "Diska");
        assert_eq!(written["guilds"]["123"]["setupDone"], true);
        assert_eq!(written["guilds"]["123"]["announceTime"], "08:00");
    }

    #[test]
    fn removing_last_reminder_drops_the_day() {
        let mut reminders = RemindersData::default();
        reminders.add(2, "Städa").unwrap();
        reminders.add(2, "Diska").unwrap();

        assert!(matches!(reminders.remove(2, 3), Err(StoreError::NoSuchReminder { day: 2, index: 3 })));
        assert!(matches!(reminders.remove(4, 1), Err(StoreError::NoReminders { day: 4 })));
        assert_eq!(reminders.remove(2, 1).unwrap(), "Städa");
        assert_eq!(reminders.remove(2, 1).unwrap(), "Diska");
        assert!(reminders.days.is_empty());
        assert!(matches!(reminders.add(8, "x"), Err(StoreError::InvalidDay { day: 8 })));
    }

    #[test]
    fn mute_and_unmute_report_state() {
        let mut reminders = RemindersData::default();
        reminders.mute("1").unwrap();
        assert!(matches!(reminders.mute("1"), Err(StoreError::AlreadyMuted)));
        reminders.unmute("1").unwrap();
        assert!(matches!(reminders.unmute("1"), Err(StoreError::NotMuted)));
    }

    #[test]
    fn settings_map_to_fields() {
        let mut guild = GuildData::default();
        for setting in GuildSetting::ALL {
            assert_eq!(GuildSetting::from_key(setting.key()), Some(setting));
            setting.set(&mut guild, Some(setting.key().to_string()));
            assert_eq!(setting.get(&guild), Some(setting.key()));
        }
        assert_eq!(guild.responsible_responsible_role.as_deref(), Some("schedulerole"));
        GuildSetting::Members.set(&mut guild, None);
        assert_eq!(guild.members, None);
    }

    #[tokio::test]
    async fn updates_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.json");

        let store = GuildStore::open(&path).await.unwrap();
        assert_eq!(store.guild(1).await, GuildData::default());

        store.add_reminder(1, 3, "Sopor").await.unwrap();
        store
            .set_no_react_channels(1, ["20".to_string(), "10".to_string(), "20".to_string()])
            .await
            .unwrap();
        store.set_discoverer(1, "hej", Some("99".into())).await.unwrap();
        assert!(store.remove_reminder(1, 3, 2).await.is_err());

        let reopened = GuildStore::open(&path).await.unwrap();
        let guild = reopened.guild(1).await;
        assert_eq!(guild.reminders.for_day(3), ["Sopor"]);
        assert_eq!(guild.no_react_channels, ["10", "20"]);
        assert_eq!(guild.discovered_reactions["hej"], "99");
        assert_eq!(reopened.guild_ids().await, vec![1]);
    }
}
