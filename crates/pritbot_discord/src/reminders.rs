//! Daily reminders for the members with responsibility week.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use pritbot_core::rotation::{day_of_responsibility_week, responsible_at};
use pritbot_core::store::RemindersData;
use pritbot_core::{DailyTask, GuildSetting, TimeOfDay};
use serenity::all::{ChannelId, CreateEmbed, CreateMessage, GuildId, Http};
use tracing::{debug, info, warn};

use crate::bot::BotState;
use crate::error::{DiscordError, Result};
use crate::helpers::{MemberDirectory, ResolvedName, colours, day_name, fetch_members, parse_id};

pub fn reminders_title(date: NaiveDate) -> String {
    format!(
        "Ansvarsvecka Påminnelser {:02}/{:02}",
        date.day(),
        date.month()
    )
}

pub fn todo_list(messages: &[String]) -> String {
    messages
        .iter()
        .map(|message| format!("- {}", message))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Line pinging the responsible members, plain names for muted ones.
pub fn user_line(responsible: &[ResolvedName], reminders: &RemindersData) -> String {
    let users: Vec<String> = responsible
        .iter()
        .map(|resolved| match resolved.user {
            Some(user) if !reminders.is_muted(&user.get().to_string()) => resolved.label(),
            _ => resolved.name.clone(),
        })
        .collect();
    format!("-# Påminnelser för: {}", users.join(" "))
}

pub fn reminders_embed(date: NaiveDate, messages: &[String]) -> CreateEmbed {
    CreateEmbed::new()
        .title(reminders_title(date))
        .description("-# Använd `/reminders` kommandot om du inte vill bli pingad")
        .colour(colours::REMINDERS)
        .field("Att göra", todo_list(messages), false)
}

/// Every reminder of the guild, numbered per day.
pub fn reminders_list_embed(reminders: &RemindersData) -> CreateEmbed {
    let embed = CreateEmbed::new()
        .title("Påminnelser för Ansvarsveckor")
        .colour(colours::REMINDERS);
    let days = reminders.by_day();
    if days.is_empty() {
        return embed.description("Det finns inga påminnelser");
    }
    days.into_iter().fold(embed, |embed, (day, messages)| {
        let numbered = messages
            .iter()
            .enumerate()
            .map(|(i, message)| format!("{}. {}", i + 1, message))
            .collect::<Vec<_>>()
            .join("\n");
        embed.field(day_name(day), numbered, false)
    })
}

/// Post today's reminders in the announcement channel.
pub async fn send_reminders(http: &Http, state: &BotState, guild_id: GuildId) -> Result<()> {
    let guild = state.store.guild(guild_id.get()).await;
    let history = state.history(guild_id.get()).await?;
    let today = state.today();

    let day = u8::try_from(day_of_responsibility_week(&history, today)).unwrap_or(u8::MAX);
    let messages = guild.reminders.for_day(day);
    if messages.is_empty() {
        return Err(DiscordError::rejected(
            "Skickade inte påminnelser, inga påminnelser idag",
        ));
    }

    let responsible = responsible_at(&history, today)
        .ok_or_else(|| DiscordError::rejected("Det finns ingen ansvarig idag"))?;

    let channel: ChannelId = guild
        .announce_channel
        .as_deref()
        .and_then(parse_id)
        .ok_or(DiscordError::NotConfigured {
            setting: GuildSetting::Channel,
        })?;

    let members = fetch_members(http, guild_id).await?;
    let resolved = MemberDirectory::from_members(&members).resolve(&responsible.responsible);

    channel
        .send_message(
            http,
            CreateMessage::new()
                .content(user_line(&resolved, &guild.reminders))
                .embed(reminders_embed(today, messages)),
        )
        .await?;
    info!(guild_id = guild_id.get(), day, "sent {} reminders", messages.len());
    Ok(())
}

pub struct ReminderTask {
    state: Arc<BotState>,
    http: Arc<Http>,
}

impl ReminderTask {
    pub fn new(state: Arc<BotState>, http: Arc<Http>) -> Self {
        Self { state, http }
    }
}

#[async_trait]
impl DailyTask for ReminderTask {
    async fn wake_time(&self, guild_id: u64) -> Option<TimeOfDay> {
        let guild = self.state.store.guild(guild_id).await;
        Some(self.state.reminders_time(&guild))
    }

    async fn run(&self, guild_id: u64) {
        debug!(guild_id, "sending reminders");
        match send_reminders(&self.http, &self.state, GuildId::new(guild_id)).await {
            Ok(()) => {}
            Err(DiscordError::Rejected(reason)) => debug!(guild_id, "{}", reason),
            Err(e) => warn!(guild_id, "failed to send reminders: {:?}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::all::UserId;

    #[test]
    fn title_uses_day_and_month() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(reminders_title(date), "Ansvarsvecka Påminnelser 09/03");
    }

    #[test]
    fn todo_list_is_bulleted() {
        assert_eq!(
            todo_list(&["Städa".to_string(), "Handla".to_string()]),
            "- Städa\n- Handla"
        );
    }

    #[test]
    fn muted_users_are_not_pinged() {
        let mut reminders = RemindersData::default();
        reminders.mute("2").unwrap();
        let responsible = [
            ResolvedName {
                name: "Alice".into(),
                user: Some(UserId::new(1)),
            },
            ResolvedName {
                name: "Bob".into(),
                user: Some(UserId::new(2)),
            },
            ResolvedName {
                name: "Eve".into(),
                user: None,
            },
        ];
        assert_eq!(
            user_line(&responsible, &reminders),
            "-# Påminnelser för: <@1> Bob Eve"
        );
    }
}
