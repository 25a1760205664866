//! Weekly "new week" announcements and the scheduling reminder.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Days;
use pritbot_core::rotation::responsible_at;
use pritbot_core::{DailyTask, GuildSetting, TimeOfDay};
use serenity::all::{ChannelId, CreateMessage, GuildId, Http, Member, RoleId};
use tracing::{debug, info, warn};

use crate::bot::BotState;
use crate::error::{DiscordError, Result};
use crate::helpers::{
    MemberDirectory, ResolvedName, fetch_members, is_announcement_day, is_scheduling_day,
    join_names, parse_id,
};

const HEART: &str = "<:pixelnheart:1318195394781384714>";

/// Announcement text for a week, given the study week label.
pub fn announcement_text(week_label: &str, responsible: Option<&[ResolvedName]>) -> String {
    let line = match responsible {
        Some(names) if !names.is_empty() => {
            let labels: Vec<String> = names.iter().map(ResolvedName::label).collect();
            format!(
                "{} har {} ansvarsvecka, gör ert bästa men slit inte ut er! {}",
                week_label,
                join_names(&labels),
                HEART
            )
        }
        _ => format!(
            "{} gick det inte att hitta någon ansvarsvecka för :thinking:",
            week_label
        ),
    };
    format!("### Det är en ny vecka!\n{}", line)
}

pub const SCHEDULING_REMINDER: &str = "Hej! Jag märkte att det inte finns någon som har ansvarsvecka nästa vecka så tänkte påminna dig :blush:";

/// Post this week's announcement and move the responsible role.
pub async fn announce_week(http: &Http, state: &BotState, guild_id: GuildId) -> Result<()> {
    let guild = state.store.guild(guild_id.get()).await;
    let channel: ChannelId = guild
        .announce_channel
        .as_deref()
        .and_then(parse_id)
        .ok_or(DiscordError::NotConfigured {
            setting: GuildSetting::Channel,
        })?;

    let week = state
        .web
        .study_week()
        .await
        .ok_or_else(|| DiscordError::rejected("Kunde inte hämta veckan"))?;

    let history = state.history(guild_id.get()).await?;
    let members = fetch_members(http, guild_id).await?;
    let directory = MemberDirectory::from_members(&members);

    let resolved = responsible_at(&history, state.today())
        .map(|current| directory.resolve(&current.responsible));

    channel
        .send_message(
            http,
            CreateMessage::new().content(announcement_text(&week, resolved.as_deref())),
        )
        .await?;
    info!(guild_id = guild_id.get(), "announced {}", week);

    if let Some(resolved) = &resolved {
        match guild.responsible_role.as_deref().and_then(parse_id::<RoleId>) {
            Some(role) => assign_role(http, &members, role, resolved).await,
            None => warn!(guild_id = guild_id.get(), "no responsible role set, not assigning"),
        }
    }
    Ok(())
}

/// Give `role` to exactly the resolved members.
async fn assign_role(http: &Http, members: &[Member], role: RoleId, responsible: &[ResolvedName]) {
    let holders: Vec<&Member> = members
        .iter()
        .filter(|member| member.roles.contains(&role))
        .collect();
    debug!("removing role {} from {} members", role, holders.len());
    for member in holders {
        if responsible.iter().any(|name| name.user == Some(member.user.id)) {
            continue;
        }
        if let Err(e) = member.remove_role(http, role).await {
            warn!("failed to remove role from {}: {}", member.display_name(), e);
        }
    }

    for name in responsible {
        let Some(member) = name
            .user
            .and_then(|id| members.iter().find(|member| member.user.id == id))
        else {
            warn!("failed to assign role to {}, unable to find user", name.name);
            continue;
        };
        if member.roles.contains(&role) {
            continue;
        }
        match member.add_role(http, role).await {
            Ok(()) => info!("assigned role to {} ({})", name.name, member.display_name()),
            Err(e) => warn!("failed to assign role to {}: {}", name.name, e),
        }
    }
}

/// DM the schedule role when nobody is responsible next week.
///
/// Returns whether any reminder was sent.
pub async fn remind_schedulers(http: &Http, state: &BotState, guild_id: GuildId) -> Result<bool> {
    let history = state.history(guild_id.get()).await?;
    let next_week = state.today() + Days::new(7);
    if responsible_at(&history, next_week).is_some_and(|week| !week.responsible.is_empty()) {
        return Ok(false);
    }

    let guild = state.store.guild(guild_id.get()).await;
    let role: RoleId = guild
        .responsible_responsible_role
        .as_deref()
        .and_then(parse_id)
        .ok_or(DiscordError::NotConfigured {
            setting: GuildSetting::ScheduleRole,
        })?;

    let members = fetch_members(http, guild_id).await?;
    let schedulers: Vec<&Member> = members
        .iter()
        .filter(|member| member.roles.contains(&role))
        .collect();
    if schedulers.is_empty() {
        warn!(guild_id = guild_id.get(), "nobody has the schedule role");
        return Ok(false);
    }

    for member in schedulers {
        debug!(
            "sending scheduling reminder to {} ({})",
            member.user.id,
            member.display_name()
        );
        if let Err(e) = member
            .user
            .direct_message(http, CreateMessage::new().content(SCHEDULING_REMINDER))
            .await
        {
            warn!("failed to DM {}: {}", member.display_name(), e);
        }
    }
    Ok(true)
}

pub struct AnnouncementTask {
    state: Arc<BotState>,
    http: Arc<Http>,
}

impl AnnouncementTask {
    pub fn new(state: Arc<BotState>, http: Arc<Http>) -> Self {
        Self { state, http }
    }
}

#[async_trait]
impl DailyTask for AnnouncementTask {
    async fn wake_time(&self, guild_id: u64) -> Option<TimeOfDay> {
        let guild = self.state.store.guild(guild_id).await;
        Some(self.state.announce_time(&guild))
    }

    async fn run(&self, guild_id: u64) {
        let today = self.state.today();
        let guild = GuildId::new(guild_id);

        if is_announcement_day(today) {
            debug!(guild_id, "sending announcements");
            if let Err(e) = announce_week(&self.http, &self.state, guild).await {
                warn!(guild_id, "failed to make announcement: {:?}", e);
            }
        }

        if is_scheduling_day(today) {
            match remind_schedulers(&self.http, &self.state, guild).await {
                Ok(sent) => debug!(guild_id, sent, "checked next week's responsibility"),
                Err(e) => warn!(guild_id, "failed to check next week's responsibility: {:?}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serenity::all::UserId;

    #[test]
    fn announcement_mentions_found_members() {
        let names = [
            ResolvedName {
                name: "Alice".into(),
                user: Some(UserId::new(5)),
            },
            ResolvedName {
                name: "Bob".into(),
                user: None,
            },
        ];
        assert_eq!(
            announcement_text("Läsvecka 3", Some(&names)),
            format!(
                "### Det är en ny vecka!\nLäsvecka 3 har <@5> och @Bob ansvarsvecka, gör ert bästa men slit inte ut er! {}",
                HEART
            )
        );
    }

    #[test]
    fn announcement_without_responsible() {
        assert_eq!(
            announcement_text("Tentavecka", None),
            "### Det är en ny vecka!\nTentavecka gick det inte att hitta någon ansvarsvecka för :thinking:"
        );
    }
}
