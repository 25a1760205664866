//! `/weeks` and `/vecka`.

use std::num::NonZeroUsize;

use chrono::NaiveDate;
use pritbot_core::rotation::{
    DEFAULT_GROUP_SIZE, ResponsibilityEvent, ResponsibleWeek, create_calendar,
    default_start_week, plan_rotation, responsible_at,
};
use pritbot_core::{GuildSetting, Roster, WeekOfYear};
use serenity::all::{
    CommandInteraction, Context, CreateAttachment, CreateEmbed, CreateInteractionResponse,
    CreateInteractionResponseMessage, EditInteractionResponse, ResolvedOption,
};
use tracing::{info, warn};

use crate::bot::BotState;
use crate::error::{DiscordError, Result};
use crate::helpers::{colours, guild_of, integer_option};

pub const CALENDAR_FILE_NAME: &str = "ansvarsveckor.ics";

fn bold_names<'a>(names: impl IntoIterator<Item = &'a String>) -> String {
    names
        .into_iter()
        .map(|name| format!("**{}**", name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Reply text for a generated rotation.
pub fn generation_summary(
    events: &[ResponsibilityEvent],
    start: WeekOfYear,
    share_link: Option<&str>,
    history_warning: bool,
) -> String {
    let mut text = String::new();
    if history_warning {
        text.push_str(
            "-# Kunde inte hämta tidigare ansvarsveckor, kontrollera att `/config calendar` är inställt.\n",
        );
    }
    text.push_str(&format!(
        "## Genererade {} ansvarsveckor från v{}\n",
        events.len(),
        start.week()
    ));
    for event in events {
        text.push_str(&format!(
            "v{}: {}\n",
            event.week.week(),
            bold_names(&event.members)
        ));
    }
    match share_link {
        Some(link) => text.push_str(&format!(
            "\n[Lägg till i Google Kalender]({})\neller ladda ner filen för att importera i valfri kalenderapp",
            link
        )),
        None => text.push_str("\nLadda ner filen för att importera i valfri kalenderapp"),
    }
    text
}

/// Current and later responsibility weeks.
pub fn upcoming_weeks(history: &[ResponsibleWeek], today: NaiveDate) -> String {
    let lines: Vec<String> = history
        .iter()
        .filter(|week| week.end > today)
        .map(|week| {
            let marker = if week.covers(today) { " (nu)" } else { "" };
            format!(
                "v{}{}: {}",
                WeekOfYear::containing(week.start).week(),
                marker,
                bold_names(&week.responsible)
            )
        })
        .collect();
    if lines.is_empty() {
        "Det finns inga kommande ansvarsveckor".to_string()
    } else {
        lines.join("\n")
    }
}

pub fn week_info_text(week: Option<&str>, study_week: Option<&str>, responsible: &str) -> String {
    format!(
        "### Vecka {}\nLäsvecka: {}\nAnsvarsvecka: {}",
        week.unwrap_or("?"),
        study_week.unwrap_or("?"),
        responsible
    )
}

pub async fn handle_generate_command(
    ctx: &Context,
    command: &CommandInteraction,
    options: &[ResolvedOption<'_>],
    state: &BotState,
) -> Result<()> {
    let guild_id = guild_of(command)?;
    let guild = state.store.guild(guild_id.get()).await;
    let members = guild
        .members
        .as_deref()
        .filter(|members| !members.trim().is_empty())
        .ok_or(DiscordError::NotConfigured {
            setting: GuildSetting::Members,
        })?;
    let roster = Roster::parse(members, &state.format)?;
    let today = state.today();

    let start = integer_option(options, "start")
        .map(|week| {
            u32::try_from(week)
                .map_err(|_| DiscordError::rejected("Ogiltig vecka"))
                .and_then(|week| Ok(WeekOfYear::upcoming(week, today)?))
        })
        .transpose()?;
    let group_size = integer_option(options, "perweek")
        .and_then(|size| usize::try_from(size).ok())
        .and_then(NonZeroUsize::new)
        .unwrap_or(DEFAULT_GROUP_SIZE);

    command.defer_ephemeral(&ctx.http).await?;

    let (history, history_warning) = match state.history(guild_id.get()).await {
        Ok(history) => (history, false),
        Err(e) => {
            warn!(guild_id = guild_id.get(), "generating without history: {:?}", e);
            (Vec::new(), true)
        }
    };
    let start = start.unwrap_or_else(|| default_start_week(&history, today));

    let events = plan_rotation(roster.members(), &history, group_size, start, &state.format);
    let calendar = create_calendar(&events);
    let share_link = match state.web.upload_calendar(&calendar).await {
        Ok(link) => Some(link),
        Err(e) => {
            warn!("failed to create TimeSend link: {:?}", e);
            None
        }
    };

    info!(
        guild_id = guild_id.get(),
        weeks = events.len(),
        start = %start,
        "generated responsibility weeks"
    );

    let attachment = CreateAttachment::bytes(calendar.serialize().into_bytes(), CALENDAR_FILE_NAME);
    command
        .edit_response(
            &ctx.http,
            EditInteractionResponse::new()
                .content(generation_summary(
                    &events,
                    start,
                    share_link.as_deref(),
                    history_warning,
                ))
                .new_attachment(attachment),
        )
        .await?;
    Ok(())
}

pub async fn handle_view_command(
    ctx: &Context,
    command: &CommandInteraction,
    state: &BotState,
) -> Result<()> {
    let guild_id = guild_of(command)?;
    let history = state.history(guild_id.get()).await?;

    let embed = CreateEmbed::new()
        .title("Kommande ansvarsveckor")
        .colour(colours::RESPONSIBILITY)
        .description(upcoming_weeks(&history, state.today()));

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embed)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

pub async fn handle_vecka_command(
    ctx: &Context,
    command: &CommandInteraction,
    state: &BotState,
) -> Result<()> {
    let guild_id = guild_of(command)?;
    command.defer(&ctx.http).await?;

    let (week, study_week, history) = tokio::join!(
        state.web.week(),
        state.web.study_week(),
        state.history(guild_id.get())
    );
    let responsible = match history {
        Ok(history) => match responsible_at(&history, state.today()) {
            Some(current) => current
                .responsible
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
            None => "Ingen".to_string(),
        },
        Err(_) => "Kalender saknas".to_string(),
    };

    command
        .edit_response(
            &ctx.http,
            EditInteractionResponse::new().content(week_info_text(
                week.as_deref(),
                study_week.as_deref(),
                &responsible,
            )),
        )
        .await?;
    Ok(())
}
