//! `/events`: upcoming arrangements booked in BookIT.

use chrono::{DateTime, Datelike, Utc, Weekday};
use chrono_tz::Tz;
use pritbot_core::bookit::BookingEvent;
use serenity::all::{CommandInteraction, Context, CreateEmbed, CreateMessage, ResolvedOption};
use tracing::{info, warn};

use crate::bot::BotState;
use crate::error::{DiscordError, Result};
use crate::helpers::{colours, edit_reply, integer_option};

pub const DEFAULT_COUNT: usize = 3;
pub const MAX_COUNT: usize = 10;

/// `ons 14/10 18:00 - 22:00`, or with both dates when the event spans days.
pub fn time_span(start: DateTime<Utc>, end: DateTime<Utc>, timezone: Tz) -> String {
    let start = start.with_timezone(&timezone);
    let end = end.with_timezone(&timezone);
    let day = |time: &DateTime<Tz>| {
        let weekday = match time.weekday() {
            Weekday::Mon => "mån",
            Weekday::Tue => "tis",
            Weekday::Wed => "ons",
            Weekday::Thu => "tor",
            Weekday::Fri => "fre",
            Weekday::Sat => "lör",
            Weekday::Sun => "sön",
        };
        format!("{} {}", weekday, time.format("%-d/%-m"))
    };
    if start.date_naive() == end.date_naive() {
        format!("{} {} - {}", day(&start), start.format("%H:%M"), end.format("%H:%M"))
    } else {
        format!(
            "{} {} - {} {}",
            day(&start),
            start.format("%H:%M"),
            day(&end),
            end.format("%H:%M")
        )
    }
}

pub fn event_embed(event: &BookingEvent, timezone: Tz) -> CreateEmbed {
    let rooms = if event.room.is_empty() {
        "Okänd".to_string()
    } else {
        event.room.join(", ")
    };
    CreateEmbed::new()
        .title(&event.title)
        .colour(colours::EVENTS)
        .field("Tid", time_span(event.start, event.end, timezone), false)
        .field("Plats", rooms, true)
}

pub async fn handle_events_command(
    ctx: &Context,
    command: &CommandInteraction,
    options: &[ResolvedOption<'_>],
    state: &BotState,
) -> Result<()> {
    let count = integer_option(options, "count")
        .and_then(|count| usize::try_from(count).ok())
        .unwrap_or(DEFAULT_COUNT)
        .clamp(1, MAX_COUNT);

    let client = state.bookit().await.ok_or(DiscordError::BookitNotConfigured)?;
    command.defer(&ctx.http).await?;

    let events = match client.future_events(count).await {
        Ok(events) => events,
        Err(e) => {
            warn!("failed to fetch BookIT events: {:?}", e);
            return edit_reply(ctx, command, "Kunde inte hämta arrangemang från BookIT").await;
        }
    };

    if events.is_empty() {
        return edit_reply(ctx, command, "Det finns inga arrangemang de kommande 2 veckorna").await;
    }
    edit_reply(
        ctx,
        command,
        format!("Skickar info om {} arrangemang", events.len()),
    )
    .await?;

    for event in &events {
        command
            .channel_id
            .send_message(
                &ctx.http,
                CreateMessage::new().embed(event_embed(event, state.timezone)),
            )
            .await?;
    }
    info!(count = events.len(), "sent BookIT events");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn spans_are_local_time() {
        let tz = chrono_tz::Europe::Stockholm;
        let start = Utc.with_ymd_and_hms(2026, 10, 14, 16, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 10, 14, 20, 30, 0).unwrap();
        assert_eq!(time_span(start, end, tz), "ons 14/10 18:00 - 22:30");

        let late = Utc.with_ymd_and_hms(2026, 10, 14, 23, 0, 0).unwrap();
        assert_eq!(time_span(start, late, tz), "ons 14/10 18:00 - tor 15/10 01:00");
    }
}
