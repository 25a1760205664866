//! Shared helpers for commands and scheduled posts.

use std::num::NonZeroU64;

use chrono::{Datelike, NaiveDate, Weekday};
use serenity::all::{
    CommandInteraction, Context, CreateInteractionResponse, CreateInteractionResponseMessage,
    EditInteractionResponse, GuildId, Http, Member, Mentionable, ResolvedOption, ResolvedValue,
    UserId,
};

use crate::error::{DiscordError, Result};

/// Reminder days as shown in commands, Monday first.
pub const DAYS: [&str; 7] = [
    "Måndagar",
    "Tisdagar",
    "Onsdagar",
    "Torsdagar",
    "Fredagar",
    "Lördagar",
    "Söndagar",
];

/// Members fetched per request, Discord's maximum.
const MEMBER_PAGE: u64 = 1000;

pub mod colours {
    use serenity::all::Colour;

    pub const RESPONSIBILITY: Colour = Colour::from_rgb(0x00, 0xaa, 0x55);
    pub const REMINDERS: Colour = Colour::from_rgb(0xff, 0xbb, 0x00);
    pub const DISCOVERY: Colour = Colour::from_rgb(0x09, 0xcd, 0xda);
    pub const GENERIC: Colour = Colour::from_rgb(100, 150, 200);
    pub const EVENTS: Colour = Colour::from_rgb(0xe9, 0x1e, 0x63);
}

/// Name of a 1-based reminder day.
pub fn day_name(day: u8) -> &'static str {
    usize::from(day)
        .checked_sub(1)
        .and_then(|index| DAYS.get(index))
        .copied()
        .unwrap_or("?")
}

/// 1-based day for a name from [`DAYS`].
pub fn day_from_name(name: &str) -> Option<u8> {
    DAYS.iter()
        .position(|day| day.eq_ignore_ascii_case(name))
        .and_then(|index| u8::try_from(index + 1).ok())
}

pub fn is_announcement_day(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Mon
}

/// The day before a new week starts, when unscheduled weeks are chased up.
pub fn is_scheduling_day(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Sun
}

/// Join names as "a", "a och b" or "a, b och c".
pub fn join_names<S: AsRef<str>>(names: &[S]) -> String {
    match names {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        [rest @ .., last] => format!(
            "{} och {}",
            rest.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", "),
            last.as_ref()
        ),
    }
}

/// Parse a stored snowflake. Zero and garbage are `None`.
pub fn parse_id<T: From<NonZeroU64>>(id: &str) -> Option<T> {
    id.trim().parse::<NonZeroU64>().ok().map(T::from)
}

/// Guild members by the name they show in the guild.
#[derive(Debug, Clone, Default)]
pub struct MemberDirectory {
    entries: Vec<(UserId, String)>,
}

/// A roster name and the guild member it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    pub name: String,
    pub user: Option<UserId>,
}

impl ResolvedName {
    /// A mention when the member was found, `@name` otherwise.
    pub fn label(&self) -> String {
        match self.user {
            Some(user) => user.mention().to_string(),
            None => format!("@{}", self.name),
        }
    }
}

impl MemberDirectory {
    pub fn new(entries: impl IntoIterator<Item = (UserId, String)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(id, name)| (id, name.to_lowercase()))
                .collect(),
        }
    }

    pub fn from_members(members: &[Member]) -> Self {
        Self::new(
            members
                .iter()
                .filter(|member| !member.user.bot)
                .map(|member| (member.user.id, member.display_name().to_string())),
        )
    }

    /// First member whose display name contains `name`, ignoring case.
    pub fn find(&self, name: &str) -> Option<UserId> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|(_, display)| display.contains(&needle))
            .map(|(id, _)| *id)
    }

    pub fn resolve<'a>(&self, names: impl IntoIterator<Item = &'a String>) -> Vec<ResolvedName> {
        names
            .into_iter()
            .map(|name| ResolvedName {
                name: name.clone(),
                user: self.find(name),
            })
            .collect()
    }
}

/// Every member of a guild, following pagination.
pub async fn fetch_members(http: &Http, guild_id: GuildId) -> Result<Vec<Member>> {
    let mut members: Vec<Member> = Vec::new();
    loop {
        let after = members.last().map(|member| member.user.id);
        let page = guild_id.members(http, Some(MEMBER_PAGE), after).await?;
        let done = (page.len() as u64) < MEMBER_PAGE;
        members.extend(page);
        if done {
            return Ok(members);
        }
    }
}

pub fn guild_of(command: &CommandInteraction) -> Result<GuildId> {
    command.guild_id.ok_or(DiscordError::NotInGuild)
}

/// Settings can only be changed with the Manage Server permission.
pub fn require_manage_guild(command: &CommandInteraction) -> Result<()> {
    let allowed = command
        .member
        .as_ref()
        .and_then(|member| member.permissions)
        .is_some_and(|permissions| permissions.manage_guild());
    if allowed {
        Ok(())
    } else {
        Err(DiscordError::MissingPermission)
    }
}

/// The subcommand of a command and its options.
pub fn subcommand<'a>(options: &'a [ResolvedOption<'a>]) -> Option<(&'a str, &'a [ResolvedOption<'a>])> {
    options.iter().find_map(|option| match &option.value {
        ResolvedValue::SubCommand(inner) | ResolvedValue::SubCommandGroup(inner) => {
            Some((option.name, inner.as_slice()))
        }
        _ => None,
    })
}

pub fn string_option<'a>(options: &'a [ResolvedOption<'a>], name: &str) -> Option<&'a str> {
    options.iter().find_map(|option| match option.value {
        ResolvedValue::String(value) if option.name == name => Some(value),
        _ => None,
    })
}

pub fn integer_option(options: &[ResolvedOption<'_>], name: &str) -> Option<i64> {
    options.iter().find_map(|option| match option.value {
        ResolvedValue::Integer(value) if option.name == name => Some(value),
        _ => None,
    })
}

pub async fn reply_ephemeral(ctx: &Context, command: &CommandInteraction, content: impl Into<String>) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

pub async fn edit_reply(ctx: &Context, command: &CommandInteraction, content: impl Into<String>) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn joins_names_the_swedish_way() {
        assert_eq!(join_names::<&str>(&[]), "");
        assert_eq!(join_names(&["Alice"]), "Alice");
        assert_eq!(join_names(&["Alice", "Bob"]), "Alice och Bob");
        assert_eq!(join_names(&["Alice", "Bob", "Cecilia"]), "Alice, Bob och Cecilia");
    }

    #[test]
    fn finds_members_by_case_insensitive_substring() {
        let directory = MemberDirectory::new([
            (UserId::new(1), "Alice | sexIT".to_string()),
            (UserId::new(2), "bobby".to_string()),
        ]);
        assert_eq!(directory.find("alice"), Some(UserId::new(1)));
        assert_eq!(directory.find("Bob"), Some(UserId::new(2)));
        assert_eq!(directory.find("Cecilia"), None);
        assert_eq!(directory.find("  "), None);

        let resolved = directory.resolve(&["Bob".to_string(), "Eve".to_string()]);
        assert_eq!(resolved[0].label(), "<@2>");
        assert_eq!(resolved[1].label(), "@Eve");
    }

    #[test]
    fn reminder_days_round_trip() {
        assert_eq!(day_name(1), "Måndagar");
        assert_eq!(day_name(7), "Söndagar");
        assert_eq!(day_name(0), "?");
        assert_eq!(day_from_name("Fredagar"), Some(5));
        assert_eq!(day_from_name("Caturday"), None);
    }

    #[test]
    fn ids_reject_zero() {
        assert_eq!(parse_id::<UserId>("42"), Some(UserId::new(42)));
        assert_eq!(parse_id::<UserId>("0"), None);
        assert_eq!(parse_id::<UserId>("abc"), None);
    }

    #[test]
    fn weekly_days() {
        let monday = NaiveDate::from_ymd_opt(2026, 10, 12).unwrap();
        assert!(is_announcement_day(monday));
        assert!(!is_scheduling_day(monday));
        assert!(is_scheduling_day(monday + chrono::Days::new(6)));
    }
}
