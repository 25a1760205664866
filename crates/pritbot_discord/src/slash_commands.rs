//! Slash command registration and handlers.

use futures::future::join_all;
use lazy_static::lazy_static;
use pritbot_core::{GuildSetting, Roster, TimeOfDay};
use regex::Regex;
use serenity::{
    builder::{
        CreateCommand, CreateCommandOption, CreateEmbed, CreateEmbedFooter,
        CreateInteractionResponse, CreateInteractionResponseMessage, GetMessages,
    },
    client::Context,
    model::{
        application::{CommandInteraction, CommandOptionType, ResolvedOption, ResolvedValue},
        channel::{ChannelType, PartialChannel},
        guild::Role,
        permissions::Permissions,
    },
};
use tracing::{debug, info, warn};

use crate::announcements;
use crate::bot::{BotState, Loops};
use crate::error::{DiscordError, Result};
use crate::events;
use crate::helpers::{
    DAYS, colours, day_from_name, day_name, edit_reply, guild_of, integer_option, reply_ephemeral,
    require_manage_guild, string_option, subcommand,
};
use crate::reactions;
use crate::reminders;
use crate::weeks;

lazy_static! {
    static ref URL_PATTERN: Regex =
        Regex::new(r"^\w+://(?:.+?)?(?:\..+?)+$").expect("url pattern is valid");
}

/// Messages `/recheck` looks at when no count is given.
const DEFAULT_RECHECK_COUNT: u8 = 10;

fn day_option(description: &str) -> CreateCommandOption {
    DAYS.iter().fold(
        CreateCommandOption::new(CommandOptionType::String, "day", description).required(true),
        |option, day| option.add_string_choice(*day, *day),
    )
}

fn channel_option(description: &str) -> CreateCommandOption {
    CreateCommandOption::new(CommandOptionType::Channel, "channel", description)
        .channel_types(vec![
            ChannelType::Text,
            ChannelType::News,
            ChannelType::Forum,
            ChannelType::PublicThread,
            ChannelType::PrivateThread,
        ])
        .required(true)
}

fn config_value_option(setting: GuildSetting) -> CreateCommandOption {
    let option = match setting {
        GuildSetting::Calendar => {
            CreateCommandOption::new(CommandOptionType::String, "url", "Länk till kalendern (iCal)")
        }
        GuildSetting::Channel => {
            CreateCommandOption::new(CommandOptionType::Channel, "channel", "Kanal för utskick")
                .channel_types(vec![ChannelType::Text, ChannelType::News])
        }
        GuildSetting::Role => {
            CreateCommandOption::new(CommandOptionType::Role, "role", "Roll för ansvarsvecka")
        }
        GuildSetting::ScheduleRole => CreateCommandOption::new(
            CommandOptionType::Role,
            "role",
            "Roll som påminns om att sätta ansvarsveckor",
        ),
        GuildSetting::AnnounceTime | GuildSetting::RemindersTime => {
            CreateCommandOption::new(CommandOptionType::String, "time", "Tid på formatet HH:MM")
        }
        GuildSetting::Members => CreateCommandOption::new(
            CommandOptionType::String,
            "members",
            "Namn separerade med kommatecken",
        ),
    };
    option.required(true)
}

fn config_group(setting: GuildSetting) -> CreateCommandOption {
    CreateCommandOption::new(
        CommandOptionType::SubCommandGroup,
        setting.key(),
        setting.pretty_name(),
    )
    .add_sub_option(
        CreateCommandOption::new(CommandOptionType::SubCommand, "set", "Ändra inställningen")
            .add_sub_option(config_value_option(setting)),
    )
    .add_sub_option(CreateCommandOption::new(
        CommandOptionType::SubCommand,
        "get",
        "Visa inställningen",
    ))
    .add_sub_option(CreateCommandOption::new(
        CommandOptionType::SubCommand,
        "unset",
        "Ta bort inställningen",
    ))
}

/// Create all slash commands for registration
pub fn create_commands() -> Vec<CreateCommand> {
    vec![
        CreateCommand::new("help")
            .description("Visa vad boten kan göra")
            .dm_permission(false),
        CreateCommand::new("weeks")
            .description("Hantera kommande veckor")
            .dm_permission(false)
            .default_member_permissions(Permissions::MANAGE_GUILD)
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::SubCommand,
                    "generate",
                    "Generera ansvarsveckor",
                )
                .add_sub_option(
                    CreateCommandOption::new(
                        CommandOptionType::Integer,
                        "start",
                        "Första veckan, antar nästa vecka utan ansvarsvecka om inget anges",
                    )
                    .min_int_value(1)
                    .max_int_value(53),
                )
                .add_sub_option(
                    CreateCommandOption::new(
                        CommandOptionType::Integer,
                        "perweek",
                        "Hur många som har ansvarsvecka varje vecka, antar 2 om inget anges",
                    )
                    .min_int_value(1),
                ),
            )
            .add_option(CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "view",
                "Visa information om kommande veckor",
            )),
        CreateCommand::new("vecka")
            .description("Information om veckan")
            .dm_permission(false),
        GuildSetting::ALL.into_iter().fold(
            CreateCommand::new("config")
                .description("Ställ in boten för servern")
                .dm_permission(false)
                .default_member_permissions(Permissions::MANAGE_GUILD),
            |command, setting| command.add_option(config_group(setting)),
        ),
        CreateCommand::new("reminders")
            .description("Hantera påminnelser och stäng av/på pings för dig själv")
            .dm_permission(false)
            .add_option(
                CreateCommandOption::new(CommandOptionType::SubCommand, "add", "Skapa en ny påminnelse")
                    .add_sub_option(day_option("Dag att hantera påminnelser för"))
                    .add_sub_option(
                        CreateCommandOption::new(
                            CommandOptionType::String,
                            "message",
                            "Vad påminnelsen ska säga",
                        )
                        .min_length(1)
                        .required(true),
                    ),
            )
            .add_option(
                CreateCommandOption::new(CommandOptionType::SubCommand, "remove", "Ta bort en påminnelse")
                    .add_sub_option(day_option("Dag att hantera påminnelser för"))
                    .add_sub_option(
                        CreateCommandOption::new(
                            CommandOptionType::Integer,
                            "index",
                            "Nummer på påminnelsen att ta bort, kolla med /reminders list",
                        )
                        .min_int_value(1)
                        .required(true),
                    ),
            )
            .add_option(CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "list",
                "Se alla påminnelser",
            ))
            .add_option(CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "remind",
                "Skicka påminnelser igen",
            ))
            .add_option(CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "mute",
                "Sluta bli pingad av påminnelser",
            ))
            .add_option(CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "unmute",
                "Bli pingad av påminnelser",
            )),
        CreateCommand::new("announce")
            .description("Skicka veckans utskick manuellt")
            .dm_permission(false)
            .default_member_permissions(Permissions::MANAGE_GUILD),
        CreateCommand::new("noreact")
            .description("Markera kanaler att inte reagera i")
            .dm_permission(false)
            .default_member_permissions(Permissions::MANAGE_GUILD)
            .add_option(
                CreateCommandOption::new(CommandOptionType::SubCommand, "add", "Markera en kanal")
                    .add_sub_option(channel_option("Kanal att markera")),
            )
            .add_option(
                CreateCommandOption::new(CommandOptionType::SubCommand, "remove", "Ta bort en markering")
                    .add_sub_option(channel_option("Kanal att avmarkera")),
            )
            .add_option(CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "list",
                "Se vilka kanaler som är markerade",
            )),
        CreateCommand::new("recheck")
            .description("Kolla om de senaste meddelandena för reaktioner")
            .dm_permission(false)
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::Integer,
                    "count",
                    "Antal meddelanden att kolla (standard: 10)",
                )
                .min_int_value(1)
                .max_int_value(100),
            ),
        CreateCommand::new("reactions")
            .description("Se upptäckta reaktioner")
            .dm_permission(false),
        CreateCommand::new("events")
            .description("Få info om kommande arrangemang i Hubben")
            .dm_permission(false)
            .add_option(
                CreateCommandOption::new(CommandOptionType::Integer, "count", "Hur många arr som ska visas")
                    .min_int_value(1)
                    .max_int_value(events::MAX_COUNT as u64),
            ),
    ]
}

/// Run a command and turn failures into an ephemeral reply.
pub async fn dispatch(ctx: &Context, command: &CommandInteraction, state: &BotState, loops: &Loops) {
    let options = command.data.options();
    let name = command.data.name.as_str();
    debug!(command = name, user = %command.user.id, "handling slash command");

    let result = match name {
        "help" => handle_help_command(ctx, command).await,
        "weeks" => match subcommand(&options) {
            Some(("generate", options)) => {
                weeks::handle_generate_command(ctx, command, options, state).await
            }
            Some(("view", _)) => weeks::handle_view_command(ctx, command, state).await,
            _ => Err(DiscordError::MissingOption("subcommand")),
        },
        "vecka" => weeks::handle_vecka_command(ctx, command, state).await,
        "config" => handle_config_command(ctx, command, &options, state, loops).await,
        "reminders" => handle_reminders_command(ctx, command, &options, state).await,
        "announce" => handle_announce_command(ctx, command, state).await,
        "noreact" => handle_noreact_command(ctx, command, &options, state).await,
        "recheck" => handle_recheck_command(ctx, command, &options, state).await,
        "reactions" => reactions::handle_reactions_command(ctx, command, state).await,
        "events" => events::handle_events_command(ctx, command, &options, state).await,
        other => {
            warn!("No command matching {} was found", other);
            Ok(())
        }
    };

    if let Err(e) = result {
        warn!(command = name, "command failed: {:?}", e);
        report_error(ctx, command, &e).await;
    }
}

async fn report_error(ctx: &Context, command: &CommandInteraction, error: &DiscordError) {
    let message = error.user_message();
    if reply_ephemeral(ctx, command, message.clone()).await.is_ok() {
        return;
    }
    // Already acknowledged, so edit the deferred reply instead.
    if let Err(e) = edit_reply(ctx, command, message).await {
        warn!("failed to report command error: {:?}", e);
    }
}

/// Handle the /help command
pub async fn handle_help_command(ctx: &Context, command: &CommandInteraction) -> Result<()> {
    let embed = CreateEmbed::new()
        .title("P.R.I.T. Bot")
        .colour(colours::GENERIC)
        .field(
            "Veckor",
            "`/vecka` - Information om veckan\n\
             `/weeks generate [start] [perweek]` - Generera ansvarsveckor\n\
             `/weeks view` - Visa kommande ansvarsveckor",
            false,
        )
        .field(
            "Påminnelser",
            "`/reminders add|remove|list` - Hantera påminnelser\n\
             `/reminders remind` - Skicka dagens påminnelser igen\n\
             `/reminders mute|unmute` - Stäng av eller på pings för dig själv",
            false,
        )
        .field(
            "Reaktioner",
            "`/reactions` - Se upptäckta reaktioner\n\
             `/recheck [count]` - Kolla de senaste meddelandena för reaktioner\n\
             `/noreact add|remove|list` - Kanaler där boten inte reagerar",
            false,
        )
        .field(
            "Inställningar",
            "`/config <inställning> set|get|unset` - Ställ in boten\n\
             `/announce` - Skicka veckans utskick manuellt\n\
             `/events [count]` - Kommande arrangemang i Hubben",
            false,
        )
        .footer(CreateEmbedFooter::new(
            "Inställningar kräver behörigheten Hantera server",
        ));

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

fn channel_value<'a>(options: &'a [ResolvedOption<'a>]) -> Option<&'a PartialChannel> {
    options.iter().find_map(|option| match option.value {
        ResolvedValue::Channel(channel) => Some(channel),
        _ => None,
    })
}

fn role_value<'a>(options: &'a [ResolvedOption<'a>]) -> Option<&'a Role> {
    options.iter().find_map(|option| match option.value {
        ResolvedValue::Role(role) => Some(role),
        _ => None,
    })
}

/// How a stored setting is shown in replies.
pub fn display_setting(setting: GuildSetting, value: &str) -> String {
    match setting {
        GuildSetting::Channel => format!("<#{}>", value),
        GuildSetting::Role | GuildSetting::ScheduleRole => format!("<@&{}>", value),
        GuildSetting::Calendar
        | GuildSetting::AnnounceTime
        | GuildSetting::RemindersTime
        | GuildSetting::Members => value.to_string(),
    }
}

pub fn validate_calendar_url(url: &str) -> Result<String> {
    let url = url.trim();
    if URL_PATTERN.is_match(url) {
        Ok(url.to_string())
    } else {
        Err(DiscordError::rejected("Ogiltig URL"))
    }
}

/// The stored value for a `/config <key> set`.
fn config_value(
    setting: GuildSetting,
    options: &[ResolvedOption<'_>],
    guild_id: u64,
    state: &BotState,
) -> Result<String> {
    match setting {
        GuildSetting::Calendar => validate_calendar_url(
            string_option(options, "url").ok_or(DiscordError::MissingOption("url"))?,
        ),
        GuildSetting::Channel => channel_value(options)
            .map(|channel| channel.id.get().to_string())
            .ok_or(DiscordError::MissingOption("channel")),
        GuildSetting::Role | GuildSetting::ScheduleRole => {
            let role = role_value(options).ok_or(DiscordError::MissingOption("role"))?;
            if role.id.get() == guild_id || role.managed {
                return Err(DiscordError::rejected(
                    "Den rollen kan inte användas, saknar tillstånd",
                ));
            }
            Ok(role.id.get().to_string())
        }
        GuildSetting::AnnounceTime | GuildSetting::RemindersTime => {
            let time: TimeOfDay = string_option(options, "time")
                .ok_or(DiscordError::MissingOption("time"))?
                .parse()?;
            Ok(time.to_string())
        }
        GuildSetting::Members => {
            let members = string_option(options, "members").ok_or(DiscordError::MissingOption("members"))?;
            Ok(Roster::parse(members, &state.format)?.to_stored())
        }
    }
}

/// Handle the /config command
pub async fn handle_config_command(
    ctx: &Context,
    command: &CommandInteraction,
    options: &[ResolvedOption<'_>],
    state: &BotState,
    loops: &Loops,
) -> Result<()> {
    require_manage_guild(command)?;
    let guild_id = guild_of(command)?.get();

    let (key, inner) = subcommand(options).ok_or(DiscordError::MissingOption("setting"))?;
    let setting = GuildSetting::from_key(key).ok_or(DiscordError::MissingOption("setting"))?;
    let (action, values) = subcommand(inner).ok_or(DiscordError::MissingOption("action"))?;

    let reply = match action {
        "set" => {
            let value = config_value(setting, values, guild_id, state)?;
            let shown = display_setting(setting, &value);
            state
                .store
                .update_guild(guild_id, |guild| {
                    setting.set(guild, Some(value));
                    Ok(())
                })
                .await?;
            loops.setting_changed(setting, guild_id);
            info!(guild_id, setting = setting.key(), "setting changed");
            format!("{} är nu {}", setting.pretty_name(), shown)
        }
        "get" => {
            let guild = state.store.guild(guild_id).await;
            match setting.get(&guild) {
                Some(value) => format!("{}: {}", setting.pretty_name(), display_setting(setting, value)),
                None => format!("{} är inte inställd", setting.pretty_name()),
            }
        }
        "unset" => {
            state
                .store
                .update_guild(guild_id, |guild| {
                    setting.set(guild, None);
                    Ok(())
                })
                .await?;
            loops.setting_changed(setting, guild_id);
            info!(guild_id, setting = setting.key(), "setting cleared");
            format!("{} är inte längre inställd", setting.pretty_name())
        }
        _ => return Err(DiscordError::MissingOption("action")),
    };

    reply_ephemeral(ctx, command, reply).await
}

/// Handle the /reminders command
pub async fn handle_reminders_command(
    ctx: &Context,
    command: &CommandInteraction,
    options: &[ResolvedOption<'_>],
    state: &BotState,
) -> Result<()> {
    let guild_id = guild_of(command)?;
    let (action, options) = subcommand(options).ok_or(DiscordError::MissingOption("subcommand"))?;
    let day = || {
        string_option(options, "day")
            .and_then(day_from_name)
            .ok_or(DiscordError::MissingOption("day"))
    };
    let user_id = command.user.id.get().to_string();

    let reply = match action {
        "add" => {
            let day = day()?;
            let message = string_option(options, "message")
                .map(str::trim)
                .filter(|message| !message.is_empty())
                .ok_or(DiscordError::MissingOption("message"))?;
            state.store.add_reminder(guild_id.get(), day, message).await?;
            format!(
                "Skapade ny påminnelse på {} som säger: \"{}\"",
                day_name(day),
                message
            )
        }
        "remove" => {
            let day = day()?;
            let index = integer_option(options, "index")
                .and_then(|index| usize::try_from(index).ok())
                .ok_or(DiscordError::MissingOption("index"))?;
            let removed = state.store.remove_reminder(guild_id.get(), day, index).await?;
            format!(
                "Tog bort påminnelse {} på {}: \"{}\"",
                index,
                day_name(day),
                removed
            )
        }
        "list" => {
            let guild = state.store.guild(guild_id.get()).await;
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .embed(reminders::reminders_list_embed(&guild.reminders))
                            .ephemeral(true),
                    ),
                )
                .await?;
            return Ok(());
        }
        "remind" => {
            command.defer_ephemeral(&ctx.http).await?;
            reminders::send_reminders(&ctx.http, state, guild_id).await?;
            return edit_reply(ctx, command, "Påminnelser skickade!").await;
        }
        "mute" => {
            state.store.mute_reminders(guild_id.get(), &user_id).await?;
            "Du kommer inte längre bli pingad av påminnelser".to_string()
        }
        "unmute" => {
            state.store.unmute_reminders(guild_id.get(), &user_id).await?;
            "Du kommer nu bli pingad av påminnelser".to_string()
        }
        _ => return Err(DiscordError::MissingOption("subcommand")),
    };

    reply_ephemeral(ctx, command, reply).await
}

/// Handle the /announce command
pub async fn handle_announce_command(
    ctx: &Context,
    command: &CommandInteraction,
    state: &BotState,
) -> Result<()> {
    require_manage_guild(command)?;
    let guild_id = guild_of(command)?;
    command.defer_ephemeral(&ctx.http).await?;
    announcements::announce_week(&ctx.http, state, guild_id).await?;
    edit_reply(ctx, command, "Skickat").await
}

/// Handle the /noreact command
pub async fn handle_noreact_command(
    ctx: &Context,
    command: &CommandInteraction,
    options: &[ResolvedOption<'_>],
    state: &BotState,
) -> Result<()> {
    require_manage_guild(command)?;
    let guild_id = guild_of(command)?.get();
    let (action, options) = subcommand(options).ok_or(DiscordError::MissingOption("subcommand"))?;
    let mut channels = state.store.guild(guild_id).await.no_react_channels;

    let reply = match action {
        "add" | "remove" => {
            let channel = channel_value(options)
                .ok_or(DiscordError::MissingOption("channel"))?
                .id;
            let id = channel.get().to_string();
            let marked = channels.contains(&id);
            let reply = match (action, marked) {
                ("add", true) => return reply_ephemeral(ctx, command, "Kanalen är redan markerad").await,
                ("remove", false) => return reply_ephemeral(ctx, command, "Kanalen är inte markerad").await,
                ("add", _) => {
                    channels.push(id);
                    format!("Kommer inte längre skicka reaktioner i kanalen <#{}>", channel)
                }
                _ => {
                    channels.retain(|marked| *marked != id);
                    format!("Kommer reagera i kanalen <#{}>", channel)
                }
            };
            state.store.set_no_react_channels(guild_id, channels).await?;
            reply
        }
        "list" => {
            let description = if channels.is_empty() {
                "Inga kanaler markerade".to_string()
            } else {
                channels
                    .iter()
                    .map(|id| format!("- <#{}>", id))
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .embed(
                                CreateEmbed::new()
                                    .title("Markerade kanaler")
                                    .colour(colours::GENERIC)
                                    .description(description),
                            )
                            .ephemeral(true),
                    ),
                )
                .await?;
            return Ok(());
        }
        _ => return Err(DiscordError::MissingOption("subcommand")),
    };

    reply_ephemeral(ctx, command, reply).await
}

/// Handle the /recheck command
pub async fn handle_recheck_command(
    ctx: &Context,
    command: &CommandInteraction,
    options: &[ResolvedOption<'_>],
    state: &BotState,
) -> Result<()> {
    let guild_id = guild_of(command)?;
    let count = integer_option(options, "count")
        .and_then(|count| u8::try_from(count).ok())
        .unwrap_or(DEFAULT_RECHECK_COUNT)
        .clamp(1, 100);

    command.defer_ephemeral(&ctx.http).await?;
    let rules = state.reload_reactions().await;
    debug!(rules = rules.len(), "reloaded reactions for recheck");

    let messages = match command
        .channel_id
        .messages(&ctx.http, GetMessages::new().limit(count))
        .await
    {
        Ok(messages) => messages,
        Err(e) => {
            warn!("failed to fetch messages for recheck: {}", e);
            return edit_reply(ctx, command, "Kunde inte hämta meddelanden i den här kanalen.").await;
        }
    };

    let results = join_all(
        messages
            .iter()
            .map(|message| reactions::react_to_message(ctx, state, guild_id, message)),
    )
    .await;
    let found: usize = results
        .into_iter()
        .filter_map(|result| result.inspect_err(|e| warn!("recheck failed: {:?}", e)).ok())
        .filter(|reacted| *reacted > 0)
        .count();

    edit_reply(
        ctx,
        command,
        format!("Kollat meddelanden och hittade {} reaktioner.", found),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_setting_has_a_config_group() {
        let commands = create_commands();
        assert_eq!(commands.len(), 10);
        for setting in GuildSetting::ALL {
            assert!(!setting.key().is_empty());
            assert!(setting.pretty_name().chars().count() <= 100);
        }
    }

    #[test]
    fn calendar_urls_are_checked() {
        assert_eq!(
            validate_calendar_url(" https://cloud.timeedit.net/chalmers/ansvar.ics ").unwrap(),
            "https://cloud.timeedit.net/chalmers/ansvar.ics"
        );
        assert!(validate_calendar_url("webcal://calendar.google.com/x").is_ok());
        assert!(validate_calendar_url("inte en länk").is_err());
        assert!(validate_calendar_url("localhost").is_err());
    }

    #[test]
    fn settings_are_shown_as_mentions() {
        assert_eq!(display_setting(GuildSetting::Channel, "12"), "<#12>");
        assert_eq!(display_setting(GuildSetting::ScheduleRole, "34"), "<@&34>");
        assert_eq!(display_setting(GuildSetting::AnnounceTime, "08:00"), "08:00");
    }
}
