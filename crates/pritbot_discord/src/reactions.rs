//! Reacting to messages and announcing newly discovered reactions.

use std::collections::BTreeMap;

use serenity::all::{
    ChannelId, ChannelType, CommandInteraction, Context, CreateEmbed, CreateEmbedFooter,
    CreateInteractionResponse, CreateInteractionResponseMessage, CreateMessage, GuildId,
    Mentionable, Message, ReactionType, UserId,
};
use tracing::{debug, info, warn};

use pritbot_core::reactions::{ReactionMatch, ReactionRules, emoji_image_url, within_length};

use crate::bot::BotState;
use crate::error::Result;
use crate::helpers::{colours, guild_of};

/// Whether a channel id, or the parent of a thread, is marked no-react.
pub fn is_excluded(no_react: &[String], channel: ChannelId, thread_parent: Option<ChannelId>) -> bool {
    let marked = |id: ChannelId| no_react.iter().any(|marked| *marked == id.to_string());
    marked(channel) || thread_parent.is_some_and(marked)
}

pub fn discovery_embed(discoverer: UserId, text: &str, emoji: &str) -> CreateEmbed {
    CreateEmbed::new()
        .title("Ny reaktion upptäckt!")
        .description(format!(
            "{} upptäckte en ny reaktion genom att skicka \"{}\"!",
            discoverer.mention(),
            text
        ))
        .colour(colours::DISCOVERY)
        .image(emoji_image_url(emoji))
}

/// One line per discovered reaction that still has a rule.
pub fn discovered_list(discovered: &BTreeMap<String, String>, rules: &ReactionRules) -> String {
    let lines: Vec<String> = discovered
        .iter()
        .filter_map(|(id, discoverer)| {
            let rule = rules.get(id)?;
            Some(format!("{} **{}** upptäckt av <@{}>", rule.emoji, id, discoverer))
        })
        .collect();
    if lines.is_empty() {
        "Inga reaktioner har upptäckts".to_string()
    } else {
        lines.join("\n")
    }
}

pub fn undiscovered_footer(discovered: &BTreeMap<String, String>, rules: &ReactionRules) -> String {
    let found = discovered.keys().filter(|id| rules.get(id).is_some()).count();
    let left = rules.len().saturating_sub(found);
    format!(
        "Det finns {} reaktion{} kvar att upptäcka",
        left,
        if left == 1 { "" } else { "er" }
    )
}

pub fn discovered_embed(discovered: &BTreeMap<String, String>, rules: &ReactionRules) -> CreateEmbed {
    CreateEmbed::new()
        .title("Upptäckta reaktioner")
        .colour(colours::DISCOVERY)
        .description(discovered_list(discovered, rules))
        .footer(
            CreateEmbedFooter::new(undiscovered_footer(discovered, rules))
                .icon_url(emoji_image_url("❔")),
        )
}

/// Handle the /reactions command
pub async fn handle_reactions_command(
    ctx: &Context,
    command: &CommandInteraction,
    state: &BotState,
) -> Result<()> {
    let guild_id = guild_of(command)?;
    let guild = state.store.guild(guild_id.get()).await;
    let rules = state.reactions();

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(discovered_embed(&guild.discovered_reactions, &rules)),
            ),
        )
        .await?;
    Ok(())
}

/// Parent channel when the message was sent in a thread.
async fn thread_parent(ctx: &Context, channel: ChannelId) -> Option<ChannelId> {
    let channel = channel.to_channel(ctx).await.ok()?.guild()?;
    match channel.kind {
        ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread => {
            channel.parent_id
        }
        _ => None,
    }
}

async fn can_react(ctx: &Context, state: &BotState, guild_id: GuildId, msg: &Message) -> bool {
    if msg.author.bot || !within_length(&msg.content) {
        return false;
    }
    let guild = state.store.guild(guild_id.get()).await;
    if guild.no_react_channels.is_empty() {
        return true;
    }
    let parent = thread_parent(ctx, msg.channel_id).await;
    !is_excluded(&guild.no_react_channels, msg.channel_id, parent)
}

/// React to a message with every matching rule.
///
/// Returns the number of reactions added.
pub async fn react_to_message(
    ctx: &Context,
    state: &BotState,
    guild_id: GuildId,
    msg: &Message,
) -> Result<usize> {
    if !can_react(ctx, state, guild_id, msg).await {
        return Ok(0);
    }

    let rules = state.reactions();
    let mut reacted = 0;
    for found in rules.matches(&msg.content) {
        let reaction = match ReactionType::try_from(found.emoji) {
            Ok(reaction) => reaction,
            Err(e) => {
                warn!("reaction '{}' has an invalid emoji: {:?}", found.id, e);
                continue;
            }
        };
        debug!("reacting to message with {}", found.emoji);
        if let Err(e) = msg.react(ctx, reaction).await {
            warn!("error while reacting with {}: {}", found.emoji, e);
            continue;
        }
        reacted += 1;

        if let Err(e) = discover(ctx, state, guild_id, msg, &found).await {
            warn!("failed to announce discovery of '{}': {:?}", found.id, e);
        }
    }
    Ok(reacted)
}

/// Announce a reaction the first time anyone in the guild triggers it.
async fn discover(
    ctx: &Context,
    state: &BotState,
    guild_id: GuildId,
    msg: &Message,
    found: &ReactionMatch<'_>,
) -> Result<()> {
    let guild = state.store.guild(guild_id.get()).await;
    if guild.discovered_reactions.contains_key(found.id) {
        return Ok(());
    }

    info!(guild_id = guild_id.get(), "new reaction '{}' discovered by {}", found.id, msg.author.id);
    msg.channel_id
        .send_message(
            ctx,
            CreateMessage::new().embed(discovery_embed(msg.author.id, &found.text, found.emoji)),
        )
        .await?;
    state
        .store
        .set_discoverer(guild_id.get(), found.id, Some(msg.author.id.get().to_string()))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rules() -> ReactionRules {
        ReactionRules::parse(
            r#"{
                "kaffe": { "pattern": "kaffe|fika", "emoji": "☕" },
                "prit": { "pattern": "\\bprit\\b", "emoji": "<:prit:123456789>" },
                "te": { "pattern": "\\bte\\b", "emoji": "🍵" }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn lists_discoveries_with_discoverers() {
        let discovered = BTreeMap::from([
            ("kaffe".to_string(), "111".to_string()),
            ("prit".to_string(), "222".to_string()),
            ("borttagen".to_string(), "333".to_string()),
        ]);
        assert_eq!(
            discovered_list(&discovered, &rules()),
            "☕ **kaffe** upptäckt av <@111>\n<:prit:123456789> **prit** upptäckt av <@222>"
        );
        assert_eq!(
            undiscovered_footer(&discovered, &rules()),
            "Det finns 1 reaktion kvar att upptäcka"
        );

        let embed = serde_json::to_value(discovered_embed(&discovered, &rules())).unwrap();
        assert_eq!(embed["title"], "Upptäckta reaktioner");
        assert_eq!(embed["footer"]["text"], "Det finns 1 reaktion kvar att upptäcka");
    }

    #[test]
    fn nothing_discovered_yet() {
        let discovered = BTreeMap::new();
        assert_eq!(discovered_list(&discovered, &rules()), "Inga reaktioner har upptäckts");
        assert_eq!(
            undiscovered_footer(&discovered, &rules()),
            "Det finns 3 reaktioner kvar att upptäcka"
        );
    }

    #[test]
    fn thread_parents_are_checked() {
        let marked = vec!["10".to_string()];
        assert!(is_excluded(&marked, ChannelId::new(10), None));
        assert!(is_excluded(&marked, ChannelId::new(11), Some(ChannelId::new(10))));
        assert!(!is_excluded(&marked, ChannelId::new(11), None));
        assert!(!is_excluded(&marked, ChannelId::new(11), Some(ChannelId::new(12))));
    }
}
