//! pritbot Discord - the bot itself
//!
//! This crate connects the rotation engine and guild store from
//! `pritbot_core` to Discord: slash commands, the weekly announcement and
//! daily reminder loops, pattern reactions and the rotating activity.
//!
//! ## Configuration
//!
//! The bot is built from a [`pritbot_core::BotConfig`] and
//! [`pritbot_core::Secrets`] loaded once at startup. Per-guild settings live
//! in the JSON data file and are changed through `/config`.

pub mod activities;
pub mod announcements;
pub mod bot;
pub mod error;
pub mod events;
pub mod helpers;
pub mod reactions;
pub mod reminders;
pub mod slash_commands;
pub mod weeks;

pub use bot::{BotState, DiscordBot, DiscordEventHandler, Loops};
pub use error::{DiscordError, Result};

// Re-export serenity for convenience
pub use serenity;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{BotState, DiscordBot, DiscordError, DiscordEventHandler, Loops, Result};
}
