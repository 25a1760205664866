use miette::Diagnostic;
use pritbot_core::rotation::HistoryUnavailable;
use pritbot_core::{CoreError, GuildSetting, StoreError};
use thiserror::Error;

use crate::helpers::day_name;

pub type Result<T> = std::result::Result<T, DiscordError>;

#[derive(Error, Diagnostic, Debug)]
pub enum DiscordError {
    #[error("Discord API error")]
    #[diagnostic(code(pritbot_discord::serenity))]
    Serenity(#[from] serenity::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    History(#[from] HistoryUnavailable),

    #[error("Guild has not configured {}", .setting.key())]
    #[diagnostic(
        code(pritbot_discord::not_configured),
        help("Set it with the matching /config command")
    )]
    NotConfigured { setting: GuildSetting },

    #[error("Configured {} no longer exists in the guild", .setting.key())]
    #[diagnostic(code(pritbot_discord::stale_setting))]
    StaleSetting { setting: GuildSetting },

    #[error("Command can only be used in a server")]
    #[diagnostic(code(pritbot_discord::not_in_guild))]
    NotInGuild,

    #[error("Missing the Manage Server permission")]
    #[diagnostic(code(pritbot_discord::missing_permission))]
    MissingPermission,

    #[error("Missing option '{0}'")]
    #[diagnostic(code(pritbot_discord::missing_option))]
    MissingOption(&'static str),

    #[error("BookIT is not configured")]
    #[diagnostic(
        code(pritbot_discord::bookit_not_configured),
        help("Set services.bookit_url in pritbot.toml and provide BOOKIT_COOKIE")
    )]
    BookitNotConfigured,

    /// A refusal that is shown to the user as is.
    #[error("{0}")]
    #[diagnostic(code(pritbot_discord::rejected))]
    Rejected(String),
}

impl DiscordError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    /// Reply shown to whoever ran the command that failed.
    pub fn user_message(&self) -> String {
        match self {
            DiscordError::Rejected(message) => message.clone(),
            DiscordError::NotConfigured { setting } => format!(
                "{} är inte inställd. Använd `/config {} set`",
                setting.pretty_name(),
                setting.key()
            ),
            DiscordError::StaleSetting { setting } => format!(
                "{} finns inte längre, ställ in den igen med `/config {} set`",
                setting.pretty_name(),
                setting.key()
            ),
            DiscordError::NotInGuild => "Kommandot kan bara användas i en server".to_string(),
            DiscordError::MissingPermission => {
                "Du behöver behörigheten Hantera server för att göra detta".to_string()
            }
            DiscordError::MissingOption(name) => format!("Du måste ange `{}`", name),
            DiscordError::BookitNotConfigured => {
                "Kopplingen till BookIT är inte inställd".to_string()
            }
            DiscordError::History(HistoryUnavailable::NotConfigured) => {
                "Kunde inte hämta tidigare ansvarsveckor, kontrollera att `/config calendar` är inställt."
                    .to_string()
            }
            DiscordError::History(_) => "Kunde inte hämta ansvarsveckor från kalendern".to_string(),
            DiscordError::Store(error) => match error {
                StoreError::InvalidDay { day } => format!("Dag {} finns inte i veckan", day),
                StoreError::NoReminders { day } => {
                    format!("Det finns inga påminnelser på {}", day_name(*day))
                }
                StoreError::NoSuchReminder { day, index } => format!(
                    "Det finns ingen påminnelse nummer {} på {}",
                    index,
                    day_name(*day)
                ),
                StoreError::AlreadyMuted => "Du får redan inga pings för påminnelser".to_string(),
                StoreError::NotMuted => "Du får redan pings för påminnelser".to_string(),
                StoreError::Io { .. } | StoreError::Json { .. } => {
                    "Kunde inte spara ändringen, försök igen senare".to_string()
                }
            },
            DiscordError::Core(CoreError::InvalidTime { input, .. }) => {
                format!("Ogiltig tid '{}', använd formatet HH:MM", input)
            }
            DiscordError::Core(CoreError::InvalidRoster { reason }) => {
                format!("Ogiltiga medlemmar: {}", reason)
            }
            DiscordError::Core(CoreError::InvalidWeek { year, week }) => {
                format!("Vecka {} finns inte år {}", week, year)
            }
            DiscordError::Core(_) | DiscordError::Serenity(_) => {
                "Något gick fel, försök igen senare".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_messages_name_the_setting() {
        let error = DiscordError::NotConfigured {
            setting: GuildSetting::Channel,
        };
        assert_eq!(
            error.user_message(),
            "Kanal för utskick är inte inställd. Använd `/config channel set`"
        );
        assert_eq!(
            DiscordError::from(StoreError::NoReminders { day: 3 }).user_message(),
            "Det finns inga påminnelser på Onsdagar"
        );
    }
}
