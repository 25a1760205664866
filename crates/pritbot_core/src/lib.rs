//! pritbot core - responsibility-week rotation and guild data
//!
//! This crate holds everything the Discord bot needs that does not talk to
//! Discord: the rotation engine, the iCalendar codec, ISO-week arithmetic,
//! the daily loop driver, the guild data store, configuration and the HTTP
//! services the bot reads from.

pub mod bookit;
pub mod config;
pub mod error;
pub mod feed;
pub mod ical;
pub mod reactions;
pub mod roster;
pub mod rotation;
pub mod schedule;
pub mod store;
pub mod summary;
pub mod week;

pub use config::{BotConfig, Secrets};
pub use error::{CoreError, Result};
pub use feed::WebClient;
pub use roster::Roster;
pub use rotation::{HistoryUnavailable, ResponsibilityEvent, ResponsibleWeek};
pub use schedule::{DailyLoop, DailyTask, TimeOfDay};
pub use store::{GuildData, GuildSetting, GuildStore, StoreError};
pub use summary::SummaryFormat;
pub use week::WeekOfYear;
