//! Bot state and the serenity event handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use parking_lot::RwLock;
use pritbot_core::bookit::BookitClient;
use pritbot_core::reactions::ReactionRules;
use pritbot_core::rotation::{HistoryUnavailable, ResponsibleWeek};
use pritbot_core::{
    BotConfig, DailyLoop, GuildData, GuildSetting, GuildStore, Secrets, SummaryFormat, TimeOfDay,
    WebClient,
};
use serenity::all::{
    Client, Context, EventHandler, GatewayIntents, Guild, GuildId, Http, Interaction, Message,
    Ready,
};
use tracing::{debug, error, info, warn};

use crate::activities;
use crate::announcements::AnnouncementTask;
use crate::error::Result;
use crate::reactions;
use crate::reminders::ReminderTask;
use crate::slash_commands;

/// Everything the handlers share, independent of the gateway connection.
pub struct BotState {
    pub config: BotConfig,
    pub secrets: Secrets,
    pub store: GuildStore,
    pub web: WebClient,
    pub format: SummaryFormat,
    pub timezone: Tz,
    default_announce_time: TimeOfDay,
    default_reminders_time: TimeOfDay,
    reactions: RwLock<Arc<ReactionRules>>,
}

impl BotState {
    pub async fn new(config: BotConfig, secrets: Secrets) -> Result<Self> {
        let store = GuildStore::open(&config.data_file).await?;
        let web = WebClient::new(config.services.clone())?;
        let reactions = ReactionRules::load(&config.reactions_file).await;
        info!(
            rules = reactions.len(),
            file = %config.reactions_file.display(),
            "loaded reactions"
        );

        Ok(Self {
            format: config.summary_format()?,
            timezone: config.timezone()?,
            default_announce_time: config.default_announce_time()?,
            default_reminders_time: config.default_reminders_time()?,
            reactions: RwLock::new(Arc::new(reactions)),
            config,
            secrets,
            store,
            web,
        })
    }

    /// Today in the configured timezone.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }

    pub fn announce_time(&self, guild: &GuildData) -> TimeOfDay {
        guild.announce_time().unwrap_or(self.default_announce_time)
    }

    pub fn reminders_time(&self, guild: &GuildData) -> TimeOfDay {
        guild.reminders_time().unwrap_or(self.default_reminders_time)
    }

    pub fn reactions(&self) -> Arc<ReactionRules> {
        self.reactions.read().clone()
    }

    /// Re-read the reactions file.
    pub async fn reload_reactions(&self) -> Arc<ReactionRules> {
        let rules = Arc::new(ReactionRules::load(&self.config.reactions_file).await);
        *self.reactions.write() = Arc::clone(&rules);
        rules
    }

    /// Responsibility weeks from the guild's calendar, oldest first.
    pub async fn history(&self, guild_id: u64) -> std::result::Result<Vec<ResponsibleWeek>, HistoryUnavailable> {
        let guild = self.store.guild(guild_id).await;
        self.web
            .history(guild.responsible_calendar_url.as_deref(), &self.format)
            .await
    }

    /// A BookIT client when both the endpoint and a cookie are available.
    ///
    /// The cookie from the environment wins over the one in the data file.
    pub async fn bookit(&self) -> Option<BookitClient> {
        let url = self.config.services.bookit_url.as_ref()?;
        let cookie = match &self.secrets.bookit_cookie {
            Some(cookie) => cookie.clone(),
            None => self.store.bookit_cookie().await?,
        };
        Some(BookitClient::new(self.web.http().clone(), url, cookie))
    }
}

/// The per-guild daily loops.
pub struct Loops {
    pub announcements: DailyLoop<AnnouncementTask>,
    pub reminders: DailyLoop<ReminderTask>,
}

impl Loops {
    pub fn new(state: Arc<BotState>, http: Arc<Http>) -> Self {
        let timezone = state.timezone;
        Self {
            announcements: DailyLoop::new(
                "announcements",
                AnnouncementTask::new(Arc::clone(&state), Arc::clone(&http)),
                timezone,
            ),
            reminders: DailyLoop::new("reminders", ReminderTask::new(state, http), timezone),
        }
    }

    pub fn start(&self, guild_id: u64) {
        self.announcements.start(guild_id);
        self.reminders.start(guild_id);
    }

    /// Restart the loop driven by a time setting after it changed.
    pub fn setting_changed(&self, setting: GuildSetting, guild_id: u64) {
        match setting {
            GuildSetting::AnnounceTime => self.announcements.reset(guild_id),
            GuildSetting::RemindersTime => self.reminders.reset(guild_id),
            _ => {}
        }
    }
}

pub struct DiscordEventHandler {
    state: Arc<BotState>,
    loops: OnceLock<Loops>,
    activities_started: AtomicBool,
}

impl DiscordEventHandler {
    pub fn new(state: Arc<BotState>) -> Self {
        Self {
            state,
            loops: OnceLock::new(),
            activities_started: AtomicBool::new(false),
        }
    }

    fn loops(&self, ctx: &Context) -> &Loops {
        self.loops
            .get_or_init(|| Loops::new(Arc::clone(&self.state), Arc::clone(&ctx.http)))
    }

    /// Register commands and start the loops for a guild.
    async fn set_up_guild(&self, ctx: &Context, guild_id: GuildId) {
        if !self.state.secrets.serves(guild_id.get()) {
            debug!(guild_id = guild_id.get(), "guild not in allow-list, skipping");
            return;
        }

        let commands = slash_commands::create_commands();
        match guild_id.set_commands(&ctx.http, commands).await {
            Ok(registered) => info!(
                guild_id = guild_id.get(),
                "registered {} slash commands",
                registered.len()
            ),
            Err(e) => error!(guild_id = guild_id.get(), "failed to register slash commands: {}", e),
        }

        self.loops(ctx).start(guild_id.get());
    }
}

#[async_trait]
impl EventHandler for DiscordEventHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("{} is connected to {} guilds", ready.user.name, ready.guilds.len());

        for guild in &ready.guilds {
            self.set_up_guild(&ctx, guild.id).await;
        }

        if !self.activities_started.swap(true, Ordering::SeqCst) {
            let file = self.state.config.activities_file.clone();
            let interval = self.state.config.activity_interval();
            tokio::spawn(activities::cycle_activities(ctx.clone(), file, interval));
        }

        info!("Bot is ready");
    }

    async fn guild_create(&self, ctx: Context, guild: Guild, is_new: Option<bool>) {
        if is_new == Some(true) {
            info!(guild_id = guild.id.get(), "joined new guild {}", guild.name);
            self.set_up_guild(&ctx, guild.id).await;
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let Some(guild_id) = msg.guild_id else {
            return;
        };
        if !self.state.secrets.serves(guild_id.get()) {
            return;
        }
        if let Err(e) = reactions::react_to_message(&ctx, &self.state, guild_id, &msg).await {
            warn!(guild_id = guild_id.get(), "failed to react to message: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            let loops = self.loops(&ctx);
            slash_commands::dispatch(&ctx, &command, &self.state, loops).await;
        }
    }
}

/// The bot: state plus a gateway client built on `run`.
pub struct DiscordBot {
    state: Arc<BotState>,
}

impl DiscordBot {
    pub async fn new(config: BotConfig, secrets: Secrets) -> Result<Self> {
        Ok(Self {
            state: Arc::new(BotState::new(config, secrets).await?),
        })
    }

    pub fn state(&self) -> &Arc<BotState> {
        &self.state
    }

    /// Connect to the gateway and handle events until the connection ends.
    pub async fn run(self) -> Result<()> {
        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MEMBERS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT;

        let token = self.state.secrets.discord_token.clone();
        let handler = DiscordEventHandler::new(Arc::clone(&self.state));
        let mut client = Client::builder(&token, intents)
            .event_handler(handler)
            .await?;

        info!("Starting Discord client");
        client.start().await?;
        Ok(())
    }
}
