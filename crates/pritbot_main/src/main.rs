use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, WrapErr};
use owo_colors::OwoColorize;
use pritbot_core::config::{self, BotConfig};
use pritbot_core::ical::{Calendar, parse_calendar};
use pritbot_core::rotation::{
    DEFAULT_GROUP_SIZE, create_calendar, default_start_week, extract_history, plan_rotation,
};
use pritbot_core::{Roster, Secrets, WebClient, WeekOfYear};
use pritbot_discord::DiscordBot;
use tracing::info;

#[derive(Parser)]
#[command(name = "pritbot")]
#[command(about = "Responsibility-week rotation bot for Discord")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to config file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Discord and run the bot (default)
    Run,
    /// Generate responsibility weeks offline
    Generate {
        /// Calendar with earlier weeks, as a file path or URL
        #[arg(long)]
        calendar: Option<String>,
        /// Comma separated member names
        #[arg(long)]
        members: String,
        /// Members per week
        #[arg(long, default_value_t = DEFAULT_GROUP_SIZE)]
        per_week: NonZeroUsize,
        /// First week number to fill
        #[arg(long)]
        start_week: Option<u32>,
        /// Write the generated calendar to this file
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

fn is_url(source: &str) -> bool {
    ["http://", "https://", "webcal://"]
        .iter()
        .any(|scheme| source.starts_with(scheme))
}

async fn read_calendar(source: &str, config: &BotConfig) -> Result<Calendar> {
    if is_url(source) {
        let client = WebClient::new(config.services.clone())?;
        Ok(client.fetch_calendar(source).await?)
    } else {
        let text = tokio::fs::read_to_string(source)
            .await
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to read calendar {}", source))?;
        Ok(parse_calendar(&text)?)
    }
}

async fn generate(
    config: &BotConfig,
    calendar: Option<&str>,
    members: &str,
    per_week: NonZeroUsize,
    start_week: Option<u32>,
    output: Option<&Path>,
) -> Result<()> {
    let format = config.summary_format()?;
    let today = chrono::Utc::now()
        .with_timezone(&config.timezone()?)
        .date_naive();

    let roster = Roster::parse(members, &format)?;
    let history = match calendar {
        Some(source) => extract_history(&read_calendar(source, config).await?, &format),
        None => Vec::new(),
    };
    let start = match start_week {
        Some(week) => WeekOfYear::upcoming(week, today)?,
        None => default_start_week(&history, today),
    };

    let events = plan_rotation(roster.members(), &history, per_week, start, &format);
    info!(
        weeks = events.len(),
        history = history.len(),
        start = %start,
        "generated responsibility weeks"
    );

    println!(
        "{} {} weeks from {}",
        "Generated".bright_green().bold(),
        events.len(),
        start.bright_cyan()
    );
    for event in &events {
        let names: Vec<&str> = event.members.iter().map(String::as_str).collect();
        println!("  {}: {}", format!("v{}", event.week.week()).bold(), names.join(", "));
    }

    if let Some(path) = output {
        tokio::fs::write(path, create_calendar(&events).serialize())
            .await
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
        println!("{} {}", "Wrote".bright_green().bold(), path.display());
    }
    Ok(())
}

async fn run(config: BotConfig) -> Result<()> {
    let secrets = Secrets::from_env().ok_or_else(|| {
        miette::miette!(
            help = "Set DISCORD_TOKEN in the environment or in a .env file",
            "No Discord token configured"
        )
    })?;
    if let Some(guilds) = &secrets.allowed_guilds {
        info!("Restricted to {} guild(s)", guilds.len());
    }

    let bot = DiscordBot::new(config, secrets).await?;
    bot.run().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .rgb_colors(miette::RgbColors::Preferred)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))?;
    miette::set_panic_hook();

    let cli = Cli::parse();

    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pritbot")
        .join("logs");
    std::fs::create_dir_all(&log_dir).into_diagnostic()?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "pritbot.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::{
        EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt,
    };

    let filter = if cli.debug {
        "pritbot_main=debug,pritbot_discord=debug,pritbot_core=debug,serenity=warn"
    } else {
        "pritbot_main=info,pritbot_discord=info,pritbot_core=info,serenity=warn"
    };
    let env_filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let terminal_layer = if cli.debug {
        fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_timer(fmt::time::LocalTime::rfc_3339())
            .boxed()
    } else {
        fmt::layer().compact().with_target(false).boxed()
    };
    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(terminal_layer.with_filter(env_filter()))
        .with(file_layer.with_filter(env_filter()))
        .init();

    let config = if let Some(config_path) = &cli.config {
        info!("Loading config from: {:?}", config_path);
        config::load_config(config_path).await?
    } else {
        config::load_config_from_standard_locations().await?
    };
    config.validate()?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::Generate {
            calendar,
            members,
            per_week,
            start_week,
            output,
        } => {
            generate(
                &config,
                calendar.as_deref(),
                &members,
                per_week,
                start_week,
                output.as_deref(),
            )
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_is_the_default() {
        let cli = Cli::try_parse_from(["pritbot", "--debug"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.debug);
    }

    #[test]
    fn generate_arguments() {
        let cli = Cli::try_parse_from([
            "pritbot",
            "generate",
            "--calendar",
            "weeks.ics",
            "--members",
            "Alice,Bob,Cecilia",
            "--per-week",
            "3",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Generate {
                calendar,
                per_week,
                start_week,
                ..
            }) => {
                assert_eq!(calendar.as_deref(), Some("weeks.ics"));
                assert_eq!(per_week.get(), 3);
                assert_eq!(start_week, None);
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn calendar_sources() {
        assert!(is_url("https://example.org/cal.ics"));
        assert!(is_url("webcal://example.org/cal.ics"));
        assert!(!is_url("./weeks.ics"));
    }
}
