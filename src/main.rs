//! Binary entrypoint for the Heistbot CLI.
//!
//! Commands:
//! - `start` - connect to Twitch and run the bot
//! - `init` - write a starter `config.toml` and create the data directory
//! - `status` - print store and heist statistics
//! - `grant <user> <amount>` - adjust a chatter's coin balance (negative to take)
//!
//! See the library crate docs for module-level details: `heistbot::`.
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::info;

use heistbot::bot::BotServer;
use heistbot::config::Config;
use heistbot::storage::BotStore;
use heistbot::validation::{normalize_channel, normalize_login};

#[derive(Parser)]
#[command(name = "heistbot")]
#[command(about = "A Twitch chat bot with a heist mini-game")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Twitch and run the bot
    Start,
    /// Write a default configuration file
    Init,
    /// Show store and heist statistics
    Status,
    /// Add coins to (or, with a negative amount, remove coins from) a chatter
    Grant {
        /// Twitch login, with or without '@'
        user: String,
        /// Amount to add
        #[arg(allow_hyphen_values = true)]
        amount: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Start => {
            let mut config = match pre_config {
                Some(c) => c,
                None => Config::load(&cli.config).await?,
            };
            config.twitch.channels = config
                .twitch
                .channels
                .iter()
                .map(|c| normalize_channel(c).map_err(|e| anyhow!("Invalid channel '{}': {}", c, e)))
                .collect::<Result<Vec<_>>>()?;
            if config.twitch.channels.is_empty() {
                return Err(anyhow!("No channels configured in {}", cli.config));
            }
            info!("Starting Heistbot v{}", env!("CARGO_PKG_VERSION"));
            let mut bot = BotServer::new(config).await?;
            bot.run().await?;
        }
        Commands::Init => {
            info!("Initializing new Heistbot configuration");
            if tokio::fs::try_exists(&cli.config).await.unwrap_or(false) {
                return Err(anyhow!(
                    "{} already exists; remove it first to regenerate",
                    cli.config
                ));
            }
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
            let cfg = Config::default();
            tokio::fs::create_dir_all(&cfg.storage.data_dir).await?;
            info!("Data directory ready at {}", cfg.storage.data_dir);
        }
        Commands::Status => {
            let config = match pre_config {
                Some(c) => c,
                None => Config::load(&cli.config).await?,
            };
            let bot = BotServer::new(config).await?;
            bot.show_status().await?;
        }
        Commands::Grant { user, amount } => {
            let config = match pre_config {
                Some(c) => c,
                None => Config::load(&cli.config).await?,
            };
            let login = normalize_login(&user).map_err(|e| anyhow!("Invalid user '{}': {}", user, e))?;
            let store = BotStore::open_in_data_dir(&config.storage.data_dir)?;
            store.ensure_account(&login, config.bot.starting_balance)?;
            let balance = store.increment_balance(&login, amount)?;
            store.flush()?;
            println!("{} now has {} coins.", login, balance);
        }
    }

    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity wins; otherwise the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    // sled is chatty at debug
    builder.filter_module("sled", log::LevelFilter::Warn);

    let log_file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        });

    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Echo to the console only when attached to a terminal
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            writeln!(
                fmt,
                "{} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.args()
            )
        });
    }
    let _ = builder.try_init();
}
