//! # Configuration Management Module
//!
//! This module handles all configuration aspects of Heistbot: the chat connection,
//! storage location, logging, heist zones and Discord webhooks.
//!
//! ## Configuration Structure
//!
//! - [`BotConfig`] - Bot identity, command prefix and starting balance
//! - [`TwitchConfig`] - IRC connection and Helix API credentials
//! - [`StorageConfig`] - Data persistence settings
//! - [`LoggingConfig`] - Logging and debugging settings
//! - [`HeistConfig`] - Heist zones (inline or from a JSON file)
//! - [`DiscordConfig`] - Webhooks for command usage and channel activity
//!
//! ## Usage
//!
//! ```rust,no_run
//! use heistbot::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Joining: {:?}", config.twitch.channels);
//!     Config::create_default("config.example.toml").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [bot]
//! name = "heistbot"
//! command_prefix = "!"
//! starting_balance = 1000
//!
//! [twitch]
//! nick = "my_bot"
//! oauth_token = "oauth:..."
//! channels = ["my_channel"]
//!
//! [heist.zones.bank_vault]
//! name = "Bank Vault"
//! difficulty = "high"
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::fs;

use crate::heist::zones::{Difficulty, Zone};

/// Prefixes accepted for chat commands. Anything else falls back to `!`.
pub const ALLOWED_PREFIXES: &[char] = &['!', '^', '$', '?', '~'];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub name: String,
    /// Chat command prefix; one of [`ALLOWED_PREFIXES`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_prefix: Option<String>,
    /// Coins granted the first time a chatter is seen.
    #[serde(default = "default_starting_balance")]
    pub starting_balance: i64,
}

fn default_starting_balance() -> i64 {
    1000
}

impl BotConfig {
    /// The effective prefix character.
    pub fn prefix_char(&self) -> char {
        self.command_prefix
            .as_deref()
            .and_then(|p| {
                let mut chars = p.trim().chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if ALLOWED_PREFIXES.contains(&c) => Some(c),
                    _ => None,
                }
            })
            .unwrap_or('!')
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitchConfig {
    #[serde(default = "default_irc_server")]
    pub server: String,
    #[serde(default = "default_irc_port")]
    pub port: u16,
    pub nick: String,
    /// Chat token, with or without the `oauth:` prefix.
    #[serde(default)]
    pub oauth_token: String,
    #[serde(default)]
    pub channels: Vec<String>,
    /// Helix application client id (needed for `!ban` and `!shoutout`).
    #[serde(default)]
    pub client_id: String,
    /// Helix user access token; defaults to the chat token when empty.
    #[serde(default)]
    pub api_token: String,
    /// Numeric user id of the broadcaster whose channel the bot moderates.
    #[serde(default)]
    pub broadcaster_id: String,
    /// Numeric user id of the bot account acting as moderator.
    #[serde(default)]
    pub moderator_id: String,
    /// Minimum gap between consecutive chat sends (ms).
    #[serde(default)]
    pub min_send_gap_ms: Option<u64>,
}

fn default_irc_server() -> String {
    "irc.chat.twitch.tv".to_string()
}

fn default_irc_port() -> u16 {
    6667
}

impl TwitchConfig {
    pub fn send_gap_ms(&self) -> u64 {
        self.min_send_gap_ms.unwrap_or(1500)
    }

    /// Token used for Helix calls, without any `oauth:` prefix.
    pub fn helix_token(&self) -> &str {
        let raw = if self.api_token.is_empty() {
            &self.oauth_token
        } else {
            &self.api_token
        };
        raw.strip_prefix("oauth:").unwrap_or(raw)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeistConfig {
    /// Optional JSON file of zones, read at every `!heist`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zones_file: Option<String>,
    #[serde(default)]
    pub zones: BTreeMap<String, Zone>,
}

impl Default for HeistConfig {
    fn default() -> Self {
        let mut zones = BTreeMap::new();
        for (id, name, difficulty) in [
            ("bank_vault", "Bank Vault", Difficulty::High),
            ("art_museum", "Art Museum", Difficulty::Moderate),
            ("corner_store", "Corner Store", Difficulty::Low),
        ] {
            zones.insert(
                id.to_string(),
                Zone {
                    name: name.to_string(),
                    difficulty,
                },
            );
        }
        Self {
            zones_file: None,
            zones,
        }
    }
}

/// Discord webhook credentials (`https://discord.com/api/webhooks/{id}/{token}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub id: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DiscordConfig {
    /// Receives an embed for every moderation command used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_usage: Option<WebhookConfig>,
    /// Receives public channel activity such as shoutouts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<WebhookConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bot: BotConfig,
    pub twitch: TwitchConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub heist: HeistConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bot: BotConfig {
                name: "heistbot".to_string(),
                command_prefix: Some("!".to_string()),
                starting_balance: default_starting_balance(),
            },
            twitch: TwitchConfig {
                server: default_irc_server(),
                port: default_irc_port(),
                nick: "your_bot_account".to_string(),
                oauth_token: String::new(),
                channels: vec!["your_channel".to_string()],
                client_id: String::new(),
                api_token: String::new(),
                broadcaster_id: String::new(),
                moderator_id: String::new(),
                min_send_gap_ms: Some(1500),
            },
            storage: StorageConfig {
                data_dir: "./data".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("heistbot.log".to_string()),
            },
            heist: HeistConfig::default(),
            discord: DiscordConfig::default(),
        }
    }
}
