//! # Heistbot - Twitch chat bot with a heist mini-game
//!
//! Heistbot sits in one or more Twitch channels and runs a coin economy. Its main
//! attraction is the heist: a chatter stakes coins on a zone, others `!join` during a
//! short window, and the crew either splits a random haul or walks away empty-handed
//! and possibly injured.
//!
//! ## Features
//!
//! - **Heists**: one shared session at a time, owned by a single actor task so joins,
//!   debits and resolution never race.
//! - **Ledger**: per-chatter coin balances in a sled database with atomic updates.
//! - **Injuries**: failed heists can bench a player for minutes to hours.
//! - **Counters**: `!counter` for stream tallies.
//! - **Moderation**: `!ban` and `!shoutout` through the Helix API, reported to Discord.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use heistbot::config::Config;
//! use heistbot::bot::BotServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let mut server = BotServer::new(config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`bot`] - server loop, command parsing and non-heist commands
//! - [`heist`] - the heist game: loot, zones, injuries, outcome and session actor
//! - [`twitch`] - IRC transport
//! - [`storage`] - sled-backed ledger, counters and injury store
//! - [`config`] - configuration management
//! - [`validation`] - login, channel and counter name checks
//! - [`metrics`] - in-process counters
//! - [`logutil`] - single-line escaping for logs and chat
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐      ┌─────────────────┐
//! │  Twitch reader  │─────▶│   Bot server    │
//! └─────────────────┘      └─────────────────┘
//!                             │           │
//!                  !heist/!join           other commands
//!                             ▼           ▼
//!                   ┌──────────────┐  ┌──────────────┐
//!                   │ Heist actor  │  │   Storage    │
//!                   └──────────────┘  └──────────────┘
//!                             │
//!                             ▼
//! ┌─────────────────┐   chat replies
//! │  Twitch writer  │◀──────┘
//! └─────────────────┘
//! ```

pub mod bot;
pub mod config;
pub mod heist;
pub mod logutil;
pub mod metrics;
pub mod storage;
pub mod twitch;
pub mod validation;
