//! # Chat bot
//!
//! - [`server`] - event loop and command routing
//! - [`public`] - command parser
//! - [`roles`] - viewer / moderator / broadcaster
//! - [`counter`] - `!counter`
//! - [`moderation`] - `!ban`, `!shoutout` and the [`moderation::UserApi`] seam
//! - [`helix`] - Helix implementation of `UserApi` (feature `helix`)
//! - [`discord`] - Discord webhook embeds

pub mod counter;
pub mod discord;
#[cfg(feature = "helix")]
pub mod helix;
pub mod moderation;
pub mod public;
pub mod roles;
pub mod server;

pub use public::{BotCommand, CommandParser};
pub use server::BotServer;
