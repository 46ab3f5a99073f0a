//! # Heist mini-game
//!
//! A single shared, time-boxed session that chatters buy into with `!heist` and
//! `!join`. After the join window closes the crew either splits a randomly drawn haul
//! or fails, and each failed participant may pick up an injury that keeps them out of
//! later heists for a while.
//!
//! - [`loot`] - loot catalog and the loot draw
//! - [`zones`] - zone catalog and difficulty tiers
//! - [`injury`] - injury model and the start/join gates
//! - [`outcome`] - success rate, success roll and payout split
//! - [`session`] - the actor that owns the session and drives the window

pub mod injury;
pub mod loot;
pub mod outcome;
pub mod session;
pub mod zones;

pub use injury::{Injury, Severity};
pub use loot::{compute_loot, LootEntry, LootResult};
pub use outcome::{compute_success_rate, distribute_payout, Payout};
pub use session::{
    spawn_heist_actor, system_now_ms, HeistCommand, HeistError, HeistHandle, HeistSettings,
    JoinOutcome, SessionSnapshot, SessionState, StartOutcome, ANNOUNCE_DELAY, JOIN_WINDOW,
    MAX_BET, MIN_BET,
};
pub use zones::{Difficulty, Zone, ZoneCatalog};
