//! The heist session actor.
//!
//! One task owns the process-wide [`Session`]. `!heist` and `!join` arrive as
//! [`HeistCommand`]s on the same channel, so the membership check, the debit and the
//! append for a join run as one unit and never interleave with a start or a
//! resolution. The join window is a spawned timer that posts back to the actor; a
//! `WindowClosed` carrying a stale session id is ignored.
//!
//! Chat output goes to an unbounded [`OutgoingMessage`] sink that the bot server
//! drains into the Twitch writer.

use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;
use uuid::Uuid;

use super::injury::{join_gate, roll_injury, start_gate, Injury};
use super::loot::compute_loot;
use super::outcome::{compute_success_rate, distribute_payout, roll_success};
use super::zones::{Zone, ZoneCatalog};
use crate::config::{Config, HeistConfig};
use crate::logutil::escape_log;
use crate::metrics;
use crate::storage::{BotStore, StoreError};
use crate::twitch::OutgoingMessage;
use crate::validation::parse_leading_int;

pub const MIN_BET: i64 = 100;
pub const MAX_BET: i64 = 5000;
pub const MIN_PARTICIPANTS: usize = 1;
/// Pause between the start announcement and the initiator's join line.
pub const ANNOUNCE_DELAY: Duration = Duration::from_secs(1);
/// Time the crew has to `!join` once the initiator is in.
pub const JOIN_WINDOW: Duration = Duration::from_secs(10);

/// Failures that abort a heist invocation without a chat reply.
#[derive(Debug, Error)]
pub enum HeistError {
    #[error("no ledger account for {0}")]
    MissingAccount(String),
    #[error("storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for HeistError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => HeistError::MissingAccount(what),
            other => HeistError::Store(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Forming,
    Resolving,
}

/// The in-flight heist. `bet_amount` and `zone` are fixed when the session opens.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub state: SessionState,
    pub channel: String,
    pub initiator: String,
    pub bet_amount: i64,
    pub zone: Zone,
    pub participants: Vec<String>,
}

impl Session {
    fn has_participant(&self, user: &str) -> bool {
        self.participants.iter().any(|p| p.eq_ignore_ascii_case(user))
    }
}

/// Read-only view of the actor's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub session_id: Option<Uuid>,
    pub bet_amount: Option<i64>,
    pub zone: Option<Zone>,
    pub participants: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started { session_id: Uuid },
    Injured,
    InvalidAmount,
    OutOfRange,
    MissingZone,
    InProgress,
    UnknownZone,
    /// The stake was taken but the balance went negative, so no session opened.
    InsufficientBalance,
    /// Ledger failure; nothing was said in chat.
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyJoined,
    NotForming,
    Injured,
    InsufficientBalance,
    Aborted,
}

pub enum HeistCommand {
    Start {
        channel: String,
        user: String,
        args: Vec<String>,
        reply: oneshot::Sender<StartOutcome>,
    },
    Join {
        channel: String,
        user: String,
        reply: oneshot::Sender<JoinOutcome>,
    },
    WindowOpened {
        session_id: Uuid,
    },
    WindowClosed {
        session_id: Uuid,
    },
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

/// Settings the actor needs from the bot configuration.
#[derive(Debug, Clone)]
pub struct HeistSettings {
    pub prefix: char,
    pub heist: HeistConfig,
    /// Epoch milliseconds; swapped out in tests.
    pub clock: fn() -> i64,
}

pub fn system_now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl HeistSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            prefix: config.bot.prefix_char(),
            heist: config.heist.clone(),
            clock: system_now_ms,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HeistHandle {
    tx: mpsc::UnboundedSender<HeistCommand>,
}

impl HeistHandle {
    pub async fn start(&self, channel: &str, user: &str, args: Vec<String>) -> StartOutcome {
        let (reply, rx) = oneshot::channel();
        let cmd = HeistCommand::Start {
            channel: channel.to_string(),
            user: user.to_string(),
            args,
            reply,
        };
        if self.tx.send(cmd).is_err() {
            return StartOutcome::Aborted;
        }
        rx.await.unwrap_or(StartOutcome::Aborted)
    }

    pub async fn join(&self, channel: &str, user: &str) -> JoinOutcome {
        let (reply, rx) = oneshot::channel();
        let cmd = HeistCommand::Join {
            channel: channel.to_string(),
            user: user.to_string(),
            reply,
        };
        if self.tx.send(cmd).is_err() {
            return JoinOutcome::Aborted;
        }
        rx.await.unwrap_or(JoinOutcome::Aborted)
    }

    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(HeistCommand::Snapshot(tx)).ok()?;
        rx.await.ok()
    }

    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(HeistCommand::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

/// Spawn the session actor and return its handle.
pub fn spawn_heist_actor(
    settings: HeistSettings,
    store: BotStore,
    chat: mpsc::UnboundedSender<OutgoingMessage>,
    rng: StdRng,
) -> HeistHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<HeistCommand>();
    let handle = HeistHandle { tx: tx.clone() };
    let mut actor = HeistActor {
        settings,
        store,
        chat,
        rng,
        session: None,
        timers: tx.downgrade(),
    };
    drop(tx);
    tokio::spawn(async move {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                HeistCommand::Start {
                    channel,
                    user,
                    args,
                    reply,
                } => {
                    let _ = reply.send(actor.handle_start(&channel, &user, &args));
                }
                HeistCommand::Join {
                    channel,
                    user,
                    reply,
                } => {
                    let _ = reply.send(actor.handle_join(&channel, &user));
                }
                HeistCommand::WindowOpened { session_id } => actor.handle_window_opened(session_id),
                HeistCommand::WindowClosed { session_id } => actor.handle_window_closed(session_id),
                HeistCommand::Snapshot(tx) => {
                    let _ = tx.send(actor.snapshot());
                }
                HeistCommand::Shutdown(done) => {
                    let _ = done.send(());
                    break;
                }
            }
        }
        debug!("heist actor stopped");
    });
    handle
}

fn minutes_list(minutes: &[i64]) -> String {
    minutes
        .iter()
        .map(|m| format!("{} minutes", m))
        .collect::<Vec<_>>()
        .join(", ")
}

struct HeistActor {
    settings: HeistSettings,
    store: BotStore,
    chat: mpsc::UnboundedSender<OutgoingMessage>,
    rng: StdRng,
    session: Option<Session>,
    timers: mpsc::WeakUnboundedSender<HeistCommand>,
}

impl HeistActor {
    fn now_ms(&self) -> i64 {
        (self.settings.clock)()
    }

    fn say(&self, channel: &str, text: impl Into<String>) {
        let _ = self.chat.send(OutgoingMessage::new(channel, text));
    }

    fn snapshot(&self) -> SessionSnapshot {
        match &self.session {
            Some(s) => SessionSnapshot {
                state: s.state,
                session_id: Some(s.id),
                bet_amount: Some(s.bet_amount),
                zone: Some(s.zone.clone()),
                participants: s.participants.clone(),
            },
            None => SessionSnapshot {
                state: SessionState::Idle,
                session_id: None,
                bet_amount: None,
                zone: None,
                participants: Vec::new(),
            },
        }
    }

    fn handle_start(&mut self, channel: &str, user: &str, args: &[String]) -> StartOutcome {
        let now = self.now_ms();
        let injuries = match self.store.load_all_injuries() {
            Ok(mut all) => all.remove(&user.to_lowercase()).unwrap_or_default(),
            Err(e) => {
                warn!("heist: failed to load injuries: {}", e);
                Vec::new()
            }
        };
        if let Some(block) = start_gate(&injuries, now) {
            let noun = if block.active == 1 { "injury" } else { "injuries" };
            self.say(
                channel,
                format!(
                    "{} has {} active {} and needs to wait {} to recover.",
                    user,
                    block.active,
                    noun,
                    minutes_list(&block.remaining_minutes)
                ),
            );
            return StartOutcome::Injured;
        }

        let Some(bet_amount) = args.first().and_then(|a| parse_leading_int(a)) else {
            self.say(channel, "Please provide a valid amount for the heist.");
            return StartOutcome::InvalidAmount;
        };
        if !(MIN_BET..=MAX_BET).contains(&bet_amount) {
            self.say(
                channel,
                format!(
                    "The heist minimum/maximum should be between {} and {}.",
                    MIN_BET, MAX_BET
                ),
            );
            return StartOutcome::OutOfRange;
        }

        let catalog = ZoneCatalog::load(&self.settings.heist);
        if args.len() < 2 {
            self.say(
                channel,
                format!(
                    "You must choose a zone to start the heist: {}",
                    catalog.display_names()
                ),
            );
            return StartOutcome::MissingZone;
        }
        if self.session.is_some() {
            self.say(
                channel,
                "A heist is already in progress. Please wait for the current heist to finish.",
            );
            return StartOutcome::InProgress;
        }
        let requested = args[1..].join(" ");
        let Some(zone) = catalog.find(&requested).cloned() else {
            self.say(
                channel,
                format!(
                    "The specified zone \"{}\" does not exist. Available zones are: {}",
                    requested,
                    catalog.display_names()
                ),
            );
            return StartOutcome::UnknownZone;
        };

        // The stake is written before the balance is checked and is kept on failure.
        let balance = match self.store.increment_balance(user, -bet_amount) {
            Ok(balance) => balance,
            Err(e) => {
                let e = HeistError::from(e);
                error!("heist: start by {} aborted: {}", escape_log(user), e);
                return StartOutcome::Aborted;
            }
        };
        if balance < 0 {
            warn!(
                "heist: {} staked {} without funds (balance now {})",
                escape_log(user),
                bet_amount,
                balance
            );
            self.say(channel, "Insufficient balance for the heist.");
            return StartOutcome::InsufficientBalance;
        }

        let session = Session {
            id: Uuid::new_v4(),
            state: SessionState::Forming,
            channel: channel.to_string(),
            initiator: user.to_string(),
            bet_amount,
            zone,
            participants: vec![user.to_string()],
        };
        let session_id = session.id;
        info!(
            "heist {}: started by {} in {} (bet {}, zone {})",
            session_id,
            escape_log(user),
            escape_log(channel),
            bet_amount,
            escape_log(&session.zone.name)
        );
        self.session = Some(session);
        metrics::inc_heists_started();
        self.say(
            channel,
            format!(
                "A heist has been started by {}! Type {}join to participate, you have {} seconds to join!",
                user,
                self.settings.prefix,
                JOIN_WINDOW.as_secs()
            ),
        );
        self.schedule_window(session_id);
        StartOutcome::Started { session_id }
    }

    fn schedule_window(&self, session_id: Uuid) {
        let timers = self.timers.clone();
        tokio::spawn(async move {
            sleep(ANNOUNCE_DELAY).await;
            match timers.upgrade() {
                Some(tx) => {
                    let _ = tx.send(HeistCommand::WindowOpened { session_id });
                }
                None => return,
            }
            sleep(JOIN_WINDOW).await;
            if let Some(tx) = timers.upgrade() {
                let _ = tx.send(HeistCommand::WindowClosed { session_id });
            }
        });
    }

    fn handle_window_opened(&mut self, session_id: Uuid) {
        let Some(session) = self.session.as_ref().filter(|s| s.id == session_id) else {
            return;
        };
        self.say(
            &session.channel,
            format!("{} has joined the heist!", session.initiator),
        );
    }

    fn handle_join(&mut self, channel: &str, user: &str) -> JoinOutcome {
        let bet_amount = match &self.session {
            Some(s) if s.state == SessionState::Forming => {
                if s.has_participant(user) {
                    return JoinOutcome::AlreadyJoined;
                }
                s.bet_amount
            }
            _ => return JoinOutcome::NotForming,
        };

        let now = self.now_ms();
        let injuries = self.store.injuries_for(user).unwrap_or_else(|e| {
            warn!("heist: failed to load injuries for {}: {}", escape_log(user), e);
            Vec::new()
        });
        if let Some(minutes) = join_gate(&injuries, now) {
            self.say(
                channel,
                format!(
                    "{} has an injury and needs to wait {} minutes to recover.",
                    user, minutes
                ),
            );
            return JoinOutcome::Injured;
        }

        match self.store.try_debit(user, bet_amount) {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.say(channel, "Insufficient balance to join the heist.");
                return JoinOutcome::InsufficientBalance;
            }
            Err(e) => {
                let e = HeistError::from(e);
                error!("heist: join by {} aborted: {}", escape_log(user), e);
                return JoinOutcome::Aborted;
            }
        }

        if let Some(session) = self.session.as_mut() {
            session.participants.push(user.to_string());
            debug!(
                "heist {}: {} joined ({} in crew)",
                session.id,
                escape_log(user),
                session.participants.len()
            );
        }
        metrics::inc_heist_joins();
        self.say(channel, format!("{} has joined the heist!", user));
        JoinOutcome::Joined
    }

    fn handle_window_closed(&mut self, session_id: Uuid) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        if session.id != session_id || session.state != SessionState::Forming {
            debug!("heist: ignoring stale window close for {}", session_id);
            self.session = Some(session);
            return;
        }
        session.state = SessionState::Resolving;

        if session.participants.len() < MIN_PARTICIPANTS {
            metrics::inc_heists_cancelled();
            self.say(
                &session.channel,
                format!(
                    "The heist requires a minimum of {} participants. The heist has been canceled.",
                    MIN_PARTICIPANTS
                ),
            );
        } else {
            match self.resolve(&session) {
                Ok(message) => self.say(&session.channel, message),
                Err(e) => error!("heist {}: resolution aborted: {}", session.id, e),
            }
        }

        let now = self.now_ms();
        match self.store.delete_expired_injuries(now) {
            Ok(0) => {}
            Ok(n) => debug!("heist: pruned {} expired injuries", n),
            Err(e) => warn!("heist: failed to prune injuries: {}", e),
        }
    }

    /// Roll the outcome, apply it to the ledger and injury store, and build the
    /// result line.
    fn resolve(&mut self, session: &Session) -> Result<String, HeistError> {
        let difficulty = session.zone.difficulty;
        let rate = compute_success_rate(difficulty, session.participants.len());
        let success = roll_success(rate, &mut self.rng);
        info!(
            "heist {}: {} participants, rate {:.3}, success={}",
            session.id,
            session.participants.len(),
            rate,
            success
        );

        let mut message = format!("Heist initiated by {}.", session.initiator);
        if success {
            let loot = compute_loot(session.bet_amount as u64, difficulty, &mut self.rng);
            let payout = distribute_payout(loot.total_amount, &session.participants, &mut self.rng);
            let credit = i64::try_from(payout.per_winner).unwrap_or(i64::MAX);
            for winner in &payout.winners {
                self.store.increment_balance(winner, credit)?;
            }
            metrics::inc_heists_succeeded();
            metrics::add_loot_paid(payout.total_paid());

            message.push_str(" The heist was successful!");
            message.push_str(&format!(
                " Congratulations to the winners: {}.",
                payout.winners.join(", ")
            ));
            message.push_str(&format!(
                " You managed to steal {} units of loot. You stole the following items: {}",
                loot.total_amount,
                loot.items.join(", ")
            ));
        } else {
            metrics::inc_heists_failed();
            message.push_str(" The heist failed. Better luck next time!");
            let now = self.now_ms();
            for participant in &session.participants {
                let Some(injury) = roll_injury(&mut self.rng, now) else {
                    continue;
                };
                metrics::inc_injuries_dealt();
                message.push_str(&format!(
                    " {} received a {} injury and needs to recover for {} minutes. {}",
                    participant,
                    injury.severity,
                    injury.display_minutes(),
                    injury.description
                ));
                self.record_injury(participant, injury);
            }
        }
        Ok(message)
    }

    fn record_injury(&self, participant: &str, injury: Injury) {
        let mut injuries = self.store.injuries_for(participant).unwrap_or_else(|e| {
            warn!(
                "heist: failed to load injuries for {}: {}",
                escape_log(participant),
                e
            );
            Vec::new()
        });
        injuries.push(injury);
        if let Err(e) = self.store.upsert_injuries(participant, &injuries) {
            warn!(
                "heist: failed to save injury for {}: {}",
                escape_log(participant),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minute_list_is_comma_separated() {
        assert_eq!(minutes_list(&[3, 12]), "3 minutes, 12 minutes");
        assert_eq!(minutes_list(&[1]), "1 minutes");
    }

    #[test]
    fn missing_account_maps_from_not_found() {
        let e = HeistError::from(StoreError::NotFound("account: bob".into()));
        assert!(matches!(e, HeistError::MissingAccount(_)));
        let e = HeistError::from(StoreError::Corrupt("x".into()));
        assert!(matches!(e, HeistError::Store(_)));
    }
}
