//! Test utilities & fixtures shared by the integration tests.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use heistbot::bot::discord::{Embed, Notifier, Notifiers};
use heistbot::bot::moderation::{ChannelInfo, TwitchUser, UserApi};
use heistbot::config::{Config, HeistConfig};
use heistbot::heist::{spawn_heist_actor, HeistHandle, HeistSettings};
use heistbot::storage::{BotStore, BotStoreBuilder};
use heistbot::twitch::OutgoingMessage;

pub const CHANNEL: &str = "heistchan";

/// Fixed "now" used by tests that care about injury timing.
pub const T0: i64 = 1_700_000_000_000;

pub fn fixed_clock() -> i64 {
    T0
}

/// Fresh store in a temp dir. Keep the `TempDir` alive for the test's duration.
pub fn temp_store() -> (tempfile::TempDir, BotStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = BotStoreBuilder::new(dir.path().join("db"))
        .open()
        .expect("open store");
    (dir, store)
}

pub fn test_config(data_dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.storage.data_dir = data_dir.to_string_lossy().to_string();
    config.twitch.channels = vec![CHANNEL.to_string()];
    config.twitch.broadcaster_id = "1000".to_string();
    config.logging.file = None;
    config
}

pub struct ActorHarness {
    pub handle: HeistHandle,
    pub chat: mpsc::UnboundedReceiver<OutgoingMessage>,
}

/// Heist actor over `store` with the default zones, a seeded RNG and the given clock.
pub fn spawn_actor(store: &BotStore, seed: u64, clock: fn() -> i64) -> ActorHarness {
    let (tx, rx) = mpsc::unbounded_channel();
    let settings = HeistSettings {
        prefix: '!',
        heist: HeistConfig::default(),
        clock,
    };
    let handle = spawn_heist_actor(settings, store.clone(), tx, StdRng::seed_from_u64(seed));
    ActorHarness { handle, chat: rx }
}

/// Everything queued for chat so far, as text.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<OutgoingMessage>) -> Vec<String> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg.text);
    }
    out
}

/// Wait for the next chat line, e.g. a reply sent from a spawned moderation task.
pub async fn next_reply(rx: &mut mpsc::UnboundedReceiver<OutgoingMessage>) -> String {
    let received = tokio_test::assert_ok!(
        tokio::time::timeout(Duration::from_secs(60), rx.recv()).await,
        "no chat reply arrived"
    );
    received.expect("outgoing queue closed").text
}

pub fn args(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

/// In-memory stand-in for Helix.
#[derive(Default)]
pub struct FakeUserApi {
    pub users: HashMap<String, TwitchUser>,
    pub channels: HashMap<String, ChannelInfo>,
    pub live: Vec<String>,
    pub bans: Mutex<Vec<(String, String, String)>>,
    pub shoutouts: Mutex<Vec<(String, String)>>,
}

impl FakeUserApi {
    pub fn with_user(mut self, id: &str, login: &str, display: &str) -> Self {
        self.users.insert(
            login.to_string(),
            TwitchUser {
                id: id.to_string(),
                login: login.to_string(),
                display_name: display.to_string(),
                profile_image_url: format!("https://img.example/{}.png", login),
            },
        );
        self
    }

    pub fn with_channel(mut self, id: &str, login: &str, name: &str, game: &str) -> Self {
        self.channels.insert(
            id.to_string(),
            ChannelInfo {
                broadcaster_id: id.to_string(),
                broadcaster_login: login.to_string(),
                broadcaster_name: name.to_string(),
                game_name: game.to_string(),
            },
        );
        self
    }

    pub fn live(mut self, login: &str) -> Self {
        self.live.push(login.to_string());
        self
    }
}

#[async_trait]
impl UserApi for FakeUserApi {
    async fn user_by_login(&self, login: &str) -> Result<Option<TwitchUser>> {
        Ok(self.users.get(login).cloned())
    }

    async fn channel_info(&self, broadcaster_id: &str) -> Result<Option<ChannelInfo>> {
        Ok(self.channels.get(broadcaster_id).cloned())
    }

    async fn is_live(&self, login: &str) -> Result<bool> {
        Ok(self.live.iter().any(|l| l == login))
    }

    async fn ban_user(&self, broadcaster_id: &str, user_id: &str, reason: &str) -> Result<()> {
        self.bans.lock().map_err(|_| anyhow!("poisoned"))?.push((
            broadcaster_id.to_string(),
            user_id.to_string(),
            reason.to_string(),
        ));
        Ok(())
    }

    async fn shoutout(&self, from_broadcaster_id: &str, to_broadcaster_id: &str) -> Result<()> {
        self.shoutouts
            .lock()
            .map_err(|_| anyhow!("poisoned"))?
            .push((from_broadcaster_id.to_string(), to_broadcaster_id.to_string()));
        Ok(())
    }
}

/// Notifier that keeps every embed it is given.
#[derive(Default)]
pub struct RecordingNotifier {
    pub embeds: Mutex<Vec<Embed>>,
}

impl RecordingNotifier {
    pub fn titles(&self) -> Vec<String> {
        self.embeds
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| e.title.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, embeds: &[Embed]) -> Result<()> {
        self.embeds.lock().unwrap().extend_from_slice(embeds);
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

pub fn recording_notifiers() -> (Arc<RecordingNotifier>, Arc<RecordingNotifier>, Notifiers) {
    let usage = Arc::new(RecordingNotifier::default());
    let activity = Arc::new(RecordingNotifier::default());
    let notifiers = Notifiers {
        command_usage: Some(usage.clone() as Arc<dyn Notifier>),
        activity: Some(activity.clone() as Arc<dyn Notifier>),
    };
    (usage, activity, notifiers)
}

/// Wraps [`FakeUserApi`] and stalls every user lookup, like a Helix call near its timeout.
pub struct SlowUserApi {
    pub inner: FakeUserApi,
    pub delay: Duration,
}

#[async_trait]
impl UserApi for SlowUserApi {
    async fn user_by_login(&self, login: &str) -> Result<Option<TwitchUser>> {
        tokio::time::sleep(self.delay).await;
        self.inner.user_by_login(login).await
    }

    async fn channel_info(&self, broadcaster_id: &str) -> Result<Option<ChannelInfo>> {
        self.inner.channel_info(broadcaster_id).await
    }

    async fn is_live(&self, login: &str) -> Result<bool> {
        self.inner.is_live(login).await
    }

    async fn ban_user(&self, broadcaster_id: &str, user_id: &str, reason: &str) -> Result<()> {
        self.inner.ban_user(broadcaster_id, user_id, reason).await
    }

    async fn shoutout(&self, from_broadcaster_id: &str, to_broadcaster_id: &str) -> Result<()> {
        self.inner.shoutout(from_broadcaster_id, to_broadcaster_id).await
    }
}
