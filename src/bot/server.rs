//! Bot server: owns the store, the heist actor and the chat connection, and routes
//! every chat message to its command handler.

use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::counter::handle_counter;
use super::discord::Notifiers;
use super::moderation::{handle_ban, handle_shoutout, UserApi};
use super::public::{BotCommand, CommandParser};
use crate::config::Config;
use crate::heist::{spawn_heist_actor, HeistHandle, HeistSettings, StartOutcome};
use crate::logutil::escape_log;
use crate::metrics;
use crate::storage::{BotStore, StoreError};
use crate::twitch::{ChatEvent, OutgoingMessage, TwitchConnection};

pub struct BotServer {
    config: Config,
    store: BotStore,
    parser: CommandParser,
    heist: HeistHandle,
    outgoing_tx: mpsc::UnboundedSender<OutgoingMessage>,
    outgoing_rx: Option<mpsc::UnboundedReceiver<OutgoingMessage>>,
    user_api: Option<Arc<dyn UserApi>>,
    notifiers: Notifiers,
    connection: Option<TwitchConnection>,
}

impl BotServer {
    /// Open the store under `storage.data_dir` and start the heist actor.
    pub async fn new(config: Config) -> Result<Self> {
        let store = BotStore::open_in_data_dir(&config.storage.data_dir)
            .map_err(|e| anyhow!("Failed to open store in {}: {}", config.storage.data_dir, e))?;
        let mut server = Self::with_store(config, store, StdRng::from_entropy());

        #[cfg(feature = "helix")]
        if let Some(client) = super::helix::HelixClient::from_config(&server.config.twitch) {
            server.user_api = Some(Arc::new(client));
        }
        if server.user_api.is_none() {
            info!("Helix client id not configured; !ban and !shoutout are disabled");
        }
        server.notifiers = Notifiers::from_config(&server.config.discord);
        Ok(server)
    }

    /// Build a server around an existing store with a caller-supplied RNG.
    /// No integrations are attached; see [`Self::set_user_api`].
    pub fn with_store(config: Config, store: BotStore, rng: StdRng) -> Self {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let heist = spawn_heist_actor(
            HeistSettings::from_config(&config),
            store.clone(),
            outgoing_tx.clone(),
            rng,
        );
        Self {
            parser: CommandParser::new(config.bot.prefix_char()),
            config,
            store,
            heist,
            outgoing_tx,
            outgoing_rx: Some(outgoing_rx),
            user_api: None,
            notifiers: Notifiers::default(),
            connection: None,
        }
    }

    pub fn set_user_api(&mut self, api: Arc<dyn UserApi>) {
        self.user_api = Some(api);
    }

    pub fn set_notifiers(&mut self, notifiers: Notifiers) {
        self.notifiers = notifiers;
    }

    pub fn store(&self) -> &BotStore {
        &self.store
    }

    pub fn heist(&self) -> &HeistHandle {
        &self.heist
    }

    /// Take the outgoing chat queue, e.g. to inspect replies in tests. Once taken,
    /// [`Self::connect`] has nothing to forward.
    pub fn take_outgoing(&mut self) -> Option<mpsc::UnboundedReceiver<OutgoingMessage>> {
        self.outgoing_rx.take()
    }

    fn say(&self, channel: &str, text: impl Into<String>) {
        let _ = self.outgoing_tx.send(OutgoingMessage::new(channel, text));
    }

    /// Connect to Twitch and start forwarding queued replies to the writer.
    pub async fn connect(&mut self) -> Result<()> {
        let connection = TwitchConnection::connect(&self.config.twitch).await?;
        let writer = connection.outgoing_sender();
        if let Some(mut rx) = self.outgoing_rx.take() {
            tokio::spawn(async move {
                while let Some(msg) = rx.recv().await {
                    if writer.send(msg).is_err() {
                        break;
                    }
                }
            });
        }
        self.connection = Some(connection);
        Ok(())
    }

    pub async fn run(&mut self) -> Result<()> {
        info!(
            "{} started; joining {:?}",
            self.config.bot.name, self.config.twitch.channels
        );
        if self.connection.is_none() {
            self.connect().await?;
        }

        loop {
            tokio::select! {
                event = async {
                    if let Some(ref mut conn) = self.connection {
                        conn.events.recv().await
                    } else {
                        std::future::pending().await
                    }
                } => {
                    match event {
                        Some(event) => {
                            if let Err(e) = self.route_chat_event(&event).await {
                                warn!("route_chat_event error: {e:?}");
                            }
                        }
                        None => {
                            warn!("Chat event channel closed");
                            break;
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }
        self.shutdown().await
    }

    /// Handle one chat message. `!ban` and `!shoutout` call out to Helix and Discord,
    /// so they run on their own task and reply through the outgoing queue; the next
    /// event (often a `!join` racing the window) is never held up behind them.
    pub async fn route_chat_event(&self, event: &ChatEvent) -> Result<()> {
        match self
            .store
            .ensure_account(&event.user, self.config.bot.starting_balance)
        {
            Ok(true) => info!(
                "New chatter {} starts with {} coins",
                event.user, self.config.bot.starting_balance
            ),
            Ok(false) => {}
            Err(e) => warn!("Failed to register {}: {}", escape_log(&event.user), e),
        }

        let command = self.parser.parse(&event.text);
        if command == BotCommand::Unknown {
            return Ok(());
        }
        metrics::record_command(command.name());
        let prefix = self.parser.prefix();

        match command {
            BotCommand::Heist(args) => {
                let outcome = self.heist.start(&event.channel, &event.user, args).await;
                if let StartOutcome::Started { session_id } = outcome {
                    debug!("heist {} opened by {}", session_id, event.user);
                }
            }
            BotCommand::Join => {
                let outcome = self.heist.join(&event.channel, &event.user).await;
                debug!("join by {}: {:?}", event.user, outcome);
            }
            BotCommand::Balance => {
                let balance = match self.store.get_balance(&event.user) {
                    Ok(b) => b,
                    Err(StoreError::NotFound(_)) => 0,
                    Err(e) => return Err(e.into()),
                };
                self.say(
                    &event.channel,
                    format!("@{}, your balance is {} coins.", event.user, balance),
                );
            }
            BotCommand::Counter(args) => {
                let reply = handle_counter(&self.store, prefix, &args)?;
                self.say(&event.channel, reply);
            }
            BotCommand::Ban(args) => {
                let Some(api) = self.user_api.clone() else {
                    warn!("!ban used by {} but no Twitch API is configured", event.user);
                    return Ok(());
                };
                let notifiers = self.notifiers.clone();
                let outgoing = self.outgoing_tx.clone();
                let event = event.clone();
                tokio::spawn(async move {
                    if let Some(reply) =
                        handle_ban(api.as_ref(), &notifiers, prefix, &event, &args).await
                    {
                        let _ = outgoing.send(OutgoingMessage::new(&event.channel, reply));
                    }
                });
            }
            BotCommand::Shoutout(args) => {
                let Some(api) = self.user_api.clone() else {
                    warn!("!shoutout used by {} but no Twitch API is configured", event.user);
                    return Ok(());
                };
                let notifiers = self.notifiers.clone();
                let outgoing = self.outgoing_tx.clone();
                let broadcaster_id = self.config.twitch.broadcaster_id.clone();
                let event = event.clone();
                tokio::spawn(async move {
                    if let Some(reply) = handle_shoutout(
                        api.as_ref(),
                        &notifiers,
                        prefix,
                        &broadcaster_id,
                        &event,
                        &args,
                    )
                    .await
                    {
                        let _ = outgoing.send(OutgoingMessage::new(&event.channel, reply));
                    }
                });
            }
            BotCommand::Unknown => {}
        }
        Ok(())
    }

    pub async fn show_status(&self) -> Result<()> {
        println!("=== Heistbot Status ===");
        println!("Bot Name: {}", self.config.bot.name);
        println!("Channels: {}", self.config.twitch.channels.join(", "));
        println!("Command Prefix: {}", self.parser.prefix());
        println!("Accounts: {}", self.store.account_count());
        println!("Players With Injuries: {}", self.store.injury_record_count());
        match self.heist.snapshot().await {
            Some(snap) => println!("Heist: {:?} ({} in crew)", snap.state, snap.participants.len()),
            None => println!("Heist: actor not running"),
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down bot...");
        self.heist.shutdown().await;
        if let Some(connection) = self.connection.take() {
            connection.shutdown().await;
        }
        info!("Metrics: {}", metrics::snapshot());
        self.store.flush()?;
        info!("Bot shutdown complete");
        Ok(())
    }
}
