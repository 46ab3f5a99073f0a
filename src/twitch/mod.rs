//! # Twitch chat transport
//!
//! Connects to Twitch IRC over plain TCP and splits the socket into a reader task and
//! a writer task:
//!
//! - the reader parses lines, answers `PING` through the writer and forwards chat
//!   messages as [`ChatEvent`]s
//! - the writer drains [`OutgoingMessage`]s, keeping at least `min_send_gap_ms`
//!   between two chat lines so the account stays under Twitch rate limits
//!
//! ```toml
//! [twitch]
//! server = "irc.chat.twitch.tv"
//! port = 6667
//! nick = "my_bot"
//! oauth_token = "oauth:..."
//! channels = ["my_channel"]
//! ```

pub mod irc;

use anyhow::{anyhow, Result};
use log::{debug, error, info, trace, warn};
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use crate::config::TwitchConfig;
use crate::logutil::{escape_log, single_line};
use irc::IrcMessage;

/// One chat line seen in a joined channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    /// Channel name without `#`.
    pub channel: String,
    /// Lowercase login.
    pub user: String,
    pub display_name: String,
    pub text: String,
    pub is_mod: bool,
    pub is_broadcaster: bool,
}

impl ChatEvent {
    /// A message from a regular chatter.
    pub fn new(channel: &str, user: &str, text: &str) -> Self {
        Self {
            channel: channel.trim_start_matches('#').to_string(),
            user: user.to_lowercase(),
            display_name: user.to_string(),
            text: text.to_string(),
            is_mod: false,
            is_broadcaster: false,
        }
    }

    /// Build an event from a parsed `PRIVMSG`.
    pub fn from_privmsg(msg: &IrcMessage) -> Option<Self> {
        if msg.command != "PRIVMSG" || msg.params.len() < 2 {
            return None;
        }
        let login = msg.nick()?.to_lowercase();
        let display_name = msg
            .tag("display-name")
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| login.clone());
        let is_broadcaster = msg
            .tag("badges")
            .map(|b| b.split(',').any(|badge| badge.starts_with("broadcaster/")))
            .unwrap_or(false);
        Some(Self {
            channel: msg.params[0].trim_start_matches('#').to_string(),
            user: login,
            display_name,
            text: msg.params[1].clone(),
            is_mod: msg.tag("mod") == Some("1"),
            is_broadcaster,
        })
    }
}

/// A chat line queued for the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub channel: String,
    pub text: String,
}

impl OutgoingMessage {
    pub fn new(channel: &str, text: impl Into<String>) -> Self {
        Self {
            channel: channel.trim_start_matches('#').to_string(),
            text: text.into(),
        }
    }

    /// `PRIVMSG #channel :text` with CR/LF removed from the body.
    pub fn to_irc_line(&self) -> String {
        format!("PRIVMSG #{} :{}\r\n", self.channel, single_line(&self.text))
    }
}

/// Control messages for coordinating between tasks
#[derive(Debug)]
pub enum ControlMessage {
    Shutdown,
    /// Answer a server `PING` with this token.
    Pong(String),
}

#[derive(Debug, Clone)]
pub struct WriterTuning {
    pub min_send_gap_ms: u64,
}

impl Default for WriterTuning {
    fn default() -> Self {
        Self {
            min_send_gap_ms: 1500,
        }
    }
}

/// Login lines sent right after the socket opens.
pub fn login_lines(config: &TwitchConfig) -> Vec<String> {
    let token = if config.oauth_token.starts_with("oauth:") {
        config.oauth_token.clone()
    } else {
        format!("oauth:{}", config.oauth_token)
    };
    let mut lines = vec![
        format!("PASS {}\r\n", token),
        format!("NICK {}\r\n", config.nick.to_lowercase()),
        "CAP REQ :twitch.tv/tags twitch.tv/commands\r\n".to_string(),
    ];
    for channel in &config.channels {
        lines.push(format!(
            "JOIN #{}\r\n",
            channel.trim_start_matches('#').to_lowercase()
        ));
    }
    lines
}

pub struct TwitchReader<R> {
    lines: R,
    event_tx: mpsc::UnboundedSender<ChatEvent>,
    writer_control_tx: mpsc::UnboundedSender<ControlMessage>,
    control_rx: mpsc::UnboundedReceiver<ControlMessage>,
}

impl<R: AsyncBufRead + Unpin> TwitchReader<R> {
    pub fn new(
        lines: R,
        event_tx: mpsc::UnboundedSender<ChatEvent>,
        writer_control_tx: mpsc::UnboundedSender<ControlMessage>,
        control_rx: mpsc::UnboundedReceiver<ControlMessage>,
    ) -> Self {
        Self {
            lines,
            event_tx,
            writer_control_tx,
            control_rx,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        info!("Starting Twitch reader task");
        let mut buf = String::new();
        loop {
            buf.clear();
            tokio::select! {
                control_msg = self.control_rx.recv() => {
                    match control_msg {
                        Some(ControlMessage::Shutdown) | None => {
                            info!("Reader task received shutdown signal");
                            break;
                        }
                        Some(_) => {}
                    }
                }
                read = self.lines.read_line(&mut buf) => {
                    match read {
                        Ok(0) => {
                            warn!("Twitch closed the connection");
                            break;
                        }
                        Ok(_) => {
                            if !self.handle_line(&buf) {
                                break;
                            }
                        }
                        Err(e) => {
                            error!("Reader error: {}", e);
                            break;
                        }
                    }
                }
            }
        }
        info!("Twitch reader task shutting down");
        Ok(())
    }

    /// Returns false when the connection should be dropped.
    fn handle_line(&mut self, line: &str) -> bool {
        trace!("< {}", escape_log(line.trim_end()));
        let Some(msg) = irc::parse_line(line) else {
            return true;
        };
        match msg.command.as_str() {
            "PING" => {
                let token = msg.trailing().unwrap_or("tmi.twitch.tv").to_string();
                let _ = self.writer_control_tx.send(ControlMessage::Pong(token));
            }
            "PRIVMSG" => {
                if let Some(event) = ChatEvent::from_privmsg(&msg) {
                    debug!(
                        "#{} <{}> {}",
                        event.channel,
                        event.user,
                        escape_log(&event.text)
                    );
                    if self.event_tx.send(event).is_err() {
                        return false;
                    }
                }
            }
            "NOTICE" => {
                let text = msg.trailing().unwrap_or_default();
                if text.contains("Login authentication failed")
                    || text.contains("Improperly formatted auth")
                {
                    error!("Twitch login rejected: {}", escape_log(text));
                    return false;
                }
                info!("Twitch notice: {}", escape_log(text));
            }
            "RECONNECT" => {
                warn!("Twitch requested a reconnect");
                return false;
            }
            "JOIN" => {
                if let Some(channel) = msg.params.first() {
                    debug!("Joined {}", channel);
                }
            }
            _ => {}
        }
        true
    }
}

pub struct TwitchWriter<W> {
    sink: W,
    outgoing_rx: mpsc::UnboundedReceiver<OutgoingMessage>,
    control_rx: mpsc::UnboundedReceiver<ControlMessage>,
    tuning: WriterTuning,
    last_text_send: Option<Instant>,
}

impl<W: AsyncWrite + Unpin> TwitchWriter<W> {
    pub fn new(
        sink: W,
        outgoing_rx: mpsc::UnboundedReceiver<OutgoingMessage>,
        control_rx: mpsc::UnboundedReceiver<ControlMessage>,
        tuning: WriterTuning,
    ) -> Self {
        Self {
            sink,
            outgoing_rx,
            control_rx,
            tuning,
            last_text_send: None,
        }
    }

    pub async fn write_raw(&mut self, line: &str) -> Result<()> {
        self.sink.write_all(line.as_bytes()).await?;
        self.sink.flush().await?;
        Ok(())
    }

    pub async fn run(mut self) -> Result<()> {
        info!("Starting Twitch writer task");
        loop {
            tokio::select! {
                msg = self.outgoing_rx.recv() => {
                    match msg {
                        Some(outgoing) => {
                            if let Err(e) = self.send_message(&outgoing).await {
                                error!("Failed to send message: {}", e);
                            }
                        }
                        None => {
                            warn!("Outgoing message channel closed, shutting down writer");
                            break;
                        }
                    }
                }
                control_msg = self.control_rx.recv() => {
                    match control_msg {
                        Some(ControlMessage::Pong(token)) => {
                            if let Err(e) = self.write_raw(&format!("PONG :{}\r\n", token)).await {
                                error!("Failed to answer PING: {}", e);
                            }
                        }
                        Some(ControlMessage::Shutdown) | None => {
                            info!("Writer task received shutdown signal");
                            break;
                        }
                    }
                }
            }
        }
        info!("Twitch writer task shutting down");
        Ok(())
    }

    async fn send_message(&mut self, msg: &OutgoingMessage) -> Result<()> {
        self.enforce_min_send_gap(Duration::from_millis(self.tuning.min_send_gap_ms))
            .await;
        debug!("#{} > {}", msg.channel, escape_log(&msg.text));
        self.write_raw(&msg.to_irc_line()).await?;
        self.last_text_send = Some(Instant::now());
        Ok(())
    }

    async fn enforce_min_send_gap(&self, gap: Duration) {
        if let Some(last) = self.last_text_send {
            let elapsed = last.elapsed();
            if elapsed < gap {
                let wait = gap - elapsed;
                trace!("Pacing: delaying chat send by {}ms", wait.as_millis());
                sleep(wait).await;
            }
        }
    }
}

/// A live connection: chat events come out of `events`, replies go into
/// [`TwitchConnection::outgoing_sender`].
pub struct TwitchConnection {
    pub events: mpsc::UnboundedReceiver<ChatEvent>,
    outgoing_tx: mpsc::UnboundedSender<OutgoingMessage>,
    reader_control_tx: mpsc::UnboundedSender<ControlMessage>,
    writer_control_tx: mpsc::UnboundedSender<ControlMessage>,
    reader_task: JoinHandle<Result<()>>,
    writer_task: JoinHandle<Result<()>>,
}

impl TwitchConnection {
    pub async fn connect(config: &TwitchConfig) -> Result<Self> {
        if config.nick.trim().is_empty() {
            return Err(anyhow!("twitch.nick must be set"));
        }
        info!("Connecting to {}:{}", config.server, config.port);
        let stream = TcpStream::connect((config.server.as_str(), config.port))
            .await
            .map_err(|e| anyhow!("Failed to connect to {}:{}: {}", config.server, config.port, e))?;
        let (read_half, write_half) = stream.into_split();

        let (event_tx, events) = mpsc::unbounded_channel();
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (reader_control_tx, reader_control_rx) = mpsc::unbounded_channel();
        let (writer_control_tx, writer_control_rx) = mpsc::unbounded_channel();

        let mut writer = TwitchWriter::new(
            write_half,
            outgoing_rx,
            writer_control_rx,
            WriterTuning {
                min_send_gap_ms: config.send_gap_ms(),
            },
        );
        for line in login_lines(config) {
            writer.write_raw(&line).await?;
        }
        info!(
            "Logged in as {}, joining {} channel(s)",
            config.nick,
            config.channels.len()
        );

        let reader = TwitchReader::new(
            BufReader::new(read_half),
            event_tx,
            writer_control_tx.clone(),
            reader_control_rx,
        );
        let reader_task = tokio::spawn(reader.run());
        let writer_task = tokio::spawn(writer.run());

        Ok(Self {
            events,
            outgoing_tx,
            reader_control_tx,
            writer_control_tx,
            reader_task,
            writer_task,
        })
    }

    pub fn outgoing_sender(&self) -> mpsc::UnboundedSender<OutgoingMessage> {
        self.outgoing_tx.clone()
    }

    pub async fn shutdown(self) {
        let _ = self.reader_control_tx.send(ControlMessage::Shutdown);
        let _ = self.writer_control_tx.send(ControlMessage::Shutdown);
        if let Err(e) = self.reader_task.await {
            warn!("Reader task join error: {}", e);
        }
        if let Err(e) = self.writer_task.await {
            warn!("Writer task join error: {}", e);
        }
    }
}
