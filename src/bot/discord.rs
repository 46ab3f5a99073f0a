//! Discord webhook notifications.
//!
//! Moderation commands post an [`Embed`] to the command-usage webhook; shoutouts also
//! post to the channel-activity webhook. Delivery failures are logged and never reach
//! chat.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::config::{DiscordConfig, WebhookConfig};

/// Discord palette colours.
pub mod colour {
    pub const RED: u32 = 0xED4245;
    pub const YELLOW: u32 = 0xFEE75C;
    pub const GREEN: u32 = 0x57F287;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedAuthor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedImage {
    pub url: String,
}

/// Discord embed object, built fluently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Embed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn colour(mut self, colour: u32) -> Self {
        self.color = Some(colour);
        self
    }

    pub fn author(mut self, name: impl Into<String>, icon_url: Option<String>) -> Self {
        self.author = Some(EmbedAuthor {
            name: name.into(),
            icon_url: icon_url.filter(|u| !u.is_empty()),
        });
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn footer(mut self, text: impl Into<String>) -> Self {
        self.footer = Some(EmbedFooter { text: text.into() });
        self
    }

    pub fn thumbnail(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        if !url.is_empty() {
            self.thumbnail = Some(EmbedImage { url });
        }
        self
    }

    pub fn timestamp_now(mut self) -> Self {
        self.timestamp = Some(Utc::now());
        self
    }
}

/// Webhook request body.
#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub embeds: &'a [Embed],
}

/// A destination for embeds.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, embeds: &[Embed]) -> Result<()>;

    fn name(&self) -> &str;
}

/// The two webhook destinations the bot posts to. Either may be absent.
#[derive(Clone, Default)]
pub struct Notifiers {
    pub command_usage: Option<Arc<dyn Notifier>>,
    pub activity: Option<Arc<dyn Notifier>>,
}

impl Notifiers {
    #[cfg(feature = "discord")]
    pub fn from_config(config: &DiscordConfig) -> Self {
        let make = |w: &Option<WebhookConfig>, name: &'static str| {
            w.as_ref()
                .map(|w| Arc::new(DiscordWebhook::new(name, w)) as Arc<dyn Notifier>)
        };
        Self {
            command_usage: make(&config.command_usage, "command_usage"),
            activity: make(&config.activity, "activity"),
        }
    }

    #[cfg(not(feature = "discord"))]
    pub fn from_config(config: &DiscordConfig) -> Self {
        if config.command_usage.is_some() || config.activity.is_some() {
            log::warn!("Discord webhooks configured but the 'discord' feature is disabled");
        }
        Self::default()
    }

    pub async fn command_usage(&self, embed: Embed) {
        deliver(self.command_usage.as_deref(), "command_usage", embed).await;
    }

    pub async fn activity(&self, embed: Embed) {
        deliver(self.activity.as_deref(), "activity", embed).await;
    }
}

async fn deliver(target: Option<&dyn Notifier>, label: &str, embed: Embed) {
    match target {
        Some(notifier) => {
            if let Err(e) = notifier.send(std::slice::from_ref(&embed)).await {
                log::warn!("Discord {} webhook failed: {}", notifier.name(), e);
            }
        }
        None => log::debug!(
            "No {} webhook configured; dropping embed {:?}",
            label,
            embed.title.as_deref().unwrap_or_default()
        ),
    }
}

pub fn webhook_url(config: &WebhookConfig) -> String {
    format!(
        "https://discord.com/api/webhooks/{}/{}",
        config.id, config.token
    )
}

#[cfg(feature = "discord")]
pub struct DiscordWebhook {
    name: &'static str,
    url: String,
    client: reqwest::Client,
}

#[cfg(feature = "discord")]
impl DiscordWebhook {
    pub fn new(name: &'static str, config: &WebhookConfig) -> Self {
        Self {
            name,
            url: webhook_url(config),
            client: reqwest::Client::new(),
        }
    }
}

#[cfg(feature = "discord")]
#[async_trait]
impl Notifier for DiscordWebhook {
    async fn send(&self, embeds: &[Embed]) -> Result<()> {
        use anyhow::anyhow;
        use std::time::Duration;

        let request = self
            .client
            .post(&self.url)
            .json(&WebhookPayload { embeds })
            .send();
        let response = tokio::time::timeout(Duration::from_secs(10), request)
            .await
            .map_err(|_| anyhow!("Request timeout after 10s"))?
            .map_err(|e| anyhow!("HTTP request failed: {}", e))?;
        if !response.status().is_success() {
            return Err(anyhow!("Webhook returned status: {}", response.status()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        self.name
    }
}
