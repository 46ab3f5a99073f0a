//! Helix API client backing [`UserApi`].
//!
//! Needs `twitch.client_id` plus a user token with `moderator:manage:banned_users` and
//! `moderator:manage:shoutouts`. Requests time out after ten seconds.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;

use super::moderation::{ChannelInfo, TwitchUser, UserApi};
use crate::config::TwitchConfig;

const HELIX_BASE: &str = "https://api.twitch.tv/helix";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct HelixPage<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct HelixUser {
    id: String,
    login: String,
    display_name: String,
    #[serde(default)]
    profile_image_url: String,
}

#[derive(Debug, Deserialize)]
struct HelixChannel {
    broadcaster_id: String,
    broadcaster_login: String,
    broadcaster_name: String,
    #[serde(default)]
    game_name: String,
}

#[derive(Debug, Deserialize)]
struct HelixStream {
    #[allow(dead_code)]
    id: String,
}

#[derive(Debug, Serialize)]
struct BanRequest<'a> {
    data: BanData<'a>,
}

#[derive(Debug, Serialize)]
struct BanData<'a> {
    user_id: &'a str,
    reason: &'a str,
}

pub struct HelixClient {
    client: reqwest::Client,
    client_id: String,
    token: String,
    moderator_id: String,
}

impl HelixClient {
    /// Returns `None` when no client id is configured.
    pub fn from_config(config: &TwitchConfig) -> Option<Self> {
        if config.client_id.trim().is_empty() {
            return None;
        }
        Some(Self {
            client: reqwest::Client::new(),
            client_id: config.client_id.clone(),
            token: config.helix_token().to_string(),
            moderator_id: if config.moderator_id.is_empty() {
                config.broadcaster_id.clone()
            } else {
                config.moderator_id.clone()
            },
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", HELIX_BASE, path))
            .header("Client-Id", &self.client_id)
            .bearer_auth(&self.token)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = timeout(REQUEST_TIMEOUT, request.send())
            .await
            .map_err(|_| anyhow!("Request timeout after {}s", REQUEST_TIMEOUT.as_secs()))?
            .map_err(|e| anyhow!("HTTP request failed: {}", e))?;
        if !response.status().is_success() {
            return Err(anyhow!("Helix returned status: {}", response.status()));
        }
        Ok(response)
    }

    async fn get_page<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<T>> {
        debug!("Helix GET {}", path);
        let response = self
            .send(self.request(reqwest::Method::GET, path).query(query))
            .await?;
        let page: HelixPage<T> = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse JSON response: {}", e))?;
        Ok(page.data)
    }
}

#[async_trait]
impl UserApi for HelixClient {
    async fn user_by_login(&self, login: &str) -> Result<Option<TwitchUser>> {
        let users: Vec<HelixUser> = self.get_page("/users", &[("login", login)]).await?;
        Ok(users.into_iter().next().map(|u| TwitchUser {
            id: u.id,
            login: u.login,
            display_name: u.display_name,
            profile_image_url: u.profile_image_url,
        }))
    }

    async fn channel_info(&self, broadcaster_id: &str) -> Result<Option<ChannelInfo>> {
        if broadcaster_id.is_empty() {
            return Ok(None);
        }
        let channels: Vec<HelixChannel> = self
            .get_page("/channels", &[("broadcaster_id", broadcaster_id)])
            .await?;
        Ok(channels.into_iter().next().map(|c| ChannelInfo {
            broadcaster_id: c.broadcaster_id,
            broadcaster_login: c.broadcaster_login,
            broadcaster_name: c.broadcaster_name,
            game_name: c.game_name,
        }))
    }

    async fn is_live(&self, login: &str) -> Result<bool> {
        let streams: Vec<HelixStream> = self.get_page("/streams", &[("user_login", login)]).await?;
        Ok(!streams.is_empty())
    }

    async fn ban_user(&self, broadcaster_id: &str, user_id: &str, reason: &str) -> Result<()> {
        let request = self
            .request(reqwest::Method::POST, "/moderation/bans")
            .query(&[
                ("broadcaster_id", broadcaster_id),
                ("moderator_id", self.moderator_id.as_str()),
            ])
            .json(&BanRequest {
                data: BanData { user_id, reason },
            });
        self.send(request).await?;
        Ok(())
    }

    async fn shoutout(&self, from_broadcaster_id: &str, to_broadcaster_id: &str) -> Result<()> {
        let request = self
            .request(reqwest::Method::POST, "/chat/shoutouts")
            .query(&[
                ("from_broadcaster_id", from_broadcaster_id),
                ("to_broadcaster_id", to_broadcaster_id),
                ("moderator_id", self.moderator_id.as_str()),
            ]);
        self.send(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_requires_client_id() {
        let mut cfg = crate::config::Config::default().twitch;
        assert!(HelixClient::from_config(&cfg).is_none());
        cfg.client_id = "cid".into();
        cfg.oauth_token = "oauth:tok".into();
        cfg.broadcaster_id = "42".into();
        let client = HelixClient::from_config(&cfg).unwrap();
        assert_eq!(client.token, "tok");
        assert_eq!(client.moderator_id, "42");
    }

    #[test]
    fn parses_user_page() {
        let json = r#"{"data":[{"id":"1","login":"alice","display_name":"Alice","profile_image_url":"https://x/p.png","type":""}]}"#;
        let page: HelixPage<HelixUser> = serde_json::from_str(json).unwrap();
        assert_eq!(page.data[0].display_name, "Alice");
    }
}
