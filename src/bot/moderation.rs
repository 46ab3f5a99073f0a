//! `!ban` and `!shoutout`.
//!
//! Both look users up through [`UserApi`] (Helix in production) and report to Discord.
//! Chat replies are returned to the caller; Helix failures are logged and produce no
//! reply.

use anyhow::Result;
use async_trait::async_trait;
use log::{error, info, warn};

use super::discord::{colour, Embed, Notifiers};
use super::roles::ChatRole;
use crate::logutil::escape_log;
use crate::twitch::ChatEvent;
use crate::validation::normalize_login;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwitchUser {
    pub id: String,
    pub login: String,
    pub display_name: String,
    pub profile_image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub broadcaster_id: String,
    pub broadcaster_login: String,
    pub broadcaster_name: String,
    pub game_name: String,
}

/// The Twitch API calls the moderation commands need.
#[async_trait]
pub trait UserApi: Send + Sync {
    async fn user_by_login(&self, login: &str) -> Result<Option<TwitchUser>>;

    async fn channel_info(&self, broadcaster_id: &str) -> Result<Option<ChannelInfo>>;

    async fn is_live(&self, login: &str) -> Result<bool>;

    async fn ban_user(&self, broadcaster_id: &str, user_id: &str, reason: &str) -> Result<()>;

    async fn shoutout(&self, from_broadcaster_id: &str, to_broadcaster_id: &str) -> Result<()>;
}

/// `!ban [@name] (reason)`. Only moderators and the broadcaster may use it.
pub async fn handle_ban(
    api: &dyn UserApi,
    notifiers: &Notifiers,
    prefix: char,
    event: &ChatEvent,
    args: &[String],
) -> Option<String> {
    let display = &event.display_name;
    if args.is_empty() {
        return Some(format!("{}, Usage: {}ban [@name] (reason)", display, prefix));
    }
    let role = ChatRole::of(event);
    if !role.can_moderate() {
        return Some(format!(
            "{}, You don't have permission to use this command.",
            display
        ));
    }

    let reason = match args[1..].join(" ") {
        r if r.is_empty() => "No Reason Provided".to_string(),
        r => r,
    };
    let username = args[0].replace('@', "");
    let Ok(login) = normalize_login(&username) else {
        return Some(format!("{}, User not found.", display));
    };

    match ban(api, notifiers, event, role, &login, &username, &reason).await {
        Ok(reply) => Some(reply),
        Err(e) => {
            error!(
                "ban of {} by {} failed: {}",
                escape_log(&login),
                escape_log(&event.user),
                e
            );
            None
        }
    }
}

async fn ban(
    api: &dyn UserApi,
    notifiers: &Notifiers,
    event: &ChatEvent,
    role: ChatRole,
    login: &str,
    username: &str,
    reason: &str,
) -> Result<String> {
    let display = &event.display_name;
    let Some(target) = api.user_by_login(login).await? else {
        return Ok(format!("{}, User not found.", display));
    };
    let Some(broadcaster) = api.user_by_login(&event.channel).await? else {
        return Ok(format!(
            "Could not find broadcaster information for channel: {}",
            event.channel
        ));
    };
    api.ban_user(&broadcaster.id, &target.id, reason).await?;
    info!(
        "{} banned {} in #{} ({})",
        event.user,
        target.login,
        event.channel,
        escape_log(reason)
    );

    let mut embed = Embed::new()
        .title("CommandUsage[Ban]")
        .author(display.clone(), Some(target.profile_image_url.clone()))
        .description(reason)
        .colour(colour::RED)
        .field("Executer", display.clone(), true);
    embed = match role {
        ChatRole::Moderator => embed.field("Mod", "Yes", true),
        ChatRole::Broadcaster => embed.field("Broadcaster", "Yes", true),
        ChatRole::Viewer => embed,
    };
    embed = embed
        .footer(format!(
            "{} just banned {} in {}'s twitch channel",
            display, target.display_name, event.channel
        ))
        .timestamp_now();
    notifiers.command_usage(embed).await;

    Ok(format!("@{} has been banned for Reason: {}", username, reason))
}

/// `!shoutout [@name]`. The bot's own channel is resolved from `broadcaster_id`.
pub async fn handle_shoutout(
    api: &dyn UserApi,
    notifiers: &Notifiers,
    prefix: char,
    broadcaster_id: &str,
    event: &ChatEvent,
    args: &[String],
) -> Option<String> {
    match shoutout(api, notifiers, prefix, broadcaster_id, event, args).await {
        Ok(reply) => reply,
        Err(e) => {
            error!("shoutout by {} failed: {}", escape_log(&event.user), e);
            None
        }
    }
}

async fn shoutout(
    api: &dyn UserApi,
    notifiers: &Notifiers,
    prefix: char,
    broadcaster_id: &str,
    event: &ChatEvent,
    args: &[String],
) -> Result<Option<String>> {
    let Some(home) = api.channel_info(broadcaster_id).await? else {
        warn!("shoutout: no channel info for broadcaster id {}", broadcaster_id);
        return Ok(None);
    };
    let Some(first) = args.first() else {
        return Ok(Some(format!("Usage: {}shoutout [@name]", prefix)));
    };
    let Ok(login) = normalize_login(&first.replace('@', "")) else {
        return Ok(None);
    };
    let Some(target) = api.user_by_login(&login).await? else {
        return Ok(None);
    };
    let info = api.channel_info(&target.id).await?;
    let (shown_name, channel_login, game) = match &info {
        Some(i) => (
            i.broadcaster_name.clone(),
            i.broadcaster_login.to_lowercase(),
            i.game_name.clone(),
        ),
        None => (
            target.display_name.clone(),
            target.login.to_lowercase(),
            String::new(),
        ),
    };

    if api.is_live(&home.broadcaster_login).await? {
        if let Err(e) = api.shoutout(&home.broadcaster_id, &target.id).await {
            warn!("Helix shoutout for {} failed: {}", target.login, e);
        }
    }

    let channel_url = format!("https://twitch.tv/{}", channel_login);
    let footer = format!(
        "{} just shouted out {} in {}'s twitch channel",
        event.display_name, shown_name, event.channel
    );
    let usage = Embed::new()
        .title("CommandUsage[Shoutout]")
        .author(
            target.display_name.clone(),
            Some(target.profile_image_url.clone()),
        )
        .colour(colour::YELLOW)
        .field("Executer", event.display_name.clone(), true)
        .field("Mod", event.is_mod.to_string(), true)
        .field("broadcaster", event.is_broadcaster.to_string(), true)
        .thumbnail(target.profile_image_url.clone())
        .url(channel_url.clone())
        .footer(footer.clone())
        .timestamp_now();
    let activity = Embed::new()
        .title("Twitch Shoutout")
        .author(
            target.display_name.clone(),
            Some(target.profile_image_url.clone()),
        )
        .colour(colour::GREEN)
        .thumbnail(target.profile_image_url.clone())
        .url(channel_url.clone())
        .footer(footer)
        .timestamp_now();

    let reply = format!(
        "Yay! Look who's here! @{} just got mentioned! Let's all head over to their awesome Twitch channel at {} and show them some love! By the way, if you're wondering what game they were last playing, it was {}. So go check them out and join in on the fun!",
        shown_name, channel_url, game
    );
    notifiers.command_usage(usage).await;
    notifiers.activity(activity).await;
    Ok(Some(reply))
}
