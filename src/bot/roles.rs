//! Chat roles derived from Twitch badges and tags.
//!
//! Roles are ordered: a broadcaster can do everything a moderator can.
use crate::twitch::ChatEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChatRole {
    Viewer,
    Moderator,
    Broadcaster,
}

impl ChatRole {
    pub fn of(event: &ChatEvent) -> Self {
        if event.is_broadcaster {
            ChatRole::Broadcaster
        } else if event.is_mod {
            ChatRole::Moderator
        } else {
            ChatRole::Viewer
        }
    }

    pub fn can_moderate(self) -> bool {
        self >= ChatRole::Moderator
    }

    pub fn name(self) -> &'static str {
        match self {
            ChatRole::Viewer => "Viewer",
            ChatRole::Moderator => "Moderator",
            ChatRole::Broadcaster => "Broadcaster",
        }
    }
}
