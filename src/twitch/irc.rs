//! Minimal IRCv3 line parser for Twitch chat.
//!
//! Handles the subset Twitch sends: optional `@tags`, optional `:prefix`, a command
//! and its parameters with an optional trailing parameter.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IrcMessage {
    pub tags: HashMap<String, String>,
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl IrcMessage {
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }

    /// Nickname part of the prefix (`nick!user@host`).
    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        Some(prefix.split('!').next().unwrap_or(prefix))
    }

    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }
}

fn unescape_tag_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn parse_tags(raw: &str) -> HashMap<String, String> {
    raw.split(';')
        .filter(|t| !t.is_empty())
        .map(|tag| match tag.split_once('=') {
            Some((k, v)) => (k.to_string(), unescape_tag_value(v)),
            None => (tag.to_string(), String::new()),
        })
        .collect()
}

/// Parse one line (without or with its trailing CRLF). Returns `None` for blank input
/// or a line with no command.
pub fn parse_line(line: &str) -> Option<IrcMessage> {
    let mut rest = line.trim_end_matches(['\r', '\n']);
    if rest.trim().is_empty() {
        return None;
    }

    let mut msg = IrcMessage::default();
    if let Some(stripped) = rest.strip_prefix('@') {
        let (tags, tail) = stripped.split_once(' ')?;
        msg.tags = parse_tags(tags);
        rest = tail.trim_start();
    }
    if let Some(stripped) = rest.strip_prefix(':') {
        let (prefix, tail) = stripped.split_once(' ')?;
        msg.prefix = Some(prefix.to_string());
        rest = tail.trim_start();
    }

    let (head, trailing) = match rest.split_once(" :") {
        Some((head, trailing)) => (head, Some(trailing)),
        None => match rest.strip_prefix(':') {
            Some(t) => ("", Some(t)),
            None => (rest, None),
        },
    };
    let mut parts = head.split_whitespace();
    msg.command = parts.next()?.to_ascii_uppercase();
    msg.params = parts.map(str::to_string).collect();
    if let Some(t) = trailing {
        msg.params.push(t.to_string());
    }
    Some(msg)
}
