//! Chat command parser.
//!
//! Commands are recognised only with the configured prefix (default `!`). The
//! command word is case-insensitive; arguments are whitespace-split and passed through
//! untouched for the handlers to interpret. `join` is stricter: the whole trimmed
//! message must be exactly `{prefix}join`.
use log::trace;

/// Parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Heist(Vec<String>),
    Join,
    Balance,
    Counter(Vec<String>),
    Ban(Vec<String>),
    Shoutout(Vec<String>),
    Unknown,
}

impl BotCommand {
    /// Name used for usage metrics.
    pub fn name(&self) -> &'static str {
        match self {
            BotCommand::Heist(_) => "heist",
            BotCommand::Join => "join",
            BotCommand::Balance => "balance",
            BotCommand::Counter(_) => "counter",
            BotCommand::Ban(_) => "ban",
            BotCommand::Shoutout(_) => "shoutout",
            BotCommand::Unknown => "unknown",
        }
    }
}

pub struct CommandParser {
    prefix: char,
}

impl CommandParser {
    pub fn new(prefix: char) -> Self {
        Self { prefix }
    }

    pub fn prefix(&self) -> char {
        self.prefix
    }

    pub fn parse(&self, raw: &str) -> BotCommand {
        let trimmed = raw.trim();
        if trimmed.to_lowercase() == format!("{}join", self.prefix) {
            trace!("Parsed JOIN from '{}'", raw);
            return BotCommand::Join;
        }
        let Some(body) = trimmed.strip_prefix(self.prefix) else {
            return BotCommand::Unknown;
        };
        let mut parts = body.split_whitespace();
        let Some(word) = parts.next() else {
            return BotCommand::Unknown;
        };
        let args: Vec<String> = parts.map(str::to_string).collect();
        let cmd = match word.to_ascii_lowercase().as_str() {
            "heist" => BotCommand::Heist(args),
            "balance" => BotCommand::Balance,
            "counter" => BotCommand::Counter(args),
            "ban" => BotCommand::Ban(args),
            "shoutout" | "so" => BotCommand::Shoutout(args),
            _ => BotCommand::Unknown,
        };
        if cmd != BotCommand::Unknown {
            trace!("Parsed {} from '{}'", cmd.name(), raw);
        }
        cmd
    }
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new('!')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn heist_keeps_all_arguments() {
        let p = CommandParser::default();
        assert_eq!(
            p.parse("!heist 250 bank vault"),
            BotCommand::Heist(args(&["250", "bank", "vault"]))
        );
        assert_eq!(p.parse("!HEIST"), BotCommand::Heist(vec![]));
    }

    #[test]
    fn join_must_be_the_whole_message() {
        let p = CommandParser::default();
        assert_eq!(p.parse("  !JOIN "), BotCommand::Join);
        assert_eq!(p.parse("!join now"), BotCommand::Unknown);
        assert_eq!(p.parse("join"), BotCommand::Unknown);
    }

    #[test]
    fn other_prefixes() {
        let p = CommandParser::new('^');
        assert_eq!(p.parse("^balance"), BotCommand::Balance);
        assert_eq!(p.parse("^join"), BotCommand::Join);
        assert_eq!(p.parse("!balance"), BotCommand::Unknown);
    }

    #[test]
    fn moderation_commands() {
        let p = CommandParser::default();
        assert_eq!(
            p.parse("!ban @troll spamming links"),
            BotCommand::Ban(args(&["@troll", "spamming", "links"]))
        );
        assert_eq!(
            p.parse("!so @friend"),
            BotCommand::Shoutout(args(&["@friend"]))
        );
        assert_eq!(p.parse("!"), BotCommand::Unknown);
        assert_eq!(p.parse("hello there"), BotCommand::Unknown);
    }
}
