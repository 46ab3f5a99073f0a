//! Validation for names that come from chat: Twitch logins, channel names and
//! counter names.

/// Login validation errors with helpful messages
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum LoginError {
    #[error("Name is empty")]
    Empty,

    #[error("Name is too long (maximum {max} characters)")]
    TooLong { max: usize },

    #[error("Name contains invalid characters: {chars}")]
    InvalidCharacters { chars: String },
}

pub const MAX_LOGIN_LEN: usize = 25;
pub const MAX_COUNTER_NAME_LEN: usize = 32;

fn invalid_chars(s: &str, allowed: impl Fn(char) -> bool) -> Option<String> {
    let mut bad: Vec<char> = s.chars().filter(|c| !allowed(*c)).collect();
    if bad.is_empty() {
        return None;
    }
    bad.sort_unstable();
    bad.dedup();
    Some(
        bad.iter()
            .map(|c| {
                if c.is_control() {
                    format!("\\u{{{:04x}}}", *c as u32)
                } else {
                    format!("'{}'", c)
                }
            })
            .collect::<Vec<_>>()
            .join(", "),
    )
}

/// Normalize a user reference such as `@SomeUser` into a lowercase login.
///
/// Twitch logins are ASCII letters, digits and underscores, at most 25 characters.
pub fn normalize_login(raw: &str) -> Result<String, LoginError> {
    let trimmed = raw.trim().trim_start_matches('@');
    if trimmed.is_empty() {
        return Err(LoginError::Empty);
    }
    if trimmed.chars().count() > MAX_LOGIN_LEN {
        return Err(LoginError::TooLong { max: MAX_LOGIN_LEN });
    }
    if let Some(chars) = invalid_chars(trimmed, |c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(LoginError::InvalidCharacters { chars });
    }
    Ok(trimmed.to_ascii_lowercase())
}

/// Channel names follow login rules; a leading `#` is accepted and dropped.
pub fn normalize_channel(raw: &str) -> Result<String, LoginError> {
    normalize_login(raw.trim().trim_start_matches('#'))
}

/// Counter names are free text without whitespace or control characters.
pub fn validate_counter_name(name: &str) -> Result<String, LoginError> {
    if name.is_empty() {
        return Err(LoginError::Empty);
    }
    if name.chars().count() > MAX_COUNTER_NAME_LEN {
        return Err(LoginError::TooLong {
            max: MAX_COUNTER_NAME_LEN,
        });
    }
    if let Some(chars) = invalid_chars(name, |c| !c.is_control() && !c.is_whitespace()) {
        return Err(LoginError::InvalidCharacters { chars });
    }
    Ok(name.to_string())
}

/// Leading-integer parse used for bets and counter values: `"250coins"` is 250,
/// `"1e3"` is 1 and `"abc"` is `None`. Oversized numbers saturate.
pub fn parse_leading_int(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let prefix = &digits[..end];
    if prefix.is_empty() {
        return None;
    }
    let magnitude = prefix.parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}
