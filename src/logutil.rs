//! Helpers that keep chat-controlled text on one line, both in logs and on the wire.

/// Escape a string for single-line logging:
/// - `\n` => `\\n`
/// - `\r` => `\\r`
/// - `\t` => `\\t`
/// - backslash => `\\\\`
///
/// Strings longer than 300 characters are cut with an ellipsis.
pub fn escape_log(s: &str) -> String {
    const MAX_PREVIEW: usize = 300;
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Collapse CR/LF runs into a single space so a chat reply cannot inject IRC lines.
pub fn single_line(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_break = false;
    for ch in s.chars() {
        if ch == '\r' || ch == '\n' {
            pending_break = true;
            continue;
        }
        if pending_break {
            if !out.is_empty() && !out.ends_with(' ') && ch != ' ' {
                out.push(' ');
            }
            pending_break = false;
        }
        out.push(ch);
    }
    out
}
