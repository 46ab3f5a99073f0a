//! `!counter <set|inc|reset> <counterName> <value>`
//!
//! Named integer counters for streamers (deaths, wins, ...). Values parse like the
//! heist bet: the leading integer of the argument is used.

use crate::storage::{BotStore, StoreError};
use crate::validation::{parse_leading_int, validate_counter_name};

fn usage(prefix: char) -> String {
    format!(
        "Usage: {}counter <set|inc|reset> <counterName> <value>",
        prefix
    )
}

fn invalid_value(prefix: char, op: &str) -> String {
    format!(
        "Invalid value. Usage: {}counter {} <counterName> <value>",
        prefix, op
    )
}

/// Run one `!counter` invocation and return the chat reply.
pub fn handle_counter(store: &BotStore, prefix: char, args: &[String]) -> Result<String, StoreError> {
    if args.len() < 2 {
        return Ok(usage(prefix));
    }
    let op = args[0].as_str();
    if !matches!(op, "set" | "inc" | "reset") {
        return Ok(usage(prefix));
    }
    let Ok(name) = validate_counter_name(&args[1]) else {
        return Ok(usage(prefix));
    };

    match op {
        "set" | "inc" => {
            let Some(value) = args.get(2).and_then(|v| parse_leading_int(v)) else {
                return Ok(invalid_value(prefix, op));
            };
            if op == "set" {
                store.set_counter(&name, value)?;
                Ok(format!("Counter \"{}\" set to {}.", name, value))
            } else {
                let updated = store.increment_counter(&name, value)?;
                Ok(format!(
                    "Counter \"{}\" incremented by {}. New value: {}.",
                    name, value, updated
                ))
            }
        }
        _ => {
            store.reset_counter(&name)?;
            Ok(format!("Counter \"{}\" reset to 0.", name))
        }
    }
}
