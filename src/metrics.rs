//! In-process counters for heists and chat commands.
//! Logged on shutdown and by the `status` command of a running process.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

static HEISTS_STARTED: AtomicU64 = AtomicU64::new(0);
static HEISTS_SUCCEEDED: AtomicU64 = AtomicU64::new(0);
static HEISTS_FAILED: AtomicU64 = AtomicU64::new(0);
static HEISTS_CANCELLED: AtomicU64 = AtomicU64::new(0);
static HEIST_JOINS: AtomicU64 = AtomicU64::new(0);
static INJURIES_DEALT: AtomicU64 = AtomicU64::new(0);
static LOOT_PAID: AtomicU64 = AtomicU64::new(0);

static COMMAND_COUNTERS: OnceLock<Mutex<HashMap<String, u64>>> = OnceLock::new();

pub fn inc_heists_started() {
    HEISTS_STARTED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_heists_succeeded() {
    HEISTS_SUCCEEDED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_heists_failed() {
    HEISTS_FAILED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_heists_cancelled() {
    HEISTS_CANCELLED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_heist_joins() {
    HEIST_JOINS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_injuries_dealt() {
    INJURIES_DEALT.fetch_add(1, Ordering::Relaxed);
}
pub fn add_loot_paid(amount: u64) {
    LOOT_PAID.fetch_add(amount, Ordering::Relaxed);
}

fn command_counter_lock() -> &'static Mutex<HashMap<String, u64>> {
    COMMAND_COUNTERS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Count one use of a chat command. Returns the running total for that command.
pub fn record_command(name: &str) -> u64 {
    let mut guard = match command_counter_lock().lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    };
    let count = guard.entry(name.to_string()).or_default();
    *count = count.saturating_add(1);
    *count
}

pub fn command_counters_snapshot() -> HashMap<String, u64> {
    match command_counter_lock().lock() {
        Ok(g) => g.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub heists_started: u64,
    pub heists_succeeded: u64,
    pub heists_failed: u64,
    pub heists_cancelled: u64,
    pub heist_joins: u64,
    pub injuries_dealt: u64,
    pub loot_paid: u64,
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        heists_started: HEISTS_STARTED.load(Ordering::Relaxed),
        heists_succeeded: HEISTS_SUCCEEDED.load(Ordering::Relaxed),
        heists_failed: HEISTS_FAILED.load(Ordering::Relaxed),
        heists_cancelled: HEISTS_CANCELLED.load(Ordering::Relaxed),
        heist_joins: HEIST_JOINS.load(Ordering::Relaxed),
        injuries_dealt: INJURIES_DEALT.load(Ordering::Relaxed),
        loot_paid: LOOT_PAID.load(Ordering::Relaxed),
    }
}

impl std::fmt::Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "heists started={} succeeded={} failed={} cancelled={} joins={} injuries={} loot_paid={}",
            self.heists_started,
            self.heists_succeeded,
            self.heists_failed,
            self.heists_cancelled,
            self.heist_joins,
            self.injuries_dealt,
            self.loot_paid
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_counts_accumulate() {
        let first = record_command("metrics-test-cmd");
        let second = record_command("metrics-test-cmd");
        assert_eq!(second, first + 1);
        let snap = command_counters_snapshot();
        assert_eq!(snap.get("metrics-test-cmd"), Some(&second));
    }

    #[test]
    fn heist_counters_only_grow() {
        let before = snapshot();
        inc_heists_started();
        add_loot_paid(250);
        let after = snapshot();
        assert!(after.heists_started >= before.heists_started + 1);
        assert!(after.loot_paid >= before.loot_paid + 250);
        assert!(after.to_string().starts_with("heists started="));
    }
}
