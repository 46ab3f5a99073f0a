//! # Storage Module
//!
//! Sled-backed persistence for everything the bot remembers between restarts:
//!
//! - **Ledger**: one [`Account`] per chatter holding their coin balance
//! - **Counters**: named integer counters driven by `!counter`
//! - **Injuries**: active heist injuries per participant
//!
//! Values are bincode encoded. Balance and counter updates go through sled's
//! `update_and_fetch`, which retries a compare-and-swap until it wins, so concurrent
//! credits and debits are never lost.
//!
//! The store is cheap to clone; clones share the same underlying database.

pub mod errors;

use std::cell::Cell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::IVec;

pub use errors::StoreError;

use crate::heist::injury::Injury;

const TREE_ACCOUNTS: &str = "accounts";
const TREE_COUNTERS: &str = "counters";
const TREE_INJURIES: &str = "injuries";

/// Database directory name under the configured data dir.
pub const DB_DIR_NAME: &str = "heistbot.db";

/// A chatter's coin account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct BotStoreBuilder {
    path: PathBuf,
}

impl BotStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn open(self) -> Result<BotStore, StoreError> {
        BotStore::open(self.path)
    }
}

#[derive(Clone)]
pub struct BotStore {
    db: sled::Db,
    accounts: sled::Tree,
    counters: sled::Tree,
    injuries: sled::Tree,
}

fn user_key(user: &str) -> Vec<u8> {
    user.to_ascii_lowercase().into_bytes()
}

impl BotStore {
    /// Open (or create) the store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let accounts = db.open_tree(TREE_ACCOUNTS)?;
        let counters = db.open_tree(TREE_COUNTERS)?;
        let injuries = db.open_tree(TREE_INJURIES)?;
        Ok(Self {
            db,
            accounts,
            counters,
            injuries,
        })
    }

    /// Open the store for a configured data directory (`<data_dir>/heistbot.db`).
    pub fn open_in_data_dir(data_dir: &str) -> Result<Self, StoreError> {
        Self::open(Path::new(data_dir).join(DB_DIR_NAME))
    }

    fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
        Ok(bincode::deserialize::<T>(bytes)?)
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Ledger
    // ---------------------------------------------------------------------

    /// Create an account with `starting_balance` if `user` has none. Returns true when a
    /// new account was created.
    pub fn ensure_account(&self, user: &str, starting_balance: i64) -> Result<bool, StoreError> {
        let account = Account {
            balance: starting_balance,
            created_at: Utc::now(),
        };
        let bytes = Self::serialize(&account)?;
        let created = self
            .accounts
            .compare_and_swap(user_key(user), None as Option<&[u8]>, Some(bytes))?
            .is_ok();
        if created {
            self.accounts.flush()?;
        }
        Ok(created)
    }

    pub fn get_account(&self, user: &str) -> Result<Account, StoreError> {
        let Some(bytes) = self.accounts.get(user_key(user))? else {
            return Err(StoreError::NotFound(format!("account: {}", user)));
        };
        Self::deserialize(&bytes)
    }

    pub fn get_balance(&self, user: &str) -> Result<i64, StoreError> {
        Ok(self.get_account(user)?.balance)
    }

    /// Overwrite a balance, creating the account if needed.
    pub fn set_balance(&self, user: &str, balance: i64) -> Result<(), StoreError> {
        let created_at = match self.get_account(user) {
            Ok(existing) => existing.created_at,
            Err(StoreError::NotFound(_)) => Utc::now(),
            Err(e) => return Err(e),
        };
        let bytes = Self::serialize(&Account {
            balance,
            created_at,
        })?;
        self.accounts.insert(user_key(user), bytes)?;
        self.accounts.flush()?;
        Ok(())
    }

    /// Atomically add `delta` (may be negative) to a balance and return the new value.
    /// The result may go below zero; callers that must not overdraw use [`Self::try_debit`].
    pub fn increment_balance(&self, user: &str, delta: i64) -> Result<i64, StoreError> {
        let corrupt = Cell::new(false);
        let updated = self.accounts.update_and_fetch(user_key(user), |old| {
            corrupt.set(false);
            let old = old?;
            match bincode::deserialize::<Account>(old) {
                Ok(mut account) => {
                    account.balance = account.balance.saturating_add(delta);
                    encode_or_keep(&account, old, &corrupt)
                }
                Err(_) => {
                    corrupt.set(true);
                    Some(IVec::from(old))
                }
            }
        })?;
        self.finish_balance_update(user, updated, corrupt.get())
    }

    /// Atomically debit `amount` only if the balance covers it. Returns the new balance,
    /// or `None` when funds are insufficient (nothing is written in that case).
    pub fn try_debit(&self, user: &str, amount: i64) -> Result<Option<i64>, StoreError> {
        let corrupt = Cell::new(false);
        let insufficient = Cell::new(false);
        let updated = self.accounts.update_and_fetch(user_key(user), |old| {
            corrupt.set(false);
            insufficient.set(false);
            let old = old?;
            match bincode::deserialize::<Account>(old) {
                Ok(mut account) if account.balance >= amount => {
                    account.balance -= amount;
                    encode_or_keep(&account, old, &corrupt)
                }
                Ok(_) => {
                    insufficient.set(true);
                    Some(IVec::from(old))
                }
                Err(_) => {
                    corrupt.set(true);
                    Some(IVec::from(old))
                }
            }
        })?;
        let balance = self.finish_balance_update(user, updated, corrupt.get())?;
        Ok((!insufficient.get()).then_some(balance))
    }

    fn finish_balance_update(
        &self,
        user: &str,
        updated: Option<IVec>,
        corrupt: bool,
    ) -> Result<i64, StoreError> {
        if corrupt {
            return Err(StoreError::Corrupt(format!("account: {}", user)));
        }
        let Some(bytes) = updated else {
            return Err(StoreError::NotFound(format!("account: {}", user)));
        };
        self.accounts.flush()?;
        let account: Account = Self::deserialize(&bytes)?;
        Ok(account.balance)
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    // ---------------------------------------------------------------------
    // Counters
    // ---------------------------------------------------------------------

    pub fn set_counter(&self, name: &str, value: i64) -> Result<(), StoreError> {
        self.counters
            .insert(name.as_bytes(), Self::serialize(&value)?)?;
        self.counters.flush()?;
        Ok(())
    }

    /// Atomically add `delta` to a counter, starting from 0 if it does not exist.
    pub fn increment_counter(&self, name: &str, delta: i64) -> Result<i64, StoreError> {
        let updated = self.counters.update_and_fetch(name.as_bytes(), |old| {
            let current = old
                .and_then(|b| bincode::deserialize::<i64>(b).ok())
                .unwrap_or(0);
            bincode::serialize(&current.saturating_add(delta))
                .ok()
                .map(IVec::from)
        })?;
        self.counters.flush()?;
        match updated {
            Some(bytes) => Self::deserialize(&bytes),
            None => Err(StoreError::Corrupt(format!("counter: {}", name))),
        }
    }

    /// Current counter value; 0 when the counter has never been set.
    pub fn get_counter(&self, name: &str) -> Result<i64, StoreError> {
        match self.counters.get(name.as_bytes())? {
            Some(bytes) => Self::deserialize(&bytes),
            None => Ok(0),
        }
    }

    pub fn reset_counter(&self, name: &str) -> Result<(), StoreError> {
        self.set_counter(name, 0)
    }

    // ---------------------------------------------------------------------
    // Injuries
    // ---------------------------------------------------------------------

    /// Every stored injury record, keyed by participant.
    pub fn load_all_injuries(&self) -> Result<HashMap<String, Vec<Injury>>, StoreError> {
        let mut all = HashMap::new();
        for entry in self.injuries.iter() {
            let (key, value) = entry?;
            let user = String::from_utf8_lossy(&key).to_string();
            let injuries: Vec<Injury> = Self::deserialize(&value)?;
            all.insert(user, injuries);
        }
        Ok(all)
    }

    /// Injury list for one participant; empty when none are stored.
    pub fn injuries_for(&self, user: &str) -> Result<Vec<Injury>, StoreError> {
        match self.injuries.get(user_key(user))? {
            Some(bytes) => Self::deserialize(&bytes),
            None => Ok(Vec::new()),
        }
    }

    /// Replace a participant's injury list. An empty list removes the record.
    pub fn upsert_injuries(&self, user: &str, injuries: &[Injury]) -> Result<(), StoreError> {
        if injuries.is_empty() {
            return self.delete_injuries(user);
        }
        self.injuries
            .insert(user_key(user), Self::serialize(&injuries)?)?;
        self.injuries.flush()?;
        Ok(())
    }

    pub fn delete_injuries(&self, user: &str) -> Result<(), StoreError> {
        self.injuries.remove(user_key(user))?;
        self.injuries.flush()?;
        Ok(())
    }

    /// Drop injuries that are no longer active at `now_ms`; records left empty are removed.
    /// Returns the number of injuries removed.
    pub fn delete_expired_injuries(&self, now_ms: i64) -> Result<usize, StoreError> {
        let mut removed = 0usize;
        for (user, injuries) in self.load_all_injuries()? {
            let before = injuries.len();
            let active: Vec<Injury> = injuries
                .into_iter()
                .filter(|i| i.is_active(now_ms))
                .collect();
            if active.len() != before {
                removed += before - active.len();
                self.upsert_injuries(&user, &active)?;
            }
        }
        Ok(removed)
    }

    pub fn injury_record_count(&self) -> usize {
        self.injuries.len()
    }
}

/// Encode an updated account inside an `update_and_fetch` closure. sled deletes the key
/// when the closure yields `None`, so an encode failure keeps the old bytes and flags it.
fn encode_or_keep(account: &Account, old: &[u8], corrupt: &Cell<bool>) -> Option<IVec> {
    match bincode::serialize(account) {
        Ok(bytes) => Some(IVec::from(bytes)),
        Err(_) => {
            corrupt.set(true);
            Some(IVec::from(old))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heist::injury::Severity;
    use tempfile::TempDir;

    fn store() -> (TempDir, BotStore) {
        let dir = TempDir::new().expect("tempdir");
        let store = BotStoreBuilder::new(dir.path()).open().expect("store");
        (dir, store)
    }

    #[test]
    fn ensure_account_only_grants_once() {
        let (_dir, store) = store();
        assert!(store.ensure_account("Alice", 1000).unwrap());
        assert!(!store.ensure_account("alice", 1000).unwrap());
        store.increment_balance("alice", -250).unwrap();
        assert!(!store.ensure_account("ALICE", 1000).unwrap());
        assert_eq!(store.get_balance("alice").unwrap(), 750);
    }

    #[test]
    fn missing_account_is_not_found() {
        let (_dir, store) = store();
        assert!(store.get_balance("ghost").unwrap_err().is_not_found());
        assert!(store.increment_balance("ghost", 10).unwrap_err().is_not_found());
        assert!(store.try_debit("ghost", 10).unwrap_err().is_not_found());
        assert_eq!(store.account_count(), 0);
    }

    #[test]
    fn increment_may_go_negative() {
        let (_dir, store) = store();
        store.set_balance("bob", 50).unwrap();
        assert_eq!(store.increment_balance("bob", -100).unwrap(), -50);
    }

    #[test]
    fn try_debit_refuses_overdraft() {
        let (_dir, store) = store();
        store.set_balance("carol", 300).unwrap();
        assert_eq!(store.try_debit("carol", 500).unwrap(), None);
        assert_eq!(store.get_balance("carol").unwrap(), 300);
        assert_eq!(store.try_debit("carol", 300).unwrap(), Some(0));
    }

    #[test]
    fn concurrent_credits_are_not_lost() {
        let (_dir, store) = store();
        store.set_balance("dave", 0).unwrap();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        s.increment_balance("dave", 1).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.get_balance("dave").unwrap(), 400);
    }

    #[test]
    fn counters_upsert_and_reset() {
        let (_dir, store) = store();
        assert_eq!(store.get_counter("deaths").unwrap(), 0);
        assert_eq!(store.increment_counter("deaths", 3).unwrap(), 3);
        store.set_counter("deaths", 10).unwrap();
        assert_eq!(store.increment_counter("deaths", -1).unwrap(), 9);
        store.reset_counter("deaths").unwrap();
        assert_eq!(store.get_counter("deaths").unwrap(), 0);
    }

    #[test]
    fn expired_injuries_are_pruned() {
        let (_dir, store) = store();
        let now = 100 * 60_000 * 60;
        let old = Injury::new(Severity::Minor, "old", now - 2 * 60 * 60_000);
        let fresh = Injury::new(Severity::Severe, "fresh", now);
        store.upsert_injuries("erin", &[old.clone()]).unwrap();
        store
            .upsert_injuries("frank", &[old, fresh.clone()])
            .unwrap();
        assert_eq!(store.delete_expired_injuries(now).unwrap(), 2);
        assert!(store.injuries_for("erin").unwrap().is_empty());
        assert_eq!(store.injuries_for("frank").unwrap(), vec![fresh]);
        assert_eq!(store.injury_record_count(), 1);
    }

    #[test]
    fn corrupt_account_is_kept_on_update() {
        let (_dir, store) = store();
        store.accounts.insert(user_key("gina"), &[0xffu8][..]).unwrap();
        assert!(matches!(
            store.increment_balance("gina", 10),
            Err(StoreError::Corrupt(_))
        ));
        assert!(matches!(
            store.try_debit("gina", 10),
            Err(StoreError::Corrupt(_))
        ));
        let kept = store.accounts.get(user_key("gina")).unwrap();
        assert_eq!(kept.as_deref(), Some(&[0xffu8][..]));
    }

    #[test]
    fn encode_writes_updated_account() {
        let corrupt = Cell::new(false);
        let account = Account {
            balance: 42,
            created_at: Utc::now(),
        };
        let encoded = encode_or_keep(&account, b"previous", &corrupt).unwrap();
        assert!(!corrupt.get());
        let decoded: Account = bincode::deserialize(&encoded).unwrap();
        assert_eq!(decoded.balance, 42);
    }

    #[test]
    fn injury_expiring_now_is_pruned() {
        let (_dir, store) = store();
        let injury = Injury::new(Severity::Minor, "edge", 0);
        let now = injury.expires_at();
        assert!(!injury.is_active(now));
        store.upsert_injuries("ivan", &[injury]).unwrap();
        assert_eq!(store.delete_expired_injuries(now).unwrap(), 1);
        assert_eq!(store.injury_record_count(), 0);
    }
}
