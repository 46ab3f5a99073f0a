mod common;

use std::time::Duration;

use common::{args, drain, fixed_clock, spawn_actor, temp_store, CHANNEL, T0};
use heistbot::heist::{
    system_now_ms, Injury, JoinOutcome, SessionState, Severity, StartOutcome, ANNOUNCE_DELAY,
    JOIN_WINDOW,
};

fn past_window() -> Duration {
    ANNOUNCE_DELAY + JOIN_WINDOW + Duration::from_millis(500)
}

#[tokio::test(start_paused = true)]
async fn start_opens_window_and_announces_initiator() {
    let (_dir, store) = temp_store();
    store.ensure_account("alice", 1000).unwrap();
    let mut h = spawn_actor(&store, 1, system_now_ms);

    let outcome = h.handle.start(CHANNEL, "alice", args(&["100", "bank", "vault"])).await;
    assert!(
        matches!(outcome, StartOutcome::Started { .. }),
        "expected a started heist, got {:?}",
        outcome
    );
    assert_eq!(store.get_balance("alice").unwrap(), 900);

    let snap = h.handle.snapshot().await.unwrap();
    assert_eq!(snap.state, SessionState::Forming);
    assert_eq!(snap.bet_amount, Some(100));
    assert_eq!(snap.participants, vec!["alice".to_string()]);
    assert_eq!(snap.zone.unwrap().name, "Bank Vault");

    let msgs = drain(&mut h.chat);
    assert_eq!(
        msgs,
        vec!["A heist has been started by alice! Type !join to participate, you have 10 seconds to join!"]
    );

    tokio::time::sleep(ANNOUNCE_DELAY + Duration::from_millis(100)).await;
    let msgs = drain(&mut h.chat);
    assert_eq!(msgs, vec!["alice has joined the heist!"]);
}

#[tokio::test(start_paused = true)]
async fn start_validation_messages_leave_state_untouched() {
    let (_dir, store) = temp_store();
    store.ensure_account("alice", 1000).unwrap();
    let mut h = spawn_actor(&store, 2, system_now_ms);

    assert_eq!(
        h.handle.start(CHANNEL, "alice", args(&[])).await,
        StartOutcome::InvalidAmount
    );
    assert_eq!(
        h.handle.start(CHANNEL, "alice", args(&["lots", "bank", "vault"])).await,
        StartOutcome::InvalidAmount
    );
    assert_eq!(
        h.handle.start(CHANNEL, "alice", args(&["50", "bank", "vault"])).await,
        StartOutcome::OutOfRange
    );
    assert_eq!(
        h.handle.start(CHANNEL, "alice", args(&["6000", "bank", "vault"])).await,
        StartOutcome::OutOfRange
    );
    assert_eq!(
        h.handle.start(CHANNEL, "alice", args(&["100"])).await,
        StartOutcome::MissingZone
    );
    assert_eq!(
        h.handle.start(CHANNEL, "alice", args(&["100", "moon", "base"])).await,
        StartOutcome::UnknownZone
    );

    let msgs = drain(&mut h.chat);
    assert_eq!(
        msgs,
        vec![
            "Please provide a valid amount for the heist.".to_string(),
            "Please provide a valid amount for the heist.".to_string(),
            "The heist minimum/maximum should be between 100 and 5000.".to_string(),
            "The heist minimum/maximum should be between 100 and 5000.".to_string(),
            "You must choose a zone to start the heist: Art Museum, Bank Vault, Corner Store"
                .to_string(),
            "The specified zone \"moon base\" does not exist. Available zones are: Art Museum, Bank Vault, Corner Store"
                .to_string(),
        ]
    );
    assert_eq!(store.get_balance("alice").unwrap(), 1000, "no rejection may debit");
    assert_eq!(h.handle.snapshot().await.unwrap().state, SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn bet_uses_leading_digits_and_zone_case_is_ignored() {
    let (_dir, store) = temp_store();
    store.ensure_account("alice", 1000).unwrap();
    let h = spawn_actor(&store, 3, system_now_ms);

    let outcome = h.handle.start(CHANNEL, "alice", args(&["250coins", "ART", "Museum"])).await;
    assert!(matches!(outcome, StartOutcome::Started { .. }));
    let snap = h.handle.snapshot().await.unwrap();
    assert_eq!(snap.bet_amount, Some(250));
    assert_eq!(store.get_balance("alice").unwrap(), 750);
}

#[tokio::test(start_paused = true)]
async fn second_start_is_rejected_while_forming() {
    let (_dir, store) = temp_store();
    store.ensure_account("alice", 1000).unwrap();
    store.ensure_account("bob", 1000).unwrap();
    let mut h = spawn_actor(&store, 4, system_now_ms);

    h.handle.start(CHANNEL, "alice", args(&["100", "bank", "vault"])).await;
    drain(&mut h.chat);
    let outcome = h.handle.start(CHANNEL, "bob", args(&["100", "bank", "vault"])).await;
    assert_eq!(outcome, StartOutcome::InProgress);
    assert_eq!(
        drain(&mut h.chat),
        vec!["A heist is already in progress. Please wait for the current heist to finish."]
    );
    assert_eq!(store.get_balance("bob").unwrap(), 1000);
}

#[tokio::test(start_paused = true)]
async fn join_debits_once_and_is_idempotent() {
    let (_dir, store) = temp_store();
    store.ensure_account("alice", 1000).unwrap();
    store.ensure_account("bob", 1000).unwrap();
    let mut h = spawn_actor(&store, 5, system_now_ms);

    h.handle.start(CHANNEL, "alice", args(&["300", "bank", "vault"])).await;
    drain(&mut h.chat);

    assert_eq!(h.handle.join(CHANNEL, "bob").await, JoinOutcome::Joined);
    assert_eq!(h.handle.join(CHANNEL, "bob").await, JoinOutcome::AlreadyJoined);
    assert_eq!(h.handle.join(CHANNEL, "alice").await, JoinOutcome::AlreadyJoined);

    assert_eq!(store.get_balance("bob").unwrap(), 700);
    assert_eq!(store.get_balance("alice").unwrap(), 700);
    let snap = h.handle.snapshot().await.unwrap();
    assert_eq!(snap.participants, vec!["alice".to_string(), "bob".to_string()]);
    assert_eq!(drain(&mut h.chat), vec!["bob has joined the heist!"]);
}

#[tokio::test(start_paused = true)]
async fn join_without_funds_is_refused() {
    let (_dir, store) = temp_store();
    store.ensure_account("alice", 1000).unwrap();
    store.ensure_account("carol", 50).unwrap();
    let mut h = spawn_actor(&store, 6, system_now_ms);

    h.handle.start(CHANNEL, "alice", args(&["100", "bank", "vault"])).await;
    drain(&mut h.chat);

    assert_eq!(h.handle.join(CHANNEL, "carol").await, JoinOutcome::InsufficientBalance);
    assert_eq!(store.get_balance("carol").unwrap(), 50);
    assert_eq!(
        drain(&mut h.chat),
        vec!["Insufficient balance to join the heist."]
    );
    let snap = h.handle.snapshot().await.unwrap();
    assert_eq!(snap.participants.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn join_outside_a_window_does_nothing() {
    let (_dir, store) = temp_store();
    store.ensure_account("bob", 1000).unwrap();
    let mut h = spawn_actor(&store, 7, system_now_ms);

    assert_eq!(h.handle.join(CHANNEL, "bob").await, JoinOutcome::NotForming);
    assert!(drain(&mut h.chat).is_empty());
    assert_eq!(store.get_balance("bob").unwrap(), 1000);
}

#[tokio::test(start_paused = true)]
async fn start_without_funds_keeps_the_stake_debit() {
    let (_dir, store) = temp_store();
    store.ensure_account("dave", 50).unwrap();
    let mut h = spawn_actor(&store, 8, system_now_ms);

    let outcome = h.handle.start(CHANNEL, "dave", args(&["100", "bank", "vault"])).await;
    assert_eq!(outcome, StartOutcome::InsufficientBalance);
    assert_eq!(drain(&mut h.chat), vec!["Insufficient balance for the heist."]);
    // the stake is written before the check and stays written
    assert_eq!(store.get_balance("dave").unwrap(), -50);
    assert_eq!(h.handle.snapshot().await.unwrap().state, SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn start_by_unknown_account_aborts_quietly() {
    let (_dir, store) = temp_store();
    let mut h = spawn_actor(&store, 9, system_now_ms);

    let outcome = h.handle.start(CHANNEL, "ghost", args(&["100", "bank", "vault"])).await;
    assert_eq!(outcome, StartOutcome::Aborted);
    assert!(drain(&mut h.chat).is_empty());
    assert_eq!(h.handle.snapshot().await.unwrap().state, SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn injured_initiator_cannot_start() {
    let (_dir, store) = temp_store();
    store.ensure_account("alice", 1000).unwrap();
    store
        .upsert_injuries("alice", &[Injury::new(Severity::Minor, "stubbed a toe", T0)])
        .unwrap();
    let mut h = spawn_actor(&store, 10, fixed_clock);

    let outcome = h.handle.start(CHANNEL, "alice", args(&["100", "bank", "vault"])).await;
    assert_eq!(outcome, StartOutcome::Injured);
    assert_eq!(
        drain(&mut h.chat),
        vec!["alice has 1 active injury and needs to wait 60 minutes to recover."]
    );
    assert_eq!(store.get_balance("alice").unwrap(), 1000);
}

#[tokio::test(start_paused = true)]
async fn injured_initiator_sees_every_active_injury() {
    let (_dir, store) = temp_store();
    store.ensure_account("alice", 1000).unwrap();
    store
        .upsert_injuries(
            "alice",
            &[
                Injury::new(Severity::Minor, "a", T0 - 30 * 60_000),
                Injury::new(Severity::Moderate, "b", T0),
                // healed long ago
                Injury::new(Severity::Minor, "c", T0 - 24 * 60 * 60_000),
            ],
        )
        .unwrap();
    let mut h = spawn_actor(&store, 11, fixed_clock);

    h.handle.start(CHANNEL, "alice", args(&["100", "bank", "vault"])).await;
    assert_eq!(
        drain(&mut h.chat),
        vec!["alice has 2 active injuries and needs to wait 30 minutes, 300 minutes to recover."]
    );
}

#[tokio::test(start_paused = true)]
async fn injured_player_cannot_join() {
    let (_dir, store) = temp_store();
    store.ensure_account("alice", 1000).unwrap();
    store.ensure_account("bob", 1000).unwrap();
    store
        .upsert_injuries(
            "bob",
            &[Injury::new(Severity::Moderate, "twisted ankle", T0 - 10 * 60_000)],
        )
        .unwrap();
    let mut h = spawn_actor(&store, 12, fixed_clock);

    h.handle.start(CHANNEL, "alice", args(&["100", "bank", "vault"])).await;
    drain(&mut h.chat);
    assert_eq!(h.handle.join(CHANNEL, "bob").await, JoinOutcome::Injured);
    assert_eq!(
        drain(&mut h.chat),
        vec!["bob has an injury and needs to wait 290 minutes to recover."]
    );
    assert_eq!(store.get_balance("bob").unwrap(), 1000);
}

#[tokio::test(start_paused = true)]
async fn solo_heist_in_low_zone_always_fails() {
    let (_dir, store) = temp_store();
    store.ensure_account("alice", 1000).unwrap();
    let mut h = spawn_actor(&store, 13, fixed_clock);

    h.handle.start(CHANNEL, "alice", args(&["100", "corner", "store"])).await;
    tokio::time::sleep(past_window()).await;

    let snap = h.handle.snapshot().await.unwrap();
    assert_eq!(snap.state, SessionState::Idle, "session must be torn down after resolution");

    let msgs = drain(&mut h.chat);
    let result = msgs
        .iter()
        .find(|m| m.starts_with("Heist initiated by alice."))
        .unwrap_or_else(|| panic!("no result message in {:?}", msgs));
    assert!(result.contains(" The heist failed. Better luck next time!"), "{}", result);
    assert_eq!(store.get_balance("alice").unwrap(), 900, "a failed stake is not refunded");

    let injured = result.contains("alice received a ");
    let stored = store.injuries_for("alice").unwrap();
    assert_eq!(injured, !stored.is_empty(), "injury line and store disagree: {}", result);
    if let Some(injury) = stored.first() {
        assert_eq!(injury.timestamp, T0);
        assert!(result.contains(&format!(
            "needs to recover for {} minutes.",
            injury.duration / 60
        )));
    }
}

#[tokio::test(start_paused = true)]
async fn new_heist_can_start_after_resolution() {
    let (_dir, store) = temp_store();
    store.ensure_account("alice", 1000).unwrap();
    store.ensure_account("bob", 1000).unwrap();
    let h = spawn_actor(&store, 14, system_now_ms);

    h.handle.start(CHANNEL, "alice", args(&["100", "art", "museum"])).await;
    tokio::time::sleep(past_window()).await;
    assert_eq!(h.handle.snapshot().await.unwrap().state, SessionState::Idle);

    // bob sat out the first heist, so no injury can block him
    let outcome = h.handle.start(CHANNEL, "bob", args(&["100", "art", "museum"])).await;
    assert!(matches!(outcome, StartOutcome::Started { .. }), "{:?}", outcome);
}

fn between<'a>(haystack: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = haystack.find(start)? + start.len();
    let len = haystack[from..].find(end)?;
    Some(&haystack[from..from + len])
}

#[tokio::test(start_paused = true)]
async fn successful_heist_credits_each_winner_an_equal_share() {
    let (_dir, store) = temp_store();
    let mut h = spawn_actor(&store, 15, system_now_ms);

    // a ten-person crew in a high zone succeeds 29% of the time
    for round in 0..60 {
        let crew: Vec<String> = (0..10).map(|i| format!("crew{}_{}", round, i)).collect();
        for member in &crew {
            store.ensure_account(member, 1000).unwrap();
        }
        let outcome = h.handle.start(CHANNEL, &crew[0], args(&["100", "bank", "vault"])).await;
        assert!(matches!(outcome, StartOutcome::Started { .. }), "{:?}", outcome);
        for member in &crew[1..] {
            assert_eq!(h.handle.join(CHANNEL, member).await, JoinOutcome::Joined);
        }
        tokio::time::sleep(past_window()).await;

        let msgs = drain(&mut h.chat);
        let result = msgs
            .iter()
            .find(|m| m.starts_with("Heist initiated by "))
            .unwrap_or_else(|| panic!("no result message in {:?}", msgs))
            .clone();
        if !result.contains("The heist was successful!") {
            continue;
        }

        let winners: Vec<&str> = between(&result, "Congratulations to the winners: ", ".")
            .unwrap()
            .split(", ")
            .collect();
        let total: u64 = between(&result, "You managed to steal ", " units")
            .unwrap()
            .parse()
            .unwrap();
        assert!(!winners.is_empty() && winners.len() <= crew.len());

        let mut shares = Vec::new();
        for member in &crew {
            let balance = store.get_balance(member).unwrap();
            if winners.contains(&member.as_str()) {
                shares.push(balance - 900);
            } else {
                assert_eq!(balance, 900, "{} lost only the stake", member);
            }
        }
        let share = shares[0];
        assert!(shares.iter().all(|s| *s == share), "unequal shares {:?}", shares);
        let paid = share as u64 * winners.len() as u64;
        assert!(paid <= total && total - paid < winners.len() as u64);
        return;
    }
    panic!("no successful heist in 60 rounds");
}
