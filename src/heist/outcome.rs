//! Success roll, loot split and winner selection.
//!
//! All functions here are pure over an injected RNG; the session actor applies their
//! results to the ledger and the injury store.

use rand::seq::SliceRandom;
use rand::Rng;

use super::zones::Difficulty;

/// Ceiling on the success rate.
pub const MAX_SUCCESS_RATE: f64 = 0.9;
/// Crew size at which the participant bonus stops growing.
pub const MAX_RATED_PARTICIPANTS: usize = 10;

/// Success rate for a crew of `participant_count` in a zone of `difficulty`.
///
/// The crew bonus grows linearly to 0.09 at ten participants, then the zone delta is
/// added. Only the upper bound is clamped; low zones with small crews go negative.
pub fn compute_success_rate(difficulty: Difficulty, participant_count: usize) -> f64 {
    let factor = (participant_count as f64 / MAX_RATED_PARTICIPANTS as f64).min(1.0);
    let per_participant = MAX_SUCCESS_RATE / MAX_RATED_PARTICIPANTS as f64;
    let rate = factor * per_participant + difficulty.success_delta();
    rate.min(MAX_SUCCESS_RATE)
}

/// Roll a d100 against `success_rate`.
pub fn roll_success<R: Rng + ?Sized>(success_rate: f64, rng: &mut R) -> bool {
    let roll: u32 = rng.gen_range(1..=100);
    f64::from(roll) <= success_rate * 100.0
}

/// Winners and their share of a successful haul.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payout {
    pub winners: Vec<String>,
    pub per_winner: u64,
}

impl Payout {
    pub fn total_paid(&self) -> u64 {
        self.per_winner * self.winners.len() as u64
    }
}

/// Split `total_loot` among a random non-empty subset of `participants`.
///
/// The winner count is uniform in `1..=participants.len()`; winners are the head of a
/// shuffled copy, so nobody is picked twice. Integer division drops the remainder.
pub fn distribute_payout<R: Rng + ?Sized>(
    total_loot: u64,
    participants: &[String],
    rng: &mut R,
) -> Payout {
    if participants.is_empty() {
        return Payout {
            winners: Vec::new(),
            per_winner: 0,
        };
    }
    let num_winners = rng.gen_range(1..=participants.len());
    let per_winner = total_loot / num_winners as u64;
    let mut shuffled = participants.to_vec();
    shuffled.shuffle(rng);
    shuffled.truncate(num_winners);
    Payout {
        winners: shuffled,
        per_winner,
    }
}
