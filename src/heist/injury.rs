//! Injuries handed out when a heist fails.
//!
//! Every participant of a failed heist has an even chance of being hurt. Severity follows a
//! fixed distribution (minor 70%, moderate 20%, severe 10%) and decides how long the player
//! sits out. `duration` is recorded in seconds, but an injury stays active until
//! `timestamp + duration * 60_000` ms, and chat shows `duration / 60` as minutes. A minor
//! injury therefore reads "1 minutes" in the failure message while blocking the player for
//! sixty minutes of wall-clock time.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Chance that a participant of a failed heist is injured.
pub const INJURY_CHANCE: f64 = 0.5;

const MS_PER_DURATION_UNIT: i64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Moderate,
    Severe,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Minor, Severity::Moderate, Severity::Severe];

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Minor => "minor",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
        }
    }

    /// Recovery duration in seconds.
    pub fn duration(self) -> i64 {
        match self {
            Severity::Minor => 60,
            Severity::Moderate => 300,
            Severity::Severe => 900,
        }
    }

    pub fn probability(self) -> f64 {
        match self {
            Severity::Minor => 0.7,
            Severity::Moderate => 0.2,
            Severity::Severe => 0.1,
        }
    }

    fn descriptions(self) -> &'static [&'static str] {
        match self {
            Severity::Minor => MINOR_DESCRIPTIONS,
            Severity::Moderate => MODERATE_DESCRIPTIONS,
            Severity::Severe => SEVERE_DESCRIPTIONS,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const MINOR_DESCRIPTIONS: &[&str] = &[
    "twisted an ankle while jumping over a fence",
    "bumped their head on a low-hanging pipe",
    "got a nasty scratch from a stray cat during the escape",
    "Clipped their shoe on a loose brick, causing a slight ankle sprain.",
    "Accidentally triggered a hidden paint grenade, leaving them covered in colorful paint but unharmed.",
    "Improvised a solution using a bobby pin and managed to escape, but strained a finger in the process.",
    "Spotted a hidden security camera at the last moment, causing them to trip and bump their head.",
    "Narrowly avoided a laser grid activation, but brushed against it, causing a minor electric shock.",
];

const MODERATE_DESCRIPTIONS: &[&str] = &[
    "strained a muscle during the getaway",
    "received a minor burn from a faulty security system",
    "was grazed by a bullet during a close call",
    "Miscalculated a code sequence and triggered a minor explosion, receiving burns from the hot fumes.",
    "Engaged in a struggle with a security guard, resulting in a pulled muscle and a few bruises.",
    "Took a risky jump to avoid capture, spraining an ankle on the landing.",
    "Used a smoke bomb to create a diversion, but inhaled some of the smoke and developed a cough.",
    "Escaped through a narrow passage, but scraped their arm on exposed pipes.",
];

const SEVERE_DESCRIPTIONS: &[&str] = &[
    "broke an arm trying to escape through a window",
    "sustained a concussion from a fall during the heist",
    "was shot in the leg during a shootout with security",
    "Attempted a daring escape from a moving vehicle, resulting in a broken leg from a fall.",
    "Sacrificed themselves to protect their team, taking a bullet in the shoulder during a shootout.",
    "Triggered a hidden trapdoor, falling through and sustaining serious injuries.",
    "Cornered by security forces, engaged in a hand - to - hand fight and received a severe concussion.",
    "Witnessed a teammate get captured, causing them to act recklessly and get seriously injured.",
];

/// One recorded injury. `timestamp` is epoch milliseconds at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Injury {
    pub severity: Severity,
    pub duration: i64,
    pub description: String,
    pub timestamp: i64,
}

impl Injury {
    pub fn new(severity: Severity, description: impl Into<String>, timestamp: i64) -> Self {
        Self {
            severity,
            duration: severity.duration(),
            description: description.into(),
            timestamp,
        }
    }

    /// Epoch ms at which the injury stops blocking the player.
    pub fn expires_at(&self) -> i64 {
        self.timestamp + self.duration * MS_PER_DURATION_UNIT
    }

    pub fn is_active(&self, now_ms: i64) -> bool {
        now_ms < self.expires_at()
    }

    /// Whole minutes left, rounded up. Zero or negative once healed.
    pub fn remaining_minutes(&self, now_ms: i64) -> i64 {
        let remaining = self.expires_at() - now_ms;
        // ceil for integers, valid for negative values too
        -((-remaining).div_euclid(MS_PER_DURATION_UNIT))
    }

    /// Minutes shown in the failure message (duration is seconds, shown as minutes).
    pub fn display_minutes(&self) -> i64 {
        self.duration / 60
    }
}

/// Pick a severity from the cumulative distribution. Falls back to minor when the draw
/// lands past the cumulative total.
pub fn roll_severity<R: Rng + ?Sized>(rng: &mut R) -> Severity {
    let draw: f64 = rng.gen();
    severity_for_draw(draw)
}

pub fn severity_for_draw(draw: f64) -> Severity {
    let mut cumulative = 0.0;
    for severity in Severity::ALL {
        cumulative += severity.probability();
        if draw <= cumulative {
            return severity;
        }
    }
    Severity::Minor
}

pub fn random_description<R: Rng + ?Sized>(severity: Severity, rng: &mut R) -> &'static str {
    severity
        .descriptions()
        .choose(rng)
        .copied()
        .unwrap_or("An unexpected injury occurred.")
}

/// Roll whether a participant of a failed heist is hurt, and how badly.
pub fn roll_injury<R: Rng + ?Sized>(rng: &mut R, now_ms: i64) -> Option<Injury> {
    if rng.gen::<f64>() > INJURY_CHANCE {
        return None;
    }
    let severity = roll_severity(rng);
    let description = random_description(severity, rng);
    Some(Injury::new(severity, description, now_ms))
}

/// Why a player may not take part right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjuryBlock {
    pub active: usize,
    /// Remaining minutes per active injury, in record order.
    pub remaining_minutes: Vec<i64>,
}

/// Gate used by `!heist`: every active injury counts and all of them are reported.
pub fn start_gate(injuries: &[Injury], now_ms: i64) -> Option<InjuryBlock> {
    let remaining_minutes: Vec<i64> = injuries
        .iter()
        .filter(|i| i.is_active(now_ms))
        .map(|i| i.remaining_minutes(now_ms))
        .collect();
    if remaining_minutes.is_empty() {
        None
    } else {
        Some(InjuryBlock {
            active: remaining_minutes.len(),
            remaining_minutes,
        })
    }
}

/// Gate used by `!join`: only the first recorded injury is consulted.
pub fn join_gate(injuries: &[Injury], now_ms: i64) -> Option<i64> {
    let first = injuries.first()?;
    let remaining = first.remaining_minutes(now_ms);
    (remaining > 0).then_some(remaining)
}
