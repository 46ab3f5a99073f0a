//! Loot catalog used when a heist succeeds.
//!
//! Each top-level entry is either a flat value (`gold`, `silver`, `documents`) or a
//! category of sub-items. A category drawn during looting is worth the sum of every
//! sub-item in it, not a single random pick.

use rand::Rng;

use super::zones::Difficulty;

/// Maximum number of draws in a single successful heist (inclusive).
pub const MAX_LOOT_DRAWS: u32 = 8;

/// A catalog entry: a flat value or a named group of sub-items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LootEntry {
    Flat(u64),
    Category(&'static [(&'static str, u64)]),
}

impl LootEntry {
    /// Worth of this entry before any zone bonus.
    pub fn resolve(&self) -> u64 {
        match self {
            LootEntry::Flat(value) => *value,
            LootEntry::Category(items) => items.iter().map(|(_, v)| *v).sum(),
        }
    }
}

const ARTWORK: &[(&str, u64)] = &[
    ("Paintings", 5000),
    ("Sculptures", 4000),
    ("Prints", 3000),
    ("Photography", 2000),
    ("Tapestry", 1500),
    ("ArtisticInstallations", 1000),
    ("DecorativeArtObjects", 500),
];

const ANTIQUE: &[(&str, u64)] = &[
    ("RareCoins", 1000),
    ("Currency", 800),
    ("Documents", 1200),
    ("Artifacts", 2500),
    ("Jewelry", 2000),
    ("Timepieces", 1500),
    ("Porcelain", 800),
    ("Ceramics", 1000),
    ("Collectibles", 1200),
];

const GEMS: &[(&str, u64)] = &[
    ("ruby", 1000),
    ("diamond", 2000),
    ("sapphire", 1500),
    ("Emerald", 1800),
    ("Aquamarine", 1200),
    ("Topaz", 800),
    ("Opal", 1000),
    ("Amethyst", 900),
    ("Garnet", 700),
    ("Pearl", 600),
];

const CASH: &[(&str, u64)] = &[
    ("Bill1000", 1000),
    ("Bill500", 500),
    ("Bill5000", 5000),
    ("Bill10000", 10000),
    ("Bill100000", 100000),
];

/// The static catalog, in draw-index order.
pub const LOOT_CATALOG: &[(&str, LootEntry)] = &[
    ("gold", LootEntry::Flat(2000)),
    ("silver", LootEntry::Flat(1500)),
    ("artwork", LootEntry::Category(ARTWORK)),
    ("antique", LootEntry::Category(ANTIQUE)),
    ("gems", LootEntry::Category(GEMS)),
    ("cash", LootEntry::Category(CASH)),
    ("documents", LootEntry::Flat(500)),
];

/// Look up a catalog entry by its top-level name.
pub fn entry(name: &str) -> Option<LootEntry> {
    LOOT_CATALOG
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, e)| *e)
}

/// Zone bonus applied to every drawn item, in percent.
pub fn bonus_percent(difficulty: Difficulty) -> u64 {
    match difficulty {
        Difficulty::High => 150,
        Difficulty::Moderate => 120,
        Difficulty::Low | Difficulty::Unrated => 100,
    }
}

/// Value of one drawn entry after the zone bonus.
pub fn adjusted_worth(entry: LootEntry, difficulty: Difficulty) -> u64 {
    entry.resolve() * bonus_percent(difficulty) / 100
}

/// Result of [`compute_loot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LootResult {
    pub total_amount: u64,
    /// Category names in draw order; repeats are kept.
    pub items: Vec<&'static str>,
}

/// Draw between 1 and [`MAX_LOOT_DRAWS`] catalog entries and total their worth.
///
/// The bet does not influence the haul; it is accepted so callers can pass the
/// session stake through unchanged.
pub fn compute_loot<R: Rng + ?Sized>(
    _bet_amount: u64,
    difficulty: Difficulty,
    rng: &mut R,
) -> LootResult {
    let draws = rng.gen_range(1..=MAX_LOOT_DRAWS);
    let mut total_amount = 0u64;
    let mut items = Vec::with_capacity(draws as usize);
    for _ in 0..draws {
        let (name, entry) = LOOT_CATALOG[rng.gen_range(0..LOOT_CATALOG.len())];
        total_amount = total_amount.saturating_add(adjusted_worth(entry, difficulty));
        items.push(name);
    }
    LootResult {
        total_amount,
        items,
    }
}
