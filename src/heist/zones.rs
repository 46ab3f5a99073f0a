//! Heist zones: named locations with a difficulty tier.
//!
//! Zones come from configuration, either inline under `[heist.zones]` or from a JSON
//! file (`heist.zones_file`) that is re-read on every `!heist` so operators can edit it
//! while the bot runs. Lookup keys are the zone ids with underscores turned into spaces
//! and lowercased, matched against the trimmed, lowercased zone argument.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::HeistConfig;

/// Zone difficulty. Unknown strings in configuration map to [`Difficulty::Unrated`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Low,
    Moderate,
    High,
    #[serde(other)]
    Unrated,
}

impl Difficulty {
    /// Adjustment added to the participant-based success rate.
    pub fn success_delta(self) -> f64 {
        match self {
            Difficulty::High => 0.2,
            Difficulty::Moderate => 0.1,
            Difficulty::Low => -0.1,
            Difficulty::Unrated => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    pub difficulty: Difficulty,
}

/// Lookup table built from zone id -> [`Zone`].
#[derive(Debug, Clone, Default)]
pub struct ZoneCatalog {
    zones: BTreeMap<String, Zone>,
}

/// Normalize a zone id (`low_risk_zone`) into its lookup key (`low risk zone`).
pub fn lookup_key(zone_id: &str) -> String {
    zone_id.split('_').collect::<Vec<_>>().join(" ").to_lowercase()
}

impl ZoneCatalog {
    pub fn new(zones: BTreeMap<String, Zone>) -> Self {
        Self { zones }
    }

    /// Parse a JSON object of `id -> {name, difficulty}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let zones: BTreeMap<String, Zone> =
            serde_json::from_str(json).map_err(|e| anyhow!("invalid zones json: {}", e))?;
        Ok(Self::new(zones))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read zones file {}: {}", path.display(), e))?;
        Self::from_json(&json)
    }

    /// Resolve the catalog for one `!heist` invocation. A configured file wins; if it
    /// cannot be read the inline zones are used instead.
    pub fn load(config: &HeistConfig) -> Self {
        if let Some(ref file) = config.zones_file {
            match Self::from_file(Path::new(file)) {
                Ok(catalog) => return catalog,
                Err(e) => log::warn!("heist: {} (falling back to inline zones)", e),
            }
        }
        Self::new(config.zones.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Display names joined for chat, e.g. `Bank Vault, Corner Store`.
    pub fn display_names(&self) -> String {
        self.zones
            .values()
            .map(|z| z.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Find a zone by the user-supplied (possibly multi-word) name.
    pub fn find(&self, requested: &str) -> Option<&Zone> {
        let wanted = requested.trim().to_lowercase();
        self.zones
            .iter()
            .find(|(id, _)| lookup_key(id) == wanted)
            .map(|(_, zone)| zone)
    }
}
