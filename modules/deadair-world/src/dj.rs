//! DJ profiles.
//!
//! A DJ is a plain record; every behavioral difference between DJs lives in
//! the narration rule tables, not in code per DJ.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::KnowledgeTier;

/// Static per-DJ knowledge boundary, loaded once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DjProfile {
    pub id: String,
    pub name: String,
    /// Era key into the canon era table.
    pub era: String,
    /// The in-universe year this DJ broadcasts from.
    pub year: i32,
    pub region: String,
    /// Factions this DJ can speak about firsthand.
    pub known_factions: BTreeSet<String>,
    /// Factions this DJ has never heard of (future or distant).
    pub unknown_factions: BTreeSet<String>,
    /// Highest knowledge tier this DJ may narrate.
    pub knowledge_ceiling: KnowledgeTier,
}

impl DjProfile {
    pub fn knows_faction(&self, faction: &str) -> bool {
        self.known_factions
            .iter()
            .any(|f| f.eq_ignore_ascii_case(faction))
    }

    pub fn cannot_know_faction(&self, faction: &str) -> bool {
        self.unknown_factions
            .iter()
            .any(|f| f.eq_ignore_ascii_case(faction))
    }

    pub fn may_narrate_tier(&self, tier: KnowledgeTier) -> bool {
        tier <= self.knowledge_ceiling
    }
}
