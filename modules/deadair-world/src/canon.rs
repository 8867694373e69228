//! Static canon: faction relationships, lifespans, dated events, era bounds.
//!
//! These tables are data, not behavior. The lore validator reads them; nothing
//! in the core mutates them after construction.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Symmetric stance between two factions. Anything not in the table is
/// `Neutral`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactionRelation {
    War,
    Hostile,
    Neutral,
    Friendly,
    Allied,
}

impl FactionRelation {
    /// War and Hostile pairs cannot be portrayed as cooperating.
    pub fn forbids_cooperation(self) -> bool {
        matches!(self, FactionRelation::War | FactionRelation::Hostile)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionLifespan {
    pub founded: i32,
    /// `None` means the faction persists through the present of every DJ.
    pub dissolved: Option<i32>,
}

impl FactionLifespan {
    pub fn exists_during(&self, year_min: i32, year_max: i32) -> bool {
        let end = self.dissolved.unwrap_or(i32::MAX);
        self.founded <= year_max && end >= year_min
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EraBounds {
    pub min_year: i32,
    pub max_year: i32,
}

/// The full canon rulebook a validator runs against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonTables {
    /// Keyed by the lexicographically sorted pair, lowercase.
    relationships: BTreeMap<(String, String), FactionRelation>,
    lifespans: BTreeMap<String, FactionLifespan>,
    /// Named world events with an exact canonical year.
    events: BTreeMap<String, i32>,
    eras: BTreeMap<String, EraBounds>,
    major_factions: BTreeSet<String>,
    significant_themes: BTreeSet<String>,
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    if a <= b { (a, b) } else { (b, a) }
}

impl CanonTables {
    pub fn empty() -> Self {
        Self {
            relationships: BTreeMap::new(),
            lifespans: BTreeMap::new(),
            events: BTreeMap::new(),
            eras: BTreeMap::new(),
            major_factions: BTreeSet::new(),
            significant_themes: BTreeSet::new(),
        }
    }

    pub fn set_relation(&mut self, a: &str, b: &str, relation: FactionRelation) {
        self.relationships.insert(pair_key(a, b), relation);
    }

    pub fn set_lifespan(&mut self, faction: &str, founded: i32, dissolved: Option<i32>) {
        self.lifespans
            .insert(faction.to_lowercase(), FactionLifespan { founded, dissolved });
    }

    pub fn set_event(&mut self, name: &str, year: i32) {
        self.events.insert(name.to_lowercase(), year);
    }

    pub fn set_era(&mut self, era: &str, min_year: i32, max_year: i32) {
        self.eras
            .insert(era.to_lowercase(), EraBounds { min_year, max_year });
    }

    pub fn add_major_faction(&mut self, faction: &str) {
        self.major_factions.insert(faction.to_lowercase());
    }

    pub fn add_significant_theme(&mut self, theme: &str) {
        self.significant_themes.insert(theme.to_lowercase());
    }

    /// Symmetric lookup; unknown pairs are neutral.
    pub fn relation(&self, a: &str, b: &str) -> FactionRelation {
        self.relationships
            .get(&pair_key(a, b))
            .copied()
            .unwrap_or(FactionRelation::Neutral)
    }

    pub fn lifespan(&self, faction: &str) -> Option<FactionLifespan> {
        self.lifespans.get(&faction.to_lowercase()).copied()
    }

    pub fn event_year(&self, name: &str) -> Option<i32> {
        self.events.get(&name.to_lowercase()).copied()
    }

    /// Iterate (event name, canonical year) pairs.
    pub fn events(&self) -> impl Iterator<Item = (&str, i32)> {
        self.events.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn era_bounds(&self, era: &str) -> Option<EraBounds> {
        self.eras.get(&era.to_lowercase()).copied()
    }

    pub fn is_major_faction(&self, faction: &str) -> bool {
        self.major_factions.contains(&faction.to_lowercase())
    }

    pub fn is_significant_theme(&self, theme: &str) -> bool {
        self.significant_themes.contains(&theme.to_lowercase())
    }

    /// True if any two of the given factions are at war or hostile.
    pub fn has_hostile_pair(&self, factions: &BTreeSet<String>) -> bool {
        let list: Vec<&String> = factions.iter().collect();
        for (i, a) in list.iter().enumerate() {
            for b in &list[i + 1..] {
                if self.relation(a, b).forbids_cooperation() {
                    return true;
                }
            }
        }
        false
    }
}

impl Default for CanonTables {
    /// The shipped wasteland canon. Callers with a different setting build
    /// their own tables via the setters.
    fn default() -> Self {
        let mut t = Self::empty();

        // Relationships
        t.set_relation("NCR", "Caesar's Legion", FactionRelation::War);
        t.set_relation("Brotherhood of Steel", "Institute", FactionRelation::War);
        t.set_relation("Brotherhood of Steel", "Enclave", FactionRelation::War);
        t.set_relation("Railroad", "Institute", FactionRelation::War);
        t.set_relation("Minutemen", "Institute", FactionRelation::Hostile);
        t.set_relation("NCR", "Brotherhood of Steel", FactionRelation::Hostile);
        t.set_relation("Responders", "Raiders", FactionRelation::Hostile);
        t.set_relation("Free States", "Scorched", FactionRelation::Hostile);
        t.set_relation("NCR", "Followers of the Apocalypse", FactionRelation::Friendly);
        t.set_relation("Minutemen", "Railroad", FactionRelation::Friendly);
        t.set_relation("Responders", "Free States", FactionRelation::Allied);

        // Lifespans
        t.set_lifespan("Vault-Tec", 2031, Some(2077));
        t.set_lifespan("Enclave", 2077, None);
        t.set_lifespan("Brotherhood of Steel", 2077, None);
        t.set_lifespan("Responders", 2077, Some(2097));
        t.set_lifespan("Free States", 2077, Some(2102));
        t.set_lifespan("Scorched", 2086, None);
        t.set_lifespan("Institute", 2110, None);
        t.set_lifespan("Followers of the Apocalypse", 2161, None);
        t.set_lifespan("Minutemen", 2180, None);
        t.set_lifespan("NCR", 2189, None);
        t.set_lifespan("Railroad", 2214, None);
        t.set_lifespan("Caesar's Legion", 2247, None);

        // Dated events
        t.set_event("Great War", 2077);
        t.set_event("Reclamation Day", 2102);
        t.set_event("First Battle of Hoover Dam", 2277);
        t.set_event("Second Battle of Hoover Dam", 2281);
        t.set_event("Battle of Bunker Hill", 2287);

        // Era bounds
        t.set_era("pre_war", 1945, 2077);
        t.set_era("reclamation", 2096, 2110);
        t.set_era("new_california", 2161, 2281);
        t.set_era("commonwealth", 2277, 2290);

        // Major factions
        for f in [
            "NCR",
            "Caesar's Legion",
            "Brotherhood of Steel",
            "Institute",
            "Enclave",
            "Railroad",
            "Minutemen",
            "Responders",
            "Vault-Tec",
            "Followers of the Apocalypse",
        ] {
            t.add_major_faction(f);
        }

        // Themes that carry narrative weight
        for th in [
            "war",
            "survival",
            "betrayal",
            "redemption",
            "discovery",
            "sacrifice",
            "freedom",
            "revenge",
        ] {
            t.add_significant_theme(th);
        }

        t
    }
}
