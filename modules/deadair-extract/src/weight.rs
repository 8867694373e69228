//! Narrative weight: a single 1.0–10.0 float summarizing featured-worthiness.
//! Pure and deterministic; the timeline gates read it, nothing else does.

use std::sync::OnceLock;

use regex::Regex;

use deadair_common::types::{CanonTables, Story};

pub const WEIGHT_BASE: f64 = 3.0;
pub const WEIGHT_MIN: f64 = 1.0;
pub const WEIGHT_MAX: f64 = 10.0;

const DRAMATIC_BONUS: f64 = 1.5;
const FETCH_PENALTY: f64 = 1.0;
const PER_ACT_BONUS: f64 = 0.5;
const MAJOR_FACTION_BONUS: f64 = 1.0;
const HOSTILE_PAIR_BONUS: f64 = 0.5;
const CONFLICT_SCALE: f64 = 2.0;
const THEME_BONUS: f64 = 0.5;
const THEME_BONUS_CAP: f64 = 1.5;

fn dramatic_keywords() -> &'static [(&'static str, Regex)] {
    static KEYWORDS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    KEYWORDS.get_or_init(|| {
        [
            ("war", r"(?i)\bwars?\b"),
            ("siege", r"(?i)\bsieges?\b"),
            ("battle", r"(?i)\bbattles?\b"),
            ("liberation", r"(?i)\bliberat\w*\b"),
            ("betrayal", r"(?i)\bbetray\w*\b"),
            ("sacrifice", r"(?i)\bsacrific\w*\b"),
            ("revelation", r"(?i)\brevelations?\b"),
        ]
        .into_iter()
        .map(|(name, pattern)| (name, Regex::new(pattern).expect("static regex")))
        .collect()
    })
}

fn fetch_keywords() -> &'static [(&'static str, Regex)] {
    static KEYWORDS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    KEYWORDS.get_or_init(|| {
        [
            ("collect", r"(?i)\bcollect\w*\b"),
            ("fetch", r"(?i)\bfetch\w*\b"),
            ("deliver", r"(?i)\bdeliver\w*\b"),
            ("gather", r"(?i)\bgather\w*\b"),
        ]
        .into_iter()
        .map(|(name, pattern)| (name, Regex::new(pattern).expect("static regex")))
        .collect()
    })
}

/// Fetch keywords only count against the story when they dominate the act
/// titles; a single supply run inside a war arc costs nothing.
fn fetch_dominant(story: &Story) -> bool {
    if story.acts.is_empty() {
        return false;
    }
    let fetchy = story
        .acts
        .iter()
        .filter(|a| fetch_keywords().iter().any(|(_, re)| re.is_match(&a.title)))
        .count();
    fetchy * 2 >= story.acts.len()
}

/// Score a story. Same inputs always produce the same output.
pub fn narrative_weight(story: &Story, canon: &CanonTables) -> f64 {
    let text: String = story
        .acts
        .iter()
        .flat_map(|a| [a.title.as_str(), a.summary.as_str()])
        .collect::<Vec<_>>()
        .join(" ");

    let mut score = WEIGHT_BASE;

    for (_, re) in dramatic_keywords() {
        if re.is_match(&text) {
            score += DRAMATIC_BONUS;
        }
    }

    if fetch_dominant(story) {
        for (_, re) in fetch_keywords() {
            if re.is_match(&text) {
                score -= FETCH_PENALTY;
            }
        }
    }

    score += PER_ACT_BONUS * story.acts.len().saturating_sub(1) as f64;

    if story.factions.iter().any(|f| canon.is_major_faction(f)) {
        score += MAJOR_FACTION_BONUS;
        if canon.has_hostile_pair(&story.factions) {
            score += HOSTILE_PAIR_BONUS;
        }
    }

    score += CONFLICT_SCALE * story.mean_conflict();

    let significant = story
        .themes
        .iter()
        .filter(|t| canon.is_significant_theme(t))
        .count() as f64;
    score += (THEME_BONUS * significant).min(THEME_BONUS_CAP);

    score *= story.content_type.weight_modifier();
    score.clamp(WEIGHT_MIN, WEIGHT_MAX)
}
