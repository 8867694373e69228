//! Deterministic act construction from ordered lore chunks.
//!
//! No model calls here: act shape comes from keyword families, source order
//! is preserved within a wiki title, and adjacent chunks of the same act
//! type merge into a single act.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use deadair_common::types::{Chunk, StoryAct, MAX_ACTS};
use deadair_world::types::{ActType, EmotionalTone};

const SUMMARY_CAP: usize = 480;

struct ActKeywords {
    setup: Regex,
    rising: Regex,
    climax: Regex,
    falling: Regex,
    resolution: Regex,
}

fn act_keywords() -> &'static ActKeywords {
    static KEYWORDS: OnceLock<ActKeywords> = OnceLock::new();
    KEYWORDS.get_or_init(|| ActKeywords {
        setup: Regex::new(r"(?i)\b(arriv\w*|discover\w*|begins?|began|found(ed|ing)|settl\w*)\b")
            .expect("static regex"),
        rising: Regex::new(r"(?i)\b(advanc\w*|march\w*|pursu\w*|escalat\w*|mobiliz\w*)\b")
            .expect("static regex"),
        climax: Regex::new(r"(?i)\b(battle\w*|fight\w*|confrontation\w*|attack\w*|sieges?|assault\w*)\b")
            .expect("static regex"),
        falling: Regex::new(r"(?i)\b(retreat\w*|aftermath|withdraw\w*|mourn\w*|scatter\w*)\b")
            .expect("static regex"),
        resolution: Regex::new(r"(?i)\b(victor\w*|peace|resolv\w*|ended?|treat(y|ies)|rebuilt)\b")
            .expect("static regex"),
    })
}

struct ToneKeywords {
    hopeful: Regex,
    tragic: Regex,
    mysterious: Regex,
    comedic: Regex,
    tense: Regex,
}

fn tone_keywords() -> &'static ToneKeywords {
    static KEYWORDS: OnceLock<ToneKeywords> = OnceLock::new();
    KEYWORDS.get_or_init(|| ToneKeywords {
        hopeful: Regex::new(r"(?i)\b(hope\w*|rebuild\w*|renew\w*|thriv\w*|recover\w*)\b")
            .expect("static regex"),
        tragic: Regex::new(r"(?i)\b(death\w*|died|loss(es)?|destroy\w*|tragedy|massacre\w*)\b")
            .expect("static regex"),
        mysterious: Regex::new(r"(?i)\b(myster\w*|unknown|strange\w*|vanish\w*|unexplained)\b")
            .expect("static regex"),
        comedic: Regex::new(r"(?i)\b(laugh\w*|jokes?|absurd\w*|prank\w*|ridiculous)\b")
            .expect("static regex"),
        tense: Regex::new(r"(?i)\b(threat\w*|fear\w*|standoff|tension\w*|danger\w*)\b")
            .expect("static regex"),
    })
}

/// Classify one chunk of text into an act type with a conflict level.
pub fn classify(text: &str) -> (ActType, f64) {
    let kw = act_keywords();
    let counts = [
        (ActType::Climax, kw.climax.find_iter(text).count()),
        (ActType::Resolution, kw.resolution.find_iter(text).count()),
        (ActType::Rising, kw.rising.find_iter(text).count()),
        (ActType::Falling, kw.falling.find_iter(text).count()),
        (ActType::Setup, kw.setup.find_iter(text).count()),
    ];

    let max = counts.iter().map(|(_, n)| *n).max().unwrap_or(0);
    if max == 0 {
        return (ActType::Setup, 0.1);
    }
    // Ties break toward the dramatically stronger family (array order).
    let act_type = counts
        .iter()
        .find(|(_, n)| *n == max)
        .map(|(t, _)| *t)
        .unwrap_or(ActType::Setup);

    let conflict = match act_type {
        ActType::Climax => (0.7 + 0.1 * (max.saturating_sub(1).min(3) as f64)).min(1.0),
        ActType::Rising => 0.4 + 0.05 * (max.min(4) as f64),
        ActType::Falling => 0.3,
        ActType::Resolution => 0.2,
        ActType::Setup => 0.1,
    };
    (act_type, conflict)
}

/// Dominant emotional tone of a block of text by keyword frequency.
pub fn derive_tone(text: &str) -> EmotionalTone {
    let kw = tone_keywords();
    let counts = [
        (EmotionalTone::Tragic, kw.tragic.find_iter(text).count()),
        (EmotionalTone::Tense, kw.tense.find_iter(text).count()),
        (EmotionalTone::Hopeful, kw.hopeful.find_iter(text).count()),
        (EmotionalTone::Mysterious, kw.mysterious.find_iter(text).count()),
        (EmotionalTone::Comedic, kw.comedic.find_iter(text).count()),
    ];
    let max = counts.iter().map(|(_, n)| *n).max().unwrap_or(0);
    if max == 0 {
        return EmotionalTone::Neutral;
    }
    counts
        .iter()
        .find(|(_, n)| *n == max)
        .map(|(t, _)| *t)
        .unwrap_or(EmotionalTone::Neutral)
}

/// Tone most represented across a story's acts (first act wins ties).
pub fn dominant_tone(acts: &[StoryAct]) -> EmotionalTone {
    let mut best = EmotionalTone::Neutral;
    let mut best_count = 0usize;
    for act in acts {
        let count = acts.iter().filter(|a| a.tone == act.tone).count();
        if count > best_count {
            best = act.tone;
            best_count = count;
        }
    }
    best
}

fn truncate_summary(text: &str) -> String {
    if text.len() <= SUMMARY_CAP {
        return text.to_string();
    }
    let mut end = SUMMARY_CAP;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

struct DraftAct {
    act_type: ActType,
    title: String,
    text: String,
    conflict: f64,
    year: Option<i32>,
    source_chunks: Vec<String>,
    themes: BTreeSet<String>,
    entities: BTreeSet<String>,
}

impl DraftAct {
    fn from_chunk(chunk: &Chunk) -> Self {
        let (act_type, conflict) = classify(&chunk.text);
        let title = if chunk.section.trim().is_empty() {
            chunk.wiki_title.clone()
        } else {
            chunk.section.clone()
        };
        let mut themes = BTreeSet::new();
        for theme in &chunk.meta.themes {
            themes.insert(theme.to_lowercase());
        }
        let mut entities = BTreeSet::new();
        if let Some(faction) = &chunk.meta.faction {
            entities.insert(faction.clone());
        }
        if let Some(region) = &chunk.meta.region {
            entities.insert(region.clone());
        }
        Self {
            act_type,
            title,
            text: chunk.text.clone(),
            conflict,
            year: chunk.meta.year,
            source_chunks: vec![chunk.id.clone()],
            themes,
            entities,
        }
    }

    fn absorb(&mut self, other: DraftAct) {
        // The louder half names the merged act.
        if other.conflict > self.conflict {
            self.act_type = other.act_type;
            self.title = other.title;
        }
        self.text.push(' ');
        self.text.push_str(&other.text);
        self.conflict = self.conflict.max(other.conflict);
        self.year = match (self.year, other.year) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.source_chunks.extend(other.source_chunks);
        self.themes.extend(other.themes);
        self.entities.extend(other.entities);
    }
}

/// Build the act sequence for one story from chunks in source order.
/// Adjacent chunks of the same act type merge; more than [`MAX_ACTS`] acts
/// collapse at the lowest-conflict adjacent pair until the cap holds.
pub fn build_acts(chunks: &[Chunk]) -> Vec<StoryAct> {
    let mut drafts: Vec<DraftAct> = Vec::new();
    for chunk in chunks {
        let draft = DraftAct::from_chunk(chunk);
        match drafts.last_mut() {
            Some(last) if last.act_type == draft.act_type => last.absorb(draft),
            _ => drafts.push(draft),
        }
    }

    while drafts.len() > MAX_ACTS {
        let mut lowest = 0usize;
        let mut lowest_sum = f64::MAX;
        for i in 0..drafts.len() - 1 {
            let sum = drafts[i].conflict + drafts[i + 1].conflict;
            if sum < lowest_sum {
                lowest_sum = sum;
                lowest = i;
            }
        }
        let absorbed = drafts.remove(lowest + 1);
        drafts[lowest].absorb(absorbed);
    }

    drafts
        .into_iter()
        .enumerate()
        .map(|(i, draft)| {
            let tone = derive_tone(&draft.text);
            StoryAct {
                number: (i + 1) as u32,
                act_type: draft.act_type,
                title: draft.title,
                summary: truncate_summary(&draft.text),
                conflict: draft.conflict,
                tone,
                year: draft.year,
                source_chunks: draft.source_chunks,
                themes: draft.themes,
                entities: draft.entities,
                broadcast_count: 0,
                first_broadcast: None,
                last_broadcast: None,
            }
        })
        .collect()
}
