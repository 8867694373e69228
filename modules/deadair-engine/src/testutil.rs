//! Story fixtures shared by the engine's unit tests.

use std::collections::BTreeSet;

use deadair_common::types::{Story, StoryAct};
use deadair_world::types::{
    ActType, ContentType, EmotionalTone, KnowledgeTier, StoryStatus, Timeline,
};

pub(crate) fn fixture_act(number: u32, act_type: ActType, conflict: f64) -> StoryAct {
    StoryAct {
        number,
        act_type,
        title: format!("Act {number}"),
        summary: format!("Act {number} of the tale"),
        conflict,
        tone: EmotionalTone::Neutral,
        year: Some(2100 + number as i32),
        source_chunks: vec![format!("chunk-{number}")],
        themes: ["survival".to_string()].into_iter().collect(),
        entities: BTreeSet::new(),
        broadcast_count: 0,
        first_broadcast: None,
        last_broadcast: None,
    }
}

pub(crate) fn base_story(id: &str, weight: f64, acts: Vec<StoryAct>) -> Story {
    Story {
        id: id.to_string(),
        title: format!("Story {id}"),
        content_type: ContentType::Quest,
        timeline: Timeline::Daily,
        status: StoryStatus::Dormant,
        era: Some("reclamation".to_string()),
        year_min: Some(2101),
        year_max: Some(2101 + acts.len() as i32),
        region: Some("Appalachia".to_string()),
        factions: ["Responders".to_string()].into_iter().collect(),
        locations: BTreeSet::new(),
        characters: BTreeSet::new(),
        themes: ["survival".to_string()].into_iter().collect(),
        knowledge_tier: KnowledgeTier::Common,
        compatible_djs: ["dj-julie".to_string()].into_iter().collect(),
        acts,
        narrative_weight: weight,
        source_chunks: vec![],
        escalated_from: None,
        plausible: true,
    }
}

/// `n` acts with no resolution act anywhere; advances only end the story by
/// running off the last act.
pub(crate) fn multi_act_story(id: &str, weight: f64, n: u32) -> Story {
    let acts = (1..=n)
        .map(|i| fixture_act(i, ActType::Setup, 0.2))
        .collect();
    base_story(id, weight, acts)
}

/// One act, resolution-typed: emits once and completes.
pub(crate) fn resolution_story(id: &str, weight: f64) -> Story {
    base_story(id, weight, vec![fixture_act(1, ActType::Resolution, 0.2)])
}

/// A proper dramatic arc ending in a resolution act.
pub(crate) fn arc_story(id: &str, weight: f64, n: u32) -> Story {
    let acts = (1..=n)
        .map(|i| {
            let act_type = if i == n {
                ActType::Resolution
            } else if i == n.saturating_sub(1) {
                ActType::Climax
            } else {
                ActType::Rising
            };
            let conflict = if act_type == ActType::Climax { 0.9 } else { 0.3 };
            fixture_act(i, act_type, conflict)
        })
        .collect();
    base_story(id, weight, acts)
}
