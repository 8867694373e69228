//! DJ knowledge boundaries: may this DJ narrate this story, and from what
//! epistemic stance?

use deadair_common::error::Rejection;
use deadair_common::types::{DjProfile, Story};
use deadair_world::types::{Framing, KnowledgeTier};

/// Outcome of the narration rules. A beat carries exactly one framing; the
/// rumor overlay survives as a hint when a story is future to the DJ but a
/// stronger framing won.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NarrationDecision {
    pub framing: Framing,
    pub rumor_overlay: bool,
}

/// Apply the narration rules in order: temporal, spatial, faction
/// knowledge, knowledge tier.
pub fn narration_decision(story: &Story, dj: &DjProfile) -> Result<NarrationDecision, Rejection> {
    let mut framing = Framing::Direct;
    let mut rumor_overlay = false;

    // 1. Temporal: events after the DJ's present can only travel as rumor,
    // and only when the story is plausible hearsay.
    if story.year_min.is_some_and(|y| y > dj.year) {
        if !story.plausible {
            return Err(Rejection::TemporalBoundary {
                detail: format!(
                    "story begins {} but {} broadcasts from {}",
                    story.year_min.unwrap_or_default(),
                    dj.id,
                    dj.year
                ),
            });
        }
        framing = Framing::Rumor;
        rumor_overlay = true;
    }

    // 2. Spatial: another region downgrades to a verified report unless the
    // DJ knows one of the participants firsthand.
    if let Some(region) = &story.region {
        if !region.eq_ignore_ascii_case(&dj.region)
            && framing == Framing::Direct
            && !story.entities().iter().any(|e| dj.knows_faction(e))
        {
            framing = Framing::Report;
        }
    }

    // 3. Faction knowledge: actors the DJ has never heard of force
    // speculation, which in turn needs a Restricted ceiling or better.
    if story.factions.iter().any(|f| dj.cannot_know_faction(f)) {
        if dj.knowledge_ceiling < KnowledgeTier::Restricted {
            return Err(Rejection::TierForbidden {
                story_tier: story.knowledge_tier,
                ceiling: dj.knowledge_ceiling,
            });
        }
        framing = Framing::Speculation;
    }

    // 4. Knowledge tier ceiling.
    if !dj.may_narrate_tier(story.knowledge_tier) {
        return Err(Rejection::TierForbidden {
            story_tier: story.knowledge_tier,
            ceiling: dj.knowledge_ceiling,
        });
    }

    Ok(NarrationDecision {
        framing,
        rumor_overlay,
    })
}
