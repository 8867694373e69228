//! Promotion of stories that earned a bigger stage: a cleanly completed
//! story with enough engagement re-emerges one cadence up as a new,
//! expanded story carrying lineage back to the original.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use deadair_common::config::{EscalationPolicy, SchedulerPolicy};
use deadair_common::error::Result;
use deadair_common::types::{ActiveStory, CanonTables, Story, StoryAct};
use deadair_extract::weight::narrative_weight;
use deadair_world::types::{ActType, EmotionalTone, StoryStatus, Timeline};

use crate::state::StoryState;

/// Minimum act count for an escalated follow-up; thin originals get a
/// recap act in front and an aftermath act behind.
const ESCALATED_MIN_ACTS: usize = 3;

/// Consider the retired story for escalation. Returns the new story id if
/// one entered the higher pool.
pub fn maybe_escalate(
    retired: &ActiveStory,
    escalation: &EscalationPolicy,
    scheduler_policy: &SchedulerPolicy,
    canon: &CanonTables,
    state: &mut StoryState,
    now: DateTime<Utc>,
) -> Result<Option<String>> {
    let rule = match escalation.rule(retired.timeline) {
        Some(rule) => rule,
        None => return Ok(None),
    };
    if retired.engagement < rule.min_engagement
        || retired.total_broadcasts < rule.min_broadcasts
    {
        return Ok(None);
    }
    let to = match retired.timeline.escalated() {
        Some(to) => to,
        None => return Ok(None),
    };

    let mut story = derive_follow_up(&retired.story, to);
    story.narrative_weight = narrative_weight(&story, canon);

    let floor = scheduler_policy.weight_floor(to);
    if story.narrative_weight < floor {
        debug!(
            original = retired.story.id,
            weight = story.narrative_weight,
            floor,
            %to,
            "follow-up under destination floor, discarded"
        );
        return Ok(None);
    }

    let new_id = story.id.clone();
    state.add_to_pool(to, story, scheduler_policy)?;
    state.record_escalation(retired.timeline, to, &retired.story.id, now)?;
    info!(
        original = retired.story.id,
        follow_up = new_id,
        from = %retired.timeline,
        %to,
        "story escalated"
    );
    Ok(Some(new_id))
}

/// Build the expanded follow-up: original acts with reset bookkeeping,
/// padded with a recap and an aftermath when the original was thin.
fn derive_follow_up(original: &Story, to: Timeline) -> Story {
    let mut acts: Vec<StoryAct> = original
        .acts
        .iter()
        .map(|act| StoryAct {
            broadcast_count: 0,
            first_broadcast: None,
            last_broadcast: None,
            ..act.clone()
        })
        .collect();

    if acts.len() < ESCALATED_MIN_ACTS {
        let recap = StoryAct {
            number: 0,
            act_type: ActType::Setup,
            title: "The story so far".to_string(),
            summary: original
                .acts
                .iter()
                .map(|a| a.title.as_str())
                .collect::<Vec<_>>()
                .join(". "),
            conflict: 0.1,
            tone: EmotionalTone::Neutral,
            year: original.year_min,
            source_chunks: original.source_chunks.clone(),
            themes: original.themes.clone(),
            entities: original.entities(),
            broadcast_count: 0,
            first_broadcast: None,
            last_broadcast: None,
        };
        let aftermath = StoryAct {
            number: 0,
            act_type: ActType::Falling,
            title: format!("Aftermath of {}", original.title),
            summary: original
                .acts
                .last()
                .map(|a| a.summary.clone())
                .unwrap_or_default(),
            conflict: 0.2,
            tone: EmotionalTone::Neutral,
            year: original.year_max,
            source_chunks: original.source_chunks.clone(),
            themes: original.themes.clone(),
            entities: original.entities(),
            broadcast_count: 0,
            first_broadcast: None,
            last_broadcast: None,
        };
        acts.insert(0, recap);
        acts.push(aftermath);
    }
    for (i, act) in acts.iter_mut().enumerate() {
        act.number = (i + 1) as u32;
    }

    Story {
        // Derived, not minted: replaying the same completion must produce
        // the same follow-up id.
        id: format!("{}::{}", original.id, to),
        title: format!("{}, continued", original.title),
        timeline: to,
        status: StoryStatus::Dormant,
        acts,
        narrative_weight: 0.0,
        escalated_from: Some(original.id.clone()),
        ..original.clone()
    }
}
