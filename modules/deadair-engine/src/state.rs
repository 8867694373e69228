//! The persistent story container: pools, active slots, cooldowns, and the
//! append-only archives. Every mutator checks its invariants before
//! committing; a refused mutation is a bug signal, not a candidate problem.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use deadair_common::config::SchedulerPolicy;
use deadair_common::error::{DeadAirError, Result};
use deadair_common::types::{ActiveStory, ArchivedStory, EscalationRecord, Story};
use deadair_common::validate::structure_errors;
use deadair_world::types::{StoryStatus, Timeline};

pub const SCHEMA_VERSION: u32 = 1;

/// Completion engagement bonus, recorded as the story's final value.
const COMPLETION_ENGAGEMENT_BONUS: f64 = 0.10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Archive {
    pub completed: Vec<ArchivedStory>,
    pub abandoned: Vec<ArchivedStory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryState {
    pub schema_version: u32,
    pub global_broadcast_counter: u64,
    pub pools: BTreeMap<Timeline, Vec<Story>>,
    pub active: BTreeMap<Timeline, Option<ActiveStory>>,
    pub cooldowns: BTreeMap<Timeline, u32>,
    pub archive: Archive,
    pub escalation_log: Vec<EscalationRecord>,
    /// Broadcast counter value at each timeline's last emitted beat, for
    /// minimum-gap enforcement.
    pub last_beat_counter: BTreeMap<Timeline, Option<u64>>,
}

impl Default for StoryState {
    fn default() -> Self {
        Self::new()
    }
}

impl StoryState {
    pub fn new() -> Self {
        let mut pools = BTreeMap::new();
        let mut active = BTreeMap::new();
        let mut cooldowns = BTreeMap::new();
        let mut last_beat_counter = BTreeMap::new();
        for timeline in Timeline::ALL {
            pools.insert(timeline, Vec::new());
            active.insert(timeline, None);
            cooldowns.insert(timeline, 0);
            last_beat_counter.insert(timeline, None);
        }
        Self {
            schema_version: SCHEMA_VERSION,
            global_broadcast_counter: 0,
            pools,
            active,
            cooldowns,
            archive: Archive::default(),
            escalation_log: Vec::new(),
            last_beat_counter,
        }
    }

    // --- accessors ---

    pub fn pool(&self, timeline: Timeline) -> &[Story] {
        self.pools.get(&timeline).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn active(&self, timeline: Timeline) -> Option<&ActiveStory> {
        self.active.get(&timeline).and_then(Option::as_ref)
    }

    pub fn active_mut(&mut self, timeline: Timeline) -> Option<&mut ActiveStory> {
        self.active.get_mut(&timeline).and_then(Option::as_mut)
    }

    pub fn cooldown(&self, timeline: Timeline) -> u32 {
        self.cooldowns.get(&timeline).copied().unwrap_or(0)
    }

    pub fn last_beat(&self, timeline: Timeline) -> Option<u64> {
        self.last_beat_counter.get(&timeline).copied().flatten()
    }

    pub fn note_beat(&mut self, timeline: Timeline) {
        let counter = self.global_broadcast_counter;
        self.last_beat_counter.insert(timeline, Some(counter));
    }

    fn id_in_use(&self, id: &str) -> bool {
        self.active
            .values()
            .flatten()
            .any(|a| a.story_id() == id)
            || self.archive.completed.iter().any(|a| a.id == id)
            || self.archive.abandoned.iter().any(|a| a.id == id)
    }

    // --- mutators ---

    /// Append a validated story to a pool tail. Duplicate pool entries are
    /// silently deduplicated; an id already active or archived is a bug.
    pub fn add_to_pool(
        &mut self,
        timeline: Timeline,
        mut story: Story,
        policy: &SchedulerPolicy,
    ) -> Result<()> {
        story.timeline = timeline;
        let errors = structure_errors(&story, policy);
        if !errors.is_empty() {
            return Err(DeadAirError::InvariantViolation(format!(
                "story {} refused by pool {timeline}: {}",
                story.id,
                errors.join("; ")
            )));
        }
        if self.id_in_use(&story.id) {
            return Err(DeadAirError::InvariantViolation(format!(
                "story {} already active or archived",
                story.id
            )));
        }
        let pool = self.pools.entry(timeline).or_default();
        if pool.iter().any(|s| s.id == story.id) {
            debug!(story = story.id, %timeline, "duplicate pool insert ignored");
            return Ok(());
        }
        story.status = StoryStatus::Dormant;
        pool.push(story);
        Ok(())
    }

    /// Order a pool head-first by `(narrative_weight desc, freshness desc)`.
    pub fn rank_pool<F>(&mut self, timeline: Timeline, freshness: F)
    where
        F: Fn(&Story) -> f64,
    {
        if let Some(pool) = self.pools.get_mut(&timeline) {
            pool.sort_by(|a, b| {
                b.narrative_weight
                    .partial_cmp(&a.narrative_weight)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| {
                        freshness(b)
                            .partial_cmp(&freshness(a))
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .then_with(|| a.id.cmp(&b.id))
            });
        }
    }

    /// Pop the pool head into the slot, if the slot is free and off
    /// cooldown. Returns the activated story id.
    pub fn activate(&mut self, timeline: Timeline, now: DateTime<Utc>) -> Option<String> {
        if self.cooldown(timeline) > 0 || self.active(timeline).is_some() {
            return None;
        }
        let pool = self.pools.get_mut(&timeline)?;
        if pool.is_empty() {
            return None;
        }
        let mut story = pool.remove(0);
        story.status = StoryStatus::Active;
        let id = story.id.clone();
        let active = ActiveStory::new(story, timeline, now);
        self.active.insert(timeline, Some(active));
        info!(story = id, %timeline, "story activated");
        Some(id)
    }

    /// Retire the active story as completed: archive a summary row, start
    /// the completion cooldown, clear the slot. Returns the retired wrapper
    /// (with its final engagement) for the escalation engine.
    pub fn complete_active(
        &mut self,
        timeline: Timeline,
        policy: &SchedulerPolicy,
        now: DateTime<Utc>,
    ) -> Result<ActiveStory> {
        let mut active = self
            .active
            .get_mut(&timeline)
            .and_then(Option::take)
            .ok_or_else(|| {
                DeadAirError::InvariantViolation(format!("no active story on {timeline}"))
            })?;
        active.engagement = (active.engagement + COMPLETION_ENGAGEMENT_BONUS).clamp(0.0, 1.0);
        active.story.status = StoryStatus::Completed;
        self.archive.completed.push(archive_row(&active, now));
        self.cooldowns
            .insert(timeline, policy.timeline(timeline).completion_cooldown);
        info!(
            story = active.story_id(),
            %timeline,
            broadcasts = active.total_broadcasts,
            engagement = active.engagement,
            "story completed"
        );
        Ok(active)
    }

    /// Retire the active story as abandoned. Same shape as completion, but
    /// the engagement is recorded as-is and no cooldown applies.
    pub fn abandon_active(
        &mut self,
        timeline: Timeline,
        now: DateTime<Utc>,
    ) -> Result<ActiveStory> {
        let mut active = self
            .active
            .get_mut(&timeline)
            .and_then(Option::take)
            .ok_or_else(|| {
                DeadAirError::InvariantViolation(format!("no active story on {timeline}"))
            })?;
        active.story.status = StoryStatus::Abandoned;
        self.archive.abandoned.push(archive_row(&active, now));
        info!(
            story = active.story_id(),
            %timeline,
            broadcasts = active.total_broadcasts,
            "story abandoned"
        );
        Ok(active)
    }

    /// Append to the escalation log. Escalations only ever move up.
    pub fn record_escalation(
        &mut self,
        from: Timeline,
        to: Timeline,
        story_id: &str,
        ts: DateTime<Utc>,
    ) -> Result<()> {
        if from >= to {
            return Err(DeadAirError::InvariantViolation(format!(
                "escalation must move up a cadence: {from} -> {to}"
            )));
        }
        self.escalation_log.push(EscalationRecord {
            from,
            to,
            story_id: story_id.to_string(),
            ts,
        });
        Ok(())
    }

    /// Drop a pooled story outright (e.g. the DJ can no longer narrate it).
    pub fn remove_from_pool(&mut self, timeline: Timeline, story_id: &str) -> Option<Story> {
        let pool = self.pools.get_mut(&timeline)?;
        let idx = pool.iter().position(|s| s.id == story_id)?;
        Some(pool.remove(idx))
    }

    pub fn decrement_cooldown(&mut self, timeline: Timeline) {
        if let Some(c) = self.cooldowns.get_mut(&timeline) {
            *c = c.saturating_sub(1);
        }
    }
}

fn archive_row(active: &ActiveStory, now: DateTime<Utc>) -> ArchivedStory {
    ArchivedStory {
        id: active.story.id.clone(),
        title: active.story.title.clone(),
        timeline: active.timeline,
        total_broadcasts: active.total_broadcasts,
        engagement: active.engagement,
        themes: active.story.themes.clone(),
        entities: active.story.entities(),
        archived_at: now,
    }
}
