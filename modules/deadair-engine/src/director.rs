//! The per-tick orchestrator. One broadcast tick is atomic: slots run in
//! fixed order, the weaver composes, the counter bumps exactly once, and
//! the snapshot lands before the packet is returned.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::warn;

use deadair_common::config::EscalationPolicy;
use deadair_common::error::Result;
use deadair_common::types::{ActiveStory, DjProfile, Exclusions, Story, StoryBeat};
use deadair_extract::dj::{narration_decision, NarrationDecision};
use deadair_world::canon::CanonTables;
use deadair_world::types::{Framing, Timeline};

use crate::audit::{AuditEvent, AuditSink, NullAudit};
use crate::escalation::maybe_escalate;
use crate::freshness::FreshnessTracker;
use crate::persist::save_snapshot;
use crate::scheduler::{BeatDraft, Scheduler, SlotEvent};
use crate::state::StoryState;
use crate::weaver::{compose, intro_hint, outro_hint, BeatPacket};

/// Per-tick input from the surrounding engine: the broadcast clock and the
/// external emergency flag.
#[derive(Debug, Clone, Copy)]
pub struct TickInput {
    pub now: DateTime<Utc>,
    pub emergency_preempt: bool,
}

pub struct Director<A: AuditSink = NullAudit> {
    state: StoryState,
    scheduler: Scheduler,
    freshness: FreshnessTracker,
    escalation: EscalationPolicy,
    canon: CanonTables,
    dj: DjProfile,
    snapshot_path: Option<PathBuf>,
    audit: A,
}

impl Director<NullAudit> {
    pub fn new(
        dj: DjProfile,
        canon: CanonTables,
        scheduler: Scheduler,
        freshness: FreshnessTracker,
        escalation: EscalationPolicy,
    ) -> Self {
        Self {
            state: StoryState::new(),
            scheduler,
            freshness,
            escalation,
            canon,
            dj,
            snapshot_path: None,
            audit: NullAudit,
        }
    }
}

impl<A: AuditSink> Director<A> {
    /// Resume from a restored snapshot.
    pub fn with_state(mut self, state: StoryState) -> Self {
        self.state = state;
        self
    }

    pub fn with_snapshot_path(mut self, path: PathBuf) -> Self {
        self.snapshot_path = Some(path);
        self
    }

    pub fn with_audit<B: AuditSink>(self, audit: B) -> Director<B> {
        Director {
            state: self.state,
            scheduler: self.scheduler,
            freshness: self.freshness,
            escalation: self.escalation,
            canon: self.canon,
            dj: self.dj,
            snapshot_path: self.snapshot_path,
            audit,
        }
    }

    pub fn state(&self) -> &StoryState {
        &self.state
    }

    /// Mutable access for admin tooling and test setup. The director stays
    /// the single writer; callers must not hold this across ticks.
    pub fn state_mut(&mut self) -> &mut StoryState {
        &mut self.state
    }

    pub fn audit(&self) -> &A {
        &self.audit
    }

    pub fn dj(&self) -> &DjProfile {
        &self.dj
    }

    /// Pool a validated story (pre-ranked insertion; ranking happens again
    /// each tick against live freshness).
    pub fn add_story(&mut self, timeline: Timeline, story: Story) -> Result<()> {
        self.state
            .add_to_pool(timeline, story, self.scheduler.policy())
    }

    /// What the extractor should avoid on its next pass for this DJ.
    pub fn exclusions(&self, now: DateTime<Utc>) -> Exclusions {
        self.freshness.exclusions(now)
    }

    /// Admin entry point: resolve a timeline's active story immediately.
    pub fn force_complete(&mut self, timeline: Timeline, now: DateTime<Utc>) -> Result<String> {
        let tick = self.state.global_broadcast_counter;
        let retired = self
            .scheduler
            .force_complete(&mut self.state, timeline, now)?;
        self.audit.record(AuditEvent::Completed {
            timeline,
            story_id: retired.story_id().to_string(),
            total_broadcasts: retired.total_broadcasts,
            engagement: retired.engagement,
            tick,
        });
        self.run_escalation(&retired, now, tick)?;
        Ok(retired.story.id)
    }

    /// Run one broadcast tick and hand back the composed packet.
    pub fn tick(&mut self, input: TickInput) -> Result<BeatPacket> {
        let tick = self.state.global_broadcast_counter;
        let now = input.now;
        let mut beats: Vec<StoryBeat> = Vec::new();

        for timeline in Timeline::ALL {
            // Re-rank against live freshness so the head is always the
            // heaviest, freshest candidate.
            let freshness = &self.freshness;
            self.state.rank_pool(timeline, |story| {
                freshness.score(
                    &story.id,
                    &story_subjects(story),
                    &story.content_type.to_string(),
                    now,
                )
            });

            let decision = self.vet_slot(timeline, now, tick)?;
            let (multiplier, novelty) = self.slot_freshness(timeline, now);

            let report = self.scheduler.process_slot(
                &mut self.state,
                timeline,
                now,
                multiplier,
                novelty,
                input.emergency_preempt,
            )?;

            for event in report.events {
                self.handle_event(timeline, event, now, tick)?;
            }

            if let Some(draft) = report.beat {
                if let Some(decision) = decision {
                    // Record rotation state slot by slot; later slots see
                    // earlier slots' updates within the same tick.
                    let mut subjects = draft.themes.clone();
                    subjects.extend(draft.entities.iter().cloned());
                    self.freshness.record_use(
                        &draft.story_id,
                        &subjects,
                        &draft.content_type.to_string(),
                        draft.tone,
                        now,
                    );
                    // Spend the story's source chunks too, so the next
                    // extraction pass cannot regroup the same material.
                    for chunk_id in &draft.source_chunks {
                        self.freshness.record_chunk_use(chunk_id, now);
                    }
                    beats.push(finish_beat(draft, decision, beats.len() as u32));
                }
            }
        }

        // Entity mentions count per broadcast, not per beat.
        let mut broadcast_entities = BTreeSet::new();
        for beat in &beats {
            broadcast_entities.extend(beat.entities.iter().cloned());
        }
        self.freshness.note_broadcast(broadcast_entities);

        let packet = compose(
            beats,
            &self.state.archive.completed,
            input.emergency_preempt,
        );

        self.state.global_broadcast_counter += 1;

        if let Some(path) = self.snapshot_path.clone() {
            save_snapshot(&self.state, &path)?;
            self.audit.record(AuditEvent::SnapshotWritten { tick });
        }

        Ok(packet)
    }

    /// Make sure whatever would air on this slot is narratable by our DJ.
    /// Unnarratable actives are abandoned; unnarratable pool heads dropped.
    /// Returns the narration decision for the story that will air, if any.
    fn vet_slot(
        &mut self,
        timeline: Timeline,
        now: DateTime<Utc>,
        tick: u64,
    ) -> Result<Option<NarrationDecision>> {
        if let Some(active) = self.state.active(timeline) {
            return match narration_decision(&active.story, &self.dj) {
                Ok(decision) => Ok(Some(decision)),
                Err(rejection) => {
                    warn!(
                        story = active.story_id(),
                        dj = self.dj.id,
                        %rejection,
                        "active story no longer narratable, abandoning"
                    );
                    let retired = self.state.abandon_active(timeline, now)?;
                    self.audit.record(AuditEvent::Abandoned {
                        timeline,
                        story_id: retired.story.id,
                        total_broadcasts: retired.total_broadcasts,
                        tick,
                    });
                    Ok(None)
                }
            };
        }

        if self.state.cooldown(timeline) > 0 {
            return Ok(None);
        }

        // The pool head is about to be activated; drop heads the DJ cannot
        // voice until one sticks.
        loop {
            let head = match self.state.pool(timeline).first() {
                Some(head) => head,
                None => return Ok(None),
            };
            match narration_decision(head, &self.dj) {
                Ok(decision) => return Ok(Some(decision)),
                Err(rejection) => {
                    let id = head.id.clone();
                    warn!(story = id, dj = self.dj.id, %rejection, "dropping unnarratable story");
                    self.state.remove_from_pool(timeline, &id);
                }
            }
        }
    }

    /// Freshness multiplier and engagement novelty for the story occupying
    /// (or about to occupy) the slot.
    fn slot_freshness(&self, timeline: Timeline, now: DateTime<Utc>) -> (f64, f64) {
        let story = self
            .state
            .active(timeline)
            .map(|a| &a.story)
            .or_else(|| self.state.pool(timeline).first());
        match story {
            Some(story) => {
                let score = self.freshness.score(
                    &story.id,
                    &story_subjects(story),
                    &story.content_type.to_string(),
                    now,
                );
                let novelty = self.freshness.novelty(&story.primary_entity());
                (self.freshness.multiplier(score), novelty)
            }
            None => (1.0, 1.0),
        }
    }

    fn handle_event(
        &mut self,
        timeline: Timeline,
        event: SlotEvent,
        now: DateTime<Utc>,
        tick: u64,
    ) -> Result<()> {
        match event {
            SlotEvent::Activated { story_id } => {
                self.audit.record(AuditEvent::Activated {
                    timeline,
                    story_id,
                    tick,
                });
            }
            SlotEvent::BeatEmitted { story_id, act } => {
                self.audit.record(AuditEvent::BeatEmitted {
                    timeline,
                    story_id,
                    act,
                    tick,
                });
            }
            SlotEvent::ActAdvanced { story_id, act } => {
                self.audit.record(AuditEvent::ActAdvanced {
                    timeline,
                    story_id,
                    act,
                    tick,
                });
            }
            SlotEvent::Completed { retired } => {
                self.audit.record(AuditEvent::Completed {
                    timeline,
                    story_id: retired.story_id().to_string(),
                    total_broadcasts: retired.total_broadcasts,
                    engagement: retired.engagement,
                    tick,
                });
                self.run_escalation(&retired, now, tick)?;
            }
            SlotEvent::Abandoned { retired } => {
                self.audit.record(AuditEvent::Abandoned {
                    timeline,
                    story_id: retired.story_id().to_string(),
                    total_broadcasts: retired.total_broadcasts,
                    tick,
                });
            }
        }
        Ok(())
    }

    fn run_escalation(
        &mut self,
        retired: &ActiveStory,
        now: DateTime<Utc>,
        tick: u64,
    ) -> Result<()> {
        if let Some(follow_up_id) = maybe_escalate(
            retired,
            &self.escalation,
            self.scheduler.policy(),
            &self.canon,
            &mut self.state,
            now,
        )? {
            if let Some(to) = retired.timeline.escalated() {
                self.audit.record(AuditEvent::Escalated {
                    from: retired.timeline,
                    to,
                    story_id: retired.story.id.clone(),
                    follow_up_id,
                    tick,
                });
            }
        }
        Ok(())
    }
}

fn story_subjects(story: &Story) -> BTreeSet<String> {
    let mut subjects = story.themes.clone();
    subjects.extend(story.entities());
    subjects
}

fn finish_beat(draft: BeatDraft, decision: NarrationDecision, position: u32) -> StoryBeat {
    let intro = if decision.rumor_overlay && decision.framing != Framing::Rumor {
        format!(
            "Mind you, this one reached me secondhand. {}",
            intro_hint(draft.act_type)
        )
    } else {
        intro_hint(draft.act_type).to_string()
    };
    StoryBeat {
        story_id: draft.story_id,
        act_number: draft.act_number,
        act_type: draft.act_type,
        title: draft.title,
        summary: draft.summary,
        entities: draft.entities,
        themes: draft.themes,
        tone: draft.tone,
        intro_hint: intro,
        outro_hint: outro_hint(draft.act_type).to_string(),
        framing: decision.framing,
        timeline: draft.timeline,
        position,
    }
}
