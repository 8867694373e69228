//! End-to-end ticks through the director: determinism, ordering, framing,
//! demotion, escalation, and snapshot round-trips.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeZone, Utc};

use deadair_common::config::{EscalationPolicy, FreshnessPolicy, SchedulerPolicy};
use deadair_common::types::{CanonTables, Chunk, ChunkMeta, DjProfile, Exclusions, Story, StoryAct};
use deadair_engine::{
    load_snapshot, save_snapshot, AuditEvent, Director, FreshnessTracker, MemoryAudit, Scheduler,
    TickInput,
};
use deadair_extract::{
    gate_timeline, narrative_weight, GateOutcome, LoreValidator, MemoryVectorStore, StoryExtractor,
};
use deadair_world::types::{
    ActType, ContentType, EmotionalTone, Framing, KnowledgeTier, StoryStatus, Timeline,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2102, 6, 1, 9, 0, 0).unwrap()
}

fn julie() -> DjProfile {
    DjProfile {
        id: "dj-julie".to_string(),
        name: "Julie".to_string(),
        era: "reclamation".to_string(),
        year: 2102,
        region: "Appalachia".to_string(),
        known_factions: ["Responders".to_string(), "Free States".to_string()]
            .into_iter()
            .collect(),
        unknown_factions: ["Institute".to_string(), "NCR".to_string()]
            .into_iter()
            .collect(),
        knowledge_ceiling: KnowledgeTier::Restricted,
    }
}

fn act(number: u32, act_type: ActType, title: &str, summary: &str, conflict: f64) -> StoryAct {
    StoryAct {
        number,
        act_type,
        title: title.to_string(),
        summary: summary.to_string(),
        conflict,
        tone: EmotionalTone::Neutral,
        year: None,
        source_chunks: vec![],
        themes: BTreeSet::new(),
        entities: BTreeSet::new(),
        broadcast_count: 0,
        first_broadcast: None,
        last_broadcast: None,
    }
}

fn story(id: &str, weight: f64, acts: Vec<StoryAct>) -> Story {
    Story {
        id: id.to_string(),
        title: format!("Story {id}"),
        content_type: ContentType::Quest,
        timeline: Timeline::Daily,
        status: StoryStatus::Dormant,
        era: Some("reclamation".to_string()),
        year_min: Some(2098),
        year_max: Some(2101),
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

fn three_act_story(id: &str, weight: f64) -> Story {
    story(
        id,
        weight,
        vec![
            act(1, ActType::Setup, "It begins", "Trouble starts", 0.2),
            act(2, ActType::Climax, "It peaks", "Trouble peaks", 0.8),
            act(3, ActType::Resolution, "It ends", "Trouble ends", 0.2),
        ],
    )
}

fn director_with_seed(seed: u64) -> Director {
    Director::new(
        julie(),
        CanonTables::default(),
        Scheduler::new(SchedulerPolicy::default(), seed),
        FreshnessTracker::new(FreshnessPolicy::default()),
        EscalationPolicy::default(),
    )
}

/// A policy where every eligible slot emits every tick, for ordering tests.
fn always_emit_policy() -> SchedulerPolicy {
    let mut policy = SchedulerPolicy::default();
    for tp in [
        &mut policy.daily,
        &mut policy.weekly,
        &mut policy.monthly,
        &mut policy.yearly,
    ] {
        tp.inclusion_p = 1.0;
        tp.min_gap = 0;
    }
    policy
}

// --- Scenario: lore rejection ---

#[test]
fn cooperating_enemies_never_enter_a_pool() {
    let canon = CanonTables::default();
    let mut candidate = story(
        "bad",
        6.0,
        vec![act(
            1,
            ActType::Setup,
            "An unlikely alliance",
            "NCR and Legion troops worked together at the dam",
            0.2,
        )],
    );
    candidate.factions = ["NCR".to_string(), "Caesar's Legion".to_string()]
        .into_iter()
        .collect();
    candidate.year_min = Some(2281);
    candidate.year_max = Some(2281);

    let rejections = LoreValidator::new(&canon).check(&candidate);
    assert_eq!(rejections.len(), 1);
    assert_eq!(rejections[0].kind(), "canon_conflict");

    // The candidate is dropped before pooling; archives stay untouched.
    let director = director_with_seed(1);
    assert!(director.state().pool(Timeline::Daily).is_empty());
    assert!(director.state().archive.completed.is_empty());
    assert!(director.state().archive.abandoned.is_empty());
}

// --- Scenario: fetch quest demotion ---

#[test]
fn weak_fetch_quest_demotes_from_weekly_to_daily() {
    let canon = CanonTables::default();
    let policy = SchedulerPolicy::default();
    let mut candidate = story(
        "fetch",
        0.0,
        vec![
            act(1, ActType::Setup, "Collect scrap", "Collect ten pieces of scrap", 0.1),
            act(2, ActType::Setup, "Collect more", "Haul the scrap back", 0.1),
        ],
    );
    candidate.factions.clear();
    candidate.themes.clear();
    let weight = narrative_weight(&candidate, &canon);
    assert!((2.0..3.5).contains(&weight), "fetch weight: {weight}");

    // Assigned weekly upstream, the gate rejects (floor 5.0) and demotes.
    assert_eq!(
        gate_timeline(Timeline::Weekly, weight, &policy),
        GateOutcome::Demoted(Timeline::Daily)
    );

    let mut director = director_with_seed(1);
    let mut pooled = candidate;
    pooled.narrative_weight = weight;
    director.add_story(Timeline::Daily, pooled).unwrap();
    assert_eq!(director.state().pool(Timeline::Daily).len(), 1);
    assert!(director.state().pool(Timeline::Weekly).is_empty());
}

// --- Scenario: DJ framing ---

#[test]
fn future_unknown_faction_story_airs_as_speculation_with_rumor_cast() {
    let mut director = Director::new(
        julie(),
        CanonTables::default(),
        Scheduler::new(always_emit_policy(), 5),
        FreshnessTracker::new(FreshnessPolicy::default()),
        EscalationPolicy::default(),
    );

    let mut commonwealth = three_act_story("inst-rumor", 3.0);
    commonwealth.region = Some("Commonwealth".to_string());
    commonwealth.factions = ["Institute".to_string()].into_iter().collect();
    commonwealth.year_min = Some(2287);
    commonwealth.year_max = Some(2287);
    director.add_story(Timeline::Daily, commonwealth).unwrap();

    let packet = director
        .tick(TickInput {
            now: t0(),
            emergency_preempt: false,
        })
        .unwrap();
    assert_eq!(packet.ordered_beats.len(), 1);
    let beat = &packet.ordered_beats[0];
    assert_eq!(beat.framing, Framing::Speculation);
    assert!(
        beat.intro_hint.contains("secondhand"),
        "rumor cast missing from intro: {}",
        beat.intro_hint
    );
}

#[test]
fn regional_ceiling_dj_suppresses_speculation_and_drops_the_story() {
    let mut dj = julie();
    dj.knowledge_ceiling = KnowledgeTier::Regional;
    let mut director = Director::new(
        dj,
        CanonTables::default(),
        Scheduler::new(always_emit_policy(), 5),
        FreshnessTracker::new(FreshnessPolicy::default()),
        EscalationPolicy::default(),
    );

    let mut commonwealth = three_act_story("inst-rumor", 3.0);
    commonwealth.region = Some("Commonwealth".to_string());
    commonwealth.factions = ["Institute".to_string()].into_iter().collect();
    commonwealth.year_min = Some(2287);
    commonwealth.year_max = Some(2287);
    director.add_story(Timeline::Daily, commonwealth).unwrap();

    let packet = director
        .tick(TickInput {
            now: t0(),
            emergency_preempt: false,
        })
        .unwrap();
    assert!(packet.ordered_beats.is_empty());
    assert!(
        director.state().pool(Timeline::Daily).is_empty(),
        "unnarratable story should be removed from the pool"
    );
}

// --- Scenario: scheduler determinism ---

#[test]
fn ten_ticks_with_seed_42_replay_identically() {
    init_tracing();
    let mut runs = Vec::new();
    for _ in 0..2 {
        let mut director = director_with_seed(42);
        director
            .add_story(Timeline::Daily, three_act_story("s1", 3.0))
            .unwrap();
        director
            .add_story(Timeline::Daily, three_act_story("s2", 2.0))
            .unwrap();
        director
            .add_story(Timeline::Weekly, three_act_story("w1", 6.0))
            .unwrap();

        let mut packets = Vec::new();
        for i in 0..10 {
            let now = t0() + chrono::Duration::hours(i);
            packets.push(
                director
                    .tick(TickInput {
                        now,
                        emergency_preempt: false,
                    })
                    .unwrap(),
            );
        }
        runs.push((packets, director.state().clone()));
    }
    assert_eq!(runs[0].0, runs[1].0, "packets diverged across replays");
    assert_eq!(runs[0].1, runs[1].1, "state diverged across replays");
}

// --- Scenario: escalation ---

#[test]
fn engaging_daily_completion_escalates_into_weekly() {
    let mut director = director_with_seed(9).with_audit(MemoryAudit::new());
    director
        .add_story(Timeline::Daily, three_act_story("s1", 3.0))
        .unwrap();
    director.state_mut().activate(Timeline::Daily, t0());
    {
        let active = director.state_mut().active_mut(Timeline::Daily).unwrap();
        active.engagement = 0.8;
        active.total_broadcasts = 3;
    }

    let completed_id = director.force_complete(Timeline::Daily, t0()).unwrap();
    assert_eq!(completed_id, "s1");

    let weekly = director.state().pool(Timeline::Weekly);
    assert_eq!(weekly.len(), 1, "follow-up should sit in the weekly pool");
    let follow_up = &weekly[0];
    assert_eq!(follow_up.escalated_from.as_deref(), Some("s1"));
    assert!((3..=4).contains(&follow_up.acts.len()));
    assert!(follow_up.narrative_weight >= 5.0);

    let log = &director.state().escalation_log;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].from, Timeline::Daily);
    assert_eq!(log[0].to, Timeline::Weekly);
    assert_eq!(log[0].story_id, "s1");

    assert!(director
        .audit()
        .events()
        .iter()
        .any(|e| matches!(e, AuditEvent::Escalated { .. })));
}

// --- Scenario: ordering ---

#[test]
fn four_eligible_slots_emit_in_cadence_order() {
    let mut director = Director::new(
        julie(),
        CanonTables::default(),
        Scheduler::new(always_emit_policy(), 3),
        FreshnessTracker::new(FreshnessPolicy::default()),
        EscalationPolicy::default(),
    );
    director
        .add_story(Timeline::Daily, three_act_story("d", 3.0))
        .unwrap();
    director
        .add_story(Timeline::Weekly, three_act_story("w", 6.0))
        .unwrap();
    director
        .add_story(Timeline::Monthly, three_act_story("m", 8.0))
        .unwrap();
    director
        .add_story(Timeline::Yearly, three_act_story("y", 9.5))
        .unwrap();

    let packet = director
        .tick(TickInput {
            now: t0(),
            emergency_preempt: false,
        })
        .unwrap();

    let order: Vec<Timeline> = packet.ordered_beats.iter().map(|b| b.timeline).collect();
    assert_eq!(
        order,
        vec![
            Timeline::Daily,
            Timeline::Weekly,
            Timeline::Monthly,
            Timeline::Yearly
        ]
    );
    let positions: Vec<u32> = packet.ordered_beats.iter().map(|b| b.position).collect();
    assert_eq!(positions, vec![0, 1, 2, 3]);
    assert_eq!(packet.transitions.len(), 3);
    assert_eq!(
        packet.transitions[0],
        deadair_engine::transition_phrase(Timeline::Daily, Timeline::Weekly)
    );
}

// --- Boundary: cooldown of exactly one ---

#[test]
fn cooldown_of_one_suppresses_exactly_one_activation() {
    let mut policy = always_emit_policy();
    policy.daily.completion_cooldown = 1;
    let mut director = Director::new(
        julie(),
        CanonTables::default(),
        Scheduler::new(policy, 11),
        FreshnessTracker::new(FreshnessPolicy::default()),
        EscalationPolicy::default(),
    );
    director
        .add_story(Timeline::Daily, three_act_story("s1", 3.0))
        .unwrap();
    director.state_mut().activate(Timeline::Daily, t0());
    director.force_complete(Timeline::Daily, t0()).unwrap();
    assert_eq!(director.state().cooldown(Timeline::Daily), 1);

    director
        .add_story(Timeline::Daily, three_act_story("s2", 3.0))
        .unwrap();

    // Next tick: still cooling, no activation.
    director
        .tick(TickInput {
            now: t0(),
            emergency_preempt: false,
        })
        .unwrap();
    assert!(director.state().active(Timeline::Daily).is_none());

    // The tick after: slot opens again.
    director
        .tick(TickInput {
            now: t0() + chrono::Duration::hours(1),
            emergency_preempt: false,
        })
        .unwrap();
    assert_eq!(
        director
            .state()
            .active(Timeline::Daily)
            .map(|a| a.story_id()),
        Some("s2")
    );
}

// --- Freshness closes the loop back to extraction ---

#[test]
fn aired_story_chunks_are_embargoed_for_the_next_extraction_pass() {
    let mut director = Director::new(
        julie(),
        CanonTables::default(),
        Scheduler::new(always_emit_policy(), 5),
        FreshnessTracker::new(FreshnessPolicy::default()),
        EscalationPolicy::default(),
    );
    let mut aired = three_act_story("aired", 3.0);
    aired.source_chunks = vec!["c1".to_string(), "c2".to_string()];
    director.add_story(Timeline::Daily, aired).unwrap();

    let packet = director
        .tick(TickInput {
            now: t0(),
            emergency_preempt: false,
        })
        .unwrap();
    assert_eq!(packet.ordered_beats.len(), 1);

    let exclusions = director.exclusions(t0() + chrono::Duration::hours(1));
    assert!(exclusions.chunk_ids.contains("c1"));
    assert!(exclusions.chunk_ids.contains("c2"));

    // Offer the same chunks back through the store: without the embargo
    // they form a story, with it they never reach grouping.
    let quarry_chunk = |id: &str, text: &str| Chunk {
        id: id.to_string(),
        text: text.to_string(),
        wiki_title: "Quarry Trouble".to_string(),
        section: String::new(),
        meta: ChunkMeta {
            content_type: Some("quest".to_string()),
            infobox_type: None,
            year: Some(2100),
            region: Some("Appalachia".to_string()),
            faction: None,
            era: Some("reclamation".to_string()),
            themes: vec![],
            extra: Default::default(),
        },
    };
    let mut store = MemoryVectorStore::default();
    store.push(quarry_chunk("c1", "Scouts arrived at the quarry"));
    store.push(quarry_chunk("c2", "Raiders attack the camp"));
    let canon = CanonTables::default();
    let policy = SchedulerPolicy::default();
    let extractor = StoryExtractor::new(&store, &canon, &policy);

    let (unfiltered, _) = extractor
        .extract_quests(director.dj(), 5, &Exclusions::default())
        .unwrap();
    assert_eq!(unfiltered.len(), 1, "control pass should build the story");

    let (filtered, _) = extractor
        .extract_quests(director.dj(), 5, &exclusions)
        .unwrap();
    assert!(
        filtered.is_empty(),
        "chunks aired this tick must not regroup next pass"
    );
}

// --- Emergency preempt ---

#[test]
fn emergency_tick_returns_flagged_empty_packet_but_counts() {
    let mut director = Director::new(
        julie(),
        CanonTables::default(),
        Scheduler::new(always_emit_policy(), 3),
        FreshnessTracker::new(FreshnessPolicy::default()),
        EscalationPolicy::default(),
    );
    director
        .add_story(Timeline::Daily, three_act_story("d", 3.0))
        .unwrap();

    let before = director.state().global_broadcast_counter;
    let packet = director
        .tick(TickInput {
            now: t0(),
            emergency_preempt: true,
        })
        .unwrap();
    assert!(packet.emergency_preempt);
    assert!(packet.ordered_beats.is_empty());
    assert_eq!(director.state().global_broadcast_counter, before + 1);
}

// --- Steady state: nothing to say ---

#[test]
fn empty_pools_emit_empty_packets_indefinitely() {
    let mut director = director_with_seed(4);
    for i in 0..25 {
        let packet = director
            .tick(TickInput {
                now: t0() + chrono::Duration::hours(i),
                emergency_preempt: false,
            })
            .unwrap();
        assert!(packet.ordered_beats.is_empty());
        assert!(!packet.emergency_preempt);
    }
    assert_eq!(director.state().global_broadcast_counter, 25);
}

// --- Snapshot round-trip through the director ---

#[test]
fn snapshot_written_each_tick_and_restores_bitwise() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let mut director = director_with_seed(21).with_snapshot_path(path.clone());
    director
        .add_story(Timeline::Daily, three_act_story("s1", 3.0))
        .unwrap();

    for i in 0..5 {
        director
            .tick(TickInput {
                now: t0() + chrono::Duration::hours(i),
                emergency_preempt: false,
            })
            .unwrap();
    }

    let restored = load_snapshot(&path).unwrap();
    assert_eq!(&restored, director.state());

    // And a manual save of the restored state is identical again.
    let path2 = dir.path().join("state2.json");
    save_snapshot(&restored, &path2).unwrap();
    assert_eq!(load_snapshot(&path2).unwrap(), restored);
}
