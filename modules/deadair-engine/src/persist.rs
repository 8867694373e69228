//! Snapshot persistence: versioned JSON, written temp-file-then-rename so a
//! failed tick never clobbers the last good state.

use std::path::Path;

use tracing::{debug, warn};

use deadair_common::error::{DeadAirError, Result};

use crate::state::{StoryState, SCHEMA_VERSION};

/// Serialize the state to pretty JSON and atomically replace `path`.
pub fn save_snapshot(state: &StoryState, path: &Path) -> Result<()> {
    let json = serde_json::to_vec_pretty(state)?;
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let mut tmp = match dir {
        Some(dir) => tempfile::NamedTempFile::new_in(dir)?,
        None => tempfile::NamedTempFile::new_in(".")?,
    };
    std::io::Write::write_all(&mut tmp, &json)?;
    tmp.persist(path).map_err(|e| DeadAirError::Io(e.error))?;
    debug!(path = %path.display(), bytes = json.len(), "snapshot written");
    Ok(())
}

/// Load and verify a snapshot. An unknown `schema_version` is fatal.
pub fn load_snapshot(path: &Path) -> Result<StoryState> {
    let bytes = std::fs::read(path)?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)?;
    let found = value
        .get("schema_version")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;
    if found != SCHEMA_VERSION {
        warn!(found, expected = SCHEMA_VERSION, "snapshot schema mismatch");
        return Err(DeadAirError::SchemaIncompatible {
            found,
            expected: SCHEMA_VERSION,
        });
    }
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use deadair_common::config::SchedulerPolicy;
    use deadair_common::types::{Story, StoryAct};
    use deadair_world::types::{
        ActType, ContentType, EmotionalTone, KnowledgeTier, StoryStatus, Timeline,
    };
    use std::collections::BTreeSet;

    fn story(id: &str) -> Story {
        Story {
            id: id.to_string(),
            title: "Persisted".to_string(),
            content_type: ContentType::Event,
            timeline: Timeline::Daily,
            status: StoryStatus::Dormant,
            era: Some("reclamation".to_string()),
            year_min: Some(2102),
            year_max: Some(2102),
            region: Some("Appalachia".to_string()),
            factions: ["Responders".to_string()].into_iter().collect(),
            locations: BTreeSet::new(),
            characters: BTreeSet::new(),
            themes: BTreeSet::new(),
            knowledge_tier: KnowledgeTier::Common,
            compatible_djs: ["dj-julie".to_string()].into_iter().collect(),
            acts: vec![StoryAct {
                number: 1,
                act_type: ActType::Setup,
                title: "Act".to_string(),
                summary: "Summary".to_string(),
                conflict: 0.3,
                tone: EmotionalTone::Hopeful,
                year: Some(2102),
                source_chunks: vec!["c1".to_string()],
                themes: BTreeSet::new(),
                entities: BTreeSet::new(),
                broadcast_count: 2,
                first_broadcast: Some(Utc.with_ymd_and_hms(2287, 10, 23, 9, 0, 0).unwrap()),
                last_broadcast: Some(Utc.with_ymd_and_hms(2287, 10, 23, 12, 0, 0).unwrap()),
            }],
            narrative_weight: 4.0,
            source_chunks: vec!["c1".to_string()],
            escalated_from: None,
            plausible: true,
        }
    }

    fn populated_state() -> StoryState {
        let policy = SchedulerPolicy::default();
        let mut state = StoryState::new();
        state
            .add_to_pool(Timeline::Daily, story("s1"), &policy)
            .unwrap();
        state
            .add_to_pool(Timeline::Daily, story("s2"), &policy)
            .unwrap();
        let now = Utc.with_ymd_and_hms(2287, 10, 23, 9, 0, 0).unwrap();
        state.activate(Timeline::Daily, now);
        state.global_broadcast_counter = 17;
        state
            .record_escalation(Timeline::Daily, Timeline::Weekly, "s0", now)
            .unwrap();
        state
    }

    #[test]
    fn snapshot_round_trips_losslessly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let state = populated_state();

        save_snapshot(&state, &path).unwrap();
        let restored = load_snapshot(&path).unwrap();
        assert_eq!(state, restored);
    }

    #[test]
    fn snapshot_uses_iso_timestamps_and_string_tags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        save_snapshot(&populated_state(), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"daily\""));
        assert!(text.contains("2287-10-23T09:00:00Z"));
        assert!(text.contains("\"schema_version\": 1"));
    }

    #[test]
    fn unknown_schema_version_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut state = populated_state();
        state.schema_version = 99;
        // Write raw, bypassing the saver's own version.
        std::fs::write(&path, serde_json::to_vec(&state).unwrap()).unwrap();

        let err = load_snapshot(&path).unwrap_err();
        assert!(matches!(
            err,
            DeadAirError::SchemaIncompatible {
                found: 99,
                expected: SCHEMA_VERSION
            }
        ));
    }

    #[test]
    fn save_replaces_existing_file_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let first = StoryState::new();
        save_snapshot(&first, &path).unwrap();
        let second = populated_state();
        save_snapshot(&second, &path).unwrap();
        assert_eq!(load_snapshot(&path).unwrap(), second);
    }
}
