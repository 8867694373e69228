use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use deadair_world::types::{
    ActType, ComplexityTier, ContentType, EmotionalTone, Framing, KnowledgeTier, StoryStatus,
    Timeline,
};

// --- Re-exports from deadair-world ---
pub use deadair_world::canon::{CanonTables, EraBounds, FactionLifespan, FactionRelation};
pub use deadair_world::dj::DjProfile;

/// Maximum acts a story may carry. Extraction collapses beyond this.
pub const MAX_ACTS: usize = 7;

// --- Knowledge base chunks ---

/// Closed metadata record for a lore chunk. The filter language addresses
/// only these fields; anything else the knowledge base carries rides in
/// `extra` and is invisible to filtering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub content_type: Option<String>,
    pub infobox_type: Option<String>,
    pub year: Option<i32>,
    pub region: Option<String>,
    pub faction: Option<String>,
    pub era: Option<String>,
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

/// One retrieved lore chunk from the vector knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub wiki_title: String,
    pub section: String,
    pub meta: ChunkMeta,
}

// --- Story model ---

/// One narrative beat of a story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryAct {
    /// 1-based, strictly increasing, contiguous.
    pub number: u32,
    pub act_type: ActType,
    pub title: String,
    pub summary: String,
    /// 0.0 (calm) to 1.0 (open battle).
    pub conflict: f64,
    pub tone: EmotionalTone,
    /// In-universe year this act references, when its source chunks carry one.
    pub year: Option<i32>,
    #[serde(default)]
    pub source_chunks: Vec<String>,
    #[serde(default)]
    pub themes: BTreeSet<String>,
    #[serde(default)]
    pub entities: BTreeSet<String>,
    #[serde(default)]
    pub broadcast_count: u32,
    #[serde(default)]
    pub first_broadcast: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_broadcast: Option<DateTime<Utc>>,
}

/// A complete multi-act narrative mined from the knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: String,
    pub title: String,
    pub content_type: ContentType,
    pub timeline: Timeline,
    pub status: StoryStatus,
    pub era: Option<String>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub region: Option<String>,
    #[serde(default)]
    pub factions: BTreeSet<String>,
    #[serde(default)]
    pub locations: BTreeSet<String>,
    #[serde(default)]
    pub characters: BTreeSet<String>,
    #[serde(default)]
    pub themes: BTreeSet<String>,
    pub knowledge_tier: KnowledgeTier,
    /// DJ ids allowed to tell this story. Must be non-empty before pooling.
    #[serde(default)]
    pub compatible_djs: BTreeSet<String>,
    pub acts: Vec<StoryAct>,
    /// 1.0–10.0 featured-worthiness.
    pub narrative_weight: f64,
    /// Chunk ids this story was synthesized from.
    #[serde(default)]
    pub source_chunks: Vec<String>,
    /// Lineage pointer when this story was produced by escalation.
    #[serde(default)]
    pub escalated_from: Option<String>,
    /// Whether a DJ living before these events could credibly pass them on
    /// as rumor. Hard-dated canon events are not plausible before they occur.
    #[serde(default = "default_true")]
    pub plausible: bool,
}

fn default_true() -> bool {
    true
}

impl Story {
    pub fn act(&self, number: u32) -> Option<&StoryAct> {
        self.acts.iter().find(|a| a.number == number)
    }

    pub fn act_mut(&mut self, number: u32) -> Option<&mut StoryAct> {
        self.acts.iter_mut().find(|a| a.number == number)
    }

    pub fn mean_conflict(&self) -> f64 {
        if self.acts.is_empty() {
            return 0.0;
        }
        self.acts.iter().map(|a| a.conflict).sum::<f64>() / self.acts.len() as f64
    }

    /// All named participants: factions, locations, characters.
    pub fn entities(&self) -> BTreeSet<String> {
        self.factions
            .iter()
            .chain(self.locations.iter())
            .chain(self.characters.iter())
            .cloned()
            .collect()
    }

    /// The entity most worth tracking for repetition: first faction, else
    /// first character, else first location, else the story title.
    pub fn primary_entity(&self) -> String {
        self.factions
            .iter()
            .next()
            .or_else(|| self.characters.iter().next())
            .or_else(|| self.locations.iter().next())
            .cloned()
            .unwrap_or_else(|| self.title.clone())
    }
}

// --- Runtime wrapper ---

/// One escalation hop in an active story's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationHop {
    pub from: Timeline,
    pub to: Timeline,
    pub ts: DateTime<Utc>,
}

/// Runtime wrapper while a story occupies a timeline slot. Owns the story;
/// a story is never simultaneously pooled, active, and archived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveStory {
    pub story: Story,
    pub timeline: Timeline,
    /// 1-based index into the story's acts.
    pub current_act: u32,
    /// current_act / total acts, in [0.0, 1.0].
    pub progression: f64,
    pub broadcasts_in_act: u32,
    pub total_broadcasts: u32,
    /// Simulated engagement in [0.0, 1.0]; read only by escalation.
    pub engagement: f64,
    #[serde(default)]
    pub escalations: Vec<EscalationHop>,
    pub activated_at: DateTime<Utc>,
}

impl ActiveStory {
    pub fn new(story: Story, timeline: Timeline, now: DateTime<Utc>) -> Self {
        Self {
            story,
            timeline,
            current_act: 1,
            progression: 0.0,
            broadcasts_in_act: 0,
            total_broadcasts: 0,
            engagement: 0.5,
            escalations: Vec::new(),
            activated_at: now,
        }
    }

    pub fn story_id(&self) -> &str {
        &self.story.id
    }

    pub fn total_acts(&self) -> u32 {
        self.story.acts.len() as u32
    }

    pub fn current_act_ref(&self) -> Option<&StoryAct> {
        self.story.act(self.current_act)
    }

    pub fn on_last_act(&self) -> bool {
        self.current_act >= self.total_acts()
    }

    /// True once the story has reached a resolution-type act.
    pub fn reached_resolution(&self) -> bool {
        self.story
            .acts
            .iter()
            .any(|a| a.act_type == ActType::Resolution && a.number <= self.current_act)
    }
}

// --- Emitted beats ---

/// The per-broadcast contribution of one active story. Consumed by the
/// external script generator; everything here is plain text and tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StoryBeat {
    pub story_id: String,
    pub act_number: u32,
    pub act_type: ActType,
    pub title: String,
    pub summary: String,
    pub entities: BTreeSet<String>,
    pub themes: BTreeSet<String>,
    pub tone: EmotionalTone,
    pub intro_hint: String,
    pub outro_hint: String,
    pub framing: Framing,
    pub timeline: Timeline,
    /// Ordinal position within the broadcast, 0-based.
    pub position: u32,
}

// --- Rotation exclusions ---

/// What the freshness layer tells the extractor to avoid this pass:
/// recently used chunks, windowed subjects, over-represented tones, and the
/// complexity tier the rotation sequencer is not currently serving.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Exclusions {
    pub chunk_ids: BTreeSet<String>,
    pub subjects: BTreeSet<String>,
    pub tones: BTreeSet<EmotionalTone>,
    /// When set, only stories of this complexity tier pass.
    pub complexity: Option<ComplexityTier>,
}

// --- Archive & escalation records ---

/// Summary row kept after a story leaves its slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedStory {
    pub id: String,
    pub title: String,
    pub timeline: Timeline,
    pub total_broadcasts: u32,
    pub engagement: f64,
    /// Subjects retained for weaver callbacks.
    #[serde(default)]
    pub themes: BTreeSet<String>,
    #[serde(default)]
    pub entities: BTreeSet<String>,
    pub archived_at: DateTime<Utc>,
}

/// Append-only escalation log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub from: Timeline,
    pub to: Timeline,
    pub story_id: String,
    pub ts: DateTime<Utc>,
}
