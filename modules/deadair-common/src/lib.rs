//! Shared data model for the dead-air story core: stories, acts, beats,
//! chunks, policy tables, and the error taxonomy.

pub mod config;
pub mod error;
pub mod types;
pub mod validate;

pub use config::{
    EscalationPolicy, EscalationRule, FreshnessPolicy, SchedulerPolicy, TimelinePolicy,
};
pub use error::{DeadAirError, Rejection, Result};
pub use types::{
    ActiveStory, ArchivedStory, CanonTables, Chunk, ChunkMeta, DjProfile, EraBounds,
    EscalationHop, EscalationRecord, Exclusions, FactionLifespan, FactionRelation, Story,
    StoryAct, StoryBeat, MAX_ACTS,
};
pub use validate::structure_errors;

// Re-export the world enums so downstream crates import one place.
pub use deadair_world::types::{
    ActType, ComplexityTier, ContentType, EmotionalTone, Framing, KnowledgeTier, StoryStatus,
    Timeline,
};
