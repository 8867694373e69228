//! World facts for the dead-air story core: shared enums, canon tables,
//! and DJ knowledge profiles. No I/O lives here.

pub mod canon;
pub mod dj;
pub mod types;

pub use canon::{CanonTables, EraBounds, FactionLifespan, FactionRelation};
pub use dj::DjProfile;
pub use types::{
    ActType, ComplexityTier, ContentType, EmotionalTone, Framing, KnowledgeTier, StoryStatus,
    Timeline,
};
