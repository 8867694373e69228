//! Mining side of the story core: query the lore knowledge base, cluster
//! chunks into multi-act stories, and validate them against canon and the
//! DJ's knowledge boundary before they reach any pool.

pub mod acts;
pub mod dj;
pub mod extractor;
pub mod lore;
pub mod store;
pub mod weight;

pub use acts::{build_acts, classify, derive_tone, dominant_tone};
pub use dj::{narration_decision, NarrationDecision};
pub use extractor::{
    assign_timeline, gate_timeline, ExtractionStats, GateOutcome, StoryExtractor,
};
pub use lore::LoreValidator;
pub use store::{ChunkFilter, MemoryVectorStore, StoreError, VectorStore};
pub use weight::narrative_weight;
