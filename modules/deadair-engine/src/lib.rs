//! Runtime side of the dead-air story core: the four-slot scheduler, story
//! state and snapshots, freshness rotation, escalation, and the weaver
//! that hands one packet per broadcast to the script generator.

pub mod audit;
pub mod director;
pub mod escalation;
pub mod freshness;
pub mod persist;
pub mod scheduler;
pub mod state;
pub mod weaver;

#[cfg(test)]
pub(crate) mod testutil;

pub use audit::{AuditEvent, AuditSink, MemoryAudit, NullAudit};
pub use director::{Director, TickInput};
pub use escalation::maybe_escalate;
pub use freshness::FreshnessTracker;
pub use persist::{load_snapshot, save_snapshot};
pub use scheduler::{BeatDraft, Scheduler, SlotEvent, SlotReport};
pub use state::{Archive, StoryState, SCHEMA_VERSION};
pub use weaver::{compose, intro_hint, outro_hint, transition_phrase, BeatPacket, Callback};
