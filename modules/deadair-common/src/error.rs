use serde::{Deserialize, Serialize};
use thiserror::Error;

use deadair_world::types::{KnowledgeTier, Timeline};

/// Surfaced failures. Everything candidate-level is a [`Rejection`] value
/// instead; an `Err` from this crate family means the tick or the state is in
/// trouble, not that one story was bad.
#[derive(Error, Debug)]
pub enum DeadAirError {
    #[error("vector store unavailable: {0}")]
    SourceUnavailable(String),

    #[error("snapshot schema v{found} unsupported (this build reads v{expected})")]
    SchemaIncompatible { found: u32, expected: u32 },

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("rng contract: {0}")]
    RngContract(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type Result<T, E = DeadAirError> = std::result::Result<T, E>;

/// Why a candidate story was refused. Returned in lists from validators;
/// the caller drops or demotes the candidate and moves on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    /// Hostile factions portrayed as cooperating.
    CanonConflict { detail: String },
    /// Faction referenced outside its lifespan.
    FactionAnachronism { faction: String, detail: String },
    /// A dated canon event placed in the wrong year.
    EventDateMismatch {
        event: String,
        claimed: i32,
        canonical: i32,
    },
    /// Story lies in the DJ's future and is not plausible as rumor.
    TemporalBoundary { detail: String },
    /// Story tier exceeds the DJ's knowledge ceiling.
    TierForbidden {
        story_tier: KnowledgeTier,
        ceiling: KnowledgeTier,
    },
    /// Narrative weight under the timeline's floor after demotion.
    BelowWeightFloor {
        timeline: Timeline,
        weight: f64,
        floor: f64,
    },
}

impl Rejection {
    /// Stable tag for logs and counters.
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::CanonConflict { .. } => "canon_conflict",
            Rejection::FactionAnachronism { .. } => "faction_anachronism",
            Rejection::EventDateMismatch { .. } => "event_date_mismatch",
            Rejection::TemporalBoundary { .. } => "temporal_boundary",
            Rejection::TierForbidden { .. } => "tier_forbidden",
            Rejection::BelowWeightFloor { .. } => "below_weight_floor",
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::CanonConflict { detail } => write!(f, "canon conflict: {detail}"),
            Rejection::FactionAnachronism { faction, detail } => {
                write!(f, "{faction} anachronism: {detail}")
            }
            Rejection::EventDateMismatch {
                event,
                claimed,
                canonical,
            } => write!(f, "{event} dated {claimed}, canon says {canonical}"),
            Rejection::TemporalBoundary { detail } => write!(f, "temporal boundary: {detail}"),
            Rejection::TierForbidden {
                story_tier,
                ceiling,
            } => write!(f, "tier {story_tier} above ceiling {ceiling}"),
            Rejection::BelowWeightFloor {
                timeline,
                weight,
                floor,
            } => write!(f, "weight {weight:.1} under {timeline} floor {floor:.1}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_serializes_with_kind_tag() {
        let r = Rejection::EventDateMismatch {
            event: "Great War".to_string(),
            claimed: 2078,
            canonical: 2077,
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["kind"], "event_date_mismatch");
        assert_eq!(v["canonical"], 2077);
    }

    #[test]
    fn error_messages_read_well() {
        let e = DeadAirError::SchemaIncompatible {
            found: 9,
            expected: 1,
        };
        assert_eq!(
            e.to_string(),
            "snapshot schema v9 unsupported (this build reads v1)"
        );
    }
}
