//! The vector knowledge base boundary.
//!
//! The core only queries; population and embedding happen elsewhere. The
//! filter language is a typed tree over the closed `ChunkMeta` fields;
//! nothing in `extra` is filterable.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use deadair_common::types::Chunk;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("vector store query failed: {0}")]
    Query(String),
}

/// Typed filter tree: equality, membership, year ranges, conjunction and
/// disjunction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ChunkFilter {
    ContentTypeEq { value: String },
    ContentTypeIn { values: Vec<String> },
    InfoboxTypeEq { value: String },
    FactionEq { value: String },
    RegionEq { value: String },
    EraEq { value: String },
    /// Matches chunks tagged with this theme.
    ThemeHas { value: String },
    YearEq { value: i32 },
    YearGte { value: i32 },
    YearLte { value: i32 },
    /// Matches only chunks that carry a year at all.
    YearPresent,
    /// Rotation support: drop chunks the freshness layer has embargoed.
    IdNotIn { ids: BTreeSet<String> },
    /// Rotation support: drop chunks tagged with any windowed subject.
    ThemeNotIn { themes: BTreeSet<String> },
    And { filters: Vec<ChunkFilter> },
    Or { filters: Vec<ChunkFilter> },
}

impl ChunkFilter {
    pub fn and(filters: Vec<ChunkFilter>) -> ChunkFilter {
        ChunkFilter::And { filters }
    }

    pub fn or(filters: Vec<ChunkFilter>) -> ChunkFilter {
        ChunkFilter::Or { filters }
    }

    /// Evaluate against one chunk. Case-insensitive on string fields, the
    /// same contract a real store implements server-side.
    pub fn matches(&self, chunk: &Chunk) -> bool {
        let meta = &chunk.meta;
        match self {
            ChunkFilter::ContentTypeEq { value } => {
                meta.content_type.as_deref().is_some_and(|v| v.eq_ignore_ascii_case(value))
            }
            ChunkFilter::ContentTypeIn { values } => meta
                .content_type
                .as_deref()
                .is_some_and(|v| values.iter().any(|w| v.eq_ignore_ascii_case(w))),
            ChunkFilter::InfoboxTypeEq { value } => {
                meta.infobox_type.as_deref().is_some_and(|v| v.eq_ignore_ascii_case(value))
            }
            ChunkFilter::FactionEq { value } => {
                meta.faction.as_deref().is_some_and(|v| v.eq_ignore_ascii_case(value))
            }
            ChunkFilter::RegionEq { value } => {
                meta.region.as_deref().is_some_and(|v| v.eq_ignore_ascii_case(value))
            }
            ChunkFilter::EraEq { value } => {
                meta.era.as_deref().is_some_and(|v| v.eq_ignore_ascii_case(value))
            }
            ChunkFilter::ThemeHas { value } => {
                meta.themes.iter().any(|t| t.eq_ignore_ascii_case(value))
            }
            ChunkFilter::YearEq { value } => meta.year == Some(*value),
            ChunkFilter::YearGte { value } => meta.year.is_some_and(|y| y >= *value),
            ChunkFilter::YearLte { value } => meta.year.is_some_and(|y| y <= *value),
            ChunkFilter::YearPresent => meta.year.is_some(),
            ChunkFilter::IdNotIn { ids } => !ids.contains(&chunk.id),
            ChunkFilter::ThemeNotIn { themes } => !meta
                .themes
                .iter()
                .any(|t| themes.iter().any(|x| x.eq_ignore_ascii_case(t))),
            ChunkFilter::And { filters } => filters.iter().all(|f| f.matches(chunk)),
            ChunkFilter::Or { filters } => filters.iter().any(|f| f.matches(chunk)),
        }
    }
}

/// Read-only handle to the lore knowledge base. Synchronous; async callers
/// wrap the tick, not the store.
pub trait VectorStore {
    fn query(&self, filter: &ChunkFilter, n: usize) -> Result<Vec<Chunk>, StoreError>;
}

/// In-memory store for tests and offline fixtures. Returns chunks in
/// insertion order, which stands in for relevance order.
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    chunks: Vec<Chunk>,
    fail_with: Option<String>,
}

impl MemoryVectorStore {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self {
            chunks,
            fail_with: None,
        }
    }

    /// A store whose every query fails, for SourceUnavailable paths.
    pub fn failing(message: &str) -> Self {
        Self {
            chunks: Vec::new(),
            fail_with: Some(message.to_string()),
        }
    }

    pub fn push(&mut self, chunk: Chunk) {
        self.chunks.push(chunk);
    }
}

impl VectorStore for MemoryVectorStore {
    fn query(&self, filter: &ChunkFilter, n: usize) -> Result<Vec<Chunk>, StoreError> {
        if let Some(msg) = &self.fail_with {
            return Err(StoreError::Query(msg.clone()));
        }
        Ok(self
            .chunks
            .iter()
            .filter(|c| filter.matches(c))
            .take(n)
            .cloned()
            .collect())
    }
}
