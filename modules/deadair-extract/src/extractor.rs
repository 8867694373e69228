//! Mining the knowledge base into validated stories.
//!
//! Deterministic end to end: the same store contents, DJ, and exclusions
//! produce the same stories, ids included. Identity is derived from the
//! grouped chunks, never minted.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info, warn};

use deadair_common::config::SchedulerPolicy;
use deadair_common::error::{DeadAirError, Rejection};
use deadair_common::types::{CanonTables, Chunk, DjProfile, Exclusions, Story, StoryAct};
use deadair_world::types::{
    ComplexityTier, ContentType, KnowledgeTier, StoryStatus, Timeline,
};

use crate::acts::{build_acts, dominant_tone};
use crate::dj::narration_decision;
use crate::lore::LoreValidator;
use crate::store::{ChunkFilter, StoreError, VectorStore};
use crate::weight::narrative_weight;

/// In-universe years two event chunks of one faction may differ by and
/// still merge into the same story.
const EVENT_CLUSTER_SPAN: i32 = 2;

/// Distinct years a faction needs on record before its events read as an
/// arc rather than isolated incidents.
const ARC_MIN_YEARS: usize = 3;

fn world_event_keywords() -> &'static Regex {
    static KEYWORDS: OnceLock<Regex> = OnceLock::new();
    KEYWORDS.get_or_init(|| {
        Regex::new(r"(?i)\b(wars?|fall of|founding of)\b").expect("static regex")
    })
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

fn fnv1a(mut hash: u64, bytes: &[u8]) -> u64 {
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for c in title.chars().flat_map(char::to_lowercase) {
        if slug.len() >= 40 {
            break;
        }
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Stable story identity: a readable slug plus a fingerprint over the
/// discriminating inputs. Re-extracting identical store contents yields
/// the same id, which is what makes tick replays reproducible end to end.
fn derive_story_id(title: &str, content_type: ContentType, chunks: &[Chunk]) -> String {
    let mut chunk_ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
    chunk_ids.sort_unstable();
    let mut hash = fnv1a(FNV_OFFSET, title.as_bytes());
    hash = fnv1a(hash, content_type.to_string().as_bytes());
    for id in chunk_ids {
        hash = fnv1a(hash, id.as_bytes());
        hash = fnv1a(hash, b"\0");
    }
    format!("story:{content_type}:{}:{hash:016x}", slugify(title))
}

/// Counters for one extraction pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractionStats {
    pub chunks_seen: usize,
    pub chunks_skipped: usize,
    pub groups: usize,
    pub built: usize,
    pub demoted: usize,
    pub rejected: usize,
}

pub struct StoryExtractor<'a, S: VectorStore> {
    store: &'a S,
    canon: &'a CanonTables,
    policy: &'a SchedulerPolicy,
}

impl<'a, S: VectorStore> StoryExtractor<'a, S> {
    pub fn new(store: &'a S, canon: &'a CanonTables, policy: &'a SchedulerPolicy) -> Self {
        Self {
            store,
            canon,
            policy,
        }
    }

    /// Mine quest chunks grouped by wiki title into stories. Groups need at
    /// least two chunks; singleton quest mentions are too thin to arc.
    pub fn extract_quests(
        &self,
        dj: &DjProfile,
        limit: usize,
        exclusions: &Exclusions,
    ) -> Result<(Vec<Story>, ExtractionStats), DeadAirError> {
        let mut stats = ExtractionStats::default();

        let filter = ChunkFilter::and(self.with_exclusions(
            ChunkFilter::or(vec![
                ChunkFilter::InfoboxTypeEq {
                    value: "infobox quest".to_string(),
                },
                ChunkFilter::ContentTypeIn {
                    values: vec!["quest".to_string(), "questline".to_string()],
                },
            ]),
            exclusions,
        ));
        let chunks = self.query(&filter, limit.saturating_mul(10).max(50))?;
        stats.chunks_seen = chunks.len();

        let mut groups: BTreeMap<String, Vec<Chunk>> = BTreeMap::new();
        for chunk in chunks {
            if !self.chunk_usable(&chunk, dj, &mut stats) {
                continue;
            }
            groups.entry(chunk.wiki_title.clone()).or_default().push(chunk);
        }
        groups.retain(|_, chunks| chunks.len() >= 2);
        stats.groups = groups.len();

        let mut stories = Vec::new();
        for (title, group) in groups {
            if let Some(story) =
                self.synthesize(&title, &group, ContentType::Quest, dj, exclusions, &mut stats)
            {
                stories.push(story);
            }
        }
        Ok(self.finish("quests", stories, limit, stats))
    }

    /// Mine dated event chunks, clustered by faction and year proximity.
    pub fn extract_events(
        &self,
        dj: &DjProfile,
        limit: usize,
        exclusions: &Exclusions,
    ) -> Result<(Vec<Story>, ExtractionStats), DeadAirError> {
        let mut stats = ExtractionStats::default();
        let clusters = self.event_clusters(dj, limit, exclusions, &mut stats)?;

        let mut stories = Vec::new();
        for (faction, cluster) in clusters {
            let title = cluster_title(&faction, &cluster);
            if let Some(story) =
                self.synthesize(&title, &cluster, ContentType::Event, dj, exclusions, &mut stats)
            {
                stories.push(story);
            }
        }
        Ok(self.finish("events", stories, limit, stats))
    }

    /// Longer arcs: one faction's events across three or more distinct
    /// years become a single faction-arc story.
    pub fn extract_faction_arcs(
        &self,
        dj: &DjProfile,
        limit: usize,
        exclusions: &Exclusions,
    ) -> Result<(Vec<Story>, ExtractionStats), DeadAirError> {
        let mut stats = ExtractionStats::default();
        let by_faction = self.dated_event_chunks(dj, limit, exclusions, &mut stats)?;

        let mut stories = Vec::new();
        for (faction, mut chunks) in by_faction {
            let mut years: Vec<i32> = chunks.iter().filter_map(|c| c.meta.year).collect();
            years.sort_unstable();
            years.dedup();
            if years.len() < ARC_MIN_YEARS {
                continue;
            }
            chunks.sort_by_key(|c| c.meta.year);
            let title = cluster_title(&faction, &chunks);
            if let Some(story) = self.synthesize(
                &title,
                &chunks,
                ContentType::FactionArc,
                dj,
                exclusions,
                &mut stats,
            ) {
                stories.push(story);
            }
        }
        Ok(self.finish("faction arcs", stories, limit, stats))
    }

    // --- pipeline stages ---

    fn query(&self, filter: &ChunkFilter, n: usize) -> Result<Vec<Chunk>, DeadAirError> {
        self.store.query(filter, n).map_err(|e| match e {
            StoreError::Query(msg) => DeadAirError::SourceUnavailable(msg),
        })
    }

    fn with_exclusions(&self, base: ChunkFilter, exclusions: &Exclusions) -> Vec<ChunkFilter> {
        let mut filters = vec![base];
        if !exclusions.chunk_ids.is_empty() {
            filters.push(ChunkFilter::IdNotIn {
                ids: exclusions.chunk_ids.clone(),
            });
        }
        if !exclusions.subjects.is_empty() {
            filters.push(ChunkFilter::ThemeNotIn {
                themes: exclusions.subjects.clone(),
            });
        }
        filters
    }

    /// Temporal pre-filter plus basic metadata hygiene.
    fn chunk_usable(&self, chunk: &Chunk, dj: &DjProfile, stats: &mut ExtractionStats) -> bool {
        if chunk.text.trim().is_empty() || chunk.wiki_title.trim().is_empty() {
            warn!(chunk = chunk.id, "skipping chunk with unusable metadata");
            stats.chunks_skipped += 1;
            return false;
        }
        // Chunks dated after the DJ's present don't enter extraction at
        // all; future framing is decided per story, not per chunk.
        if chunk.meta.year.is_some_and(|y| y > dj.year) {
            stats.chunks_skipped += 1;
            return false;
        }
        true
    }

    fn dated_event_chunks(
        &self,
        dj: &DjProfile,
        limit: usize,
        exclusions: &Exclusions,
        stats: &mut ExtractionStats,
    ) -> Result<BTreeMap<String, Vec<Chunk>>, DeadAirError> {
        let filter = ChunkFilter::and(self.with_exclusions(
            ChunkFilter::and(vec![
                ChunkFilter::ContentTypeEq {
                    value: "event".to_string(),
                },
                ChunkFilter::YearPresent,
            ]),
            exclusions,
        ));
        let chunks = self.query(&filter, limit.saturating_mul(10).max(50))?;
        stats.chunks_seen = chunks.len();

        let mut by_faction: BTreeMap<String, Vec<Chunk>> = BTreeMap::new();
        for chunk in chunks {
            if !self.chunk_usable(&chunk, dj, stats) {
                continue;
            }
            let faction = match &chunk.meta.faction {
                Some(f) => f.clone(),
                None => {
                    warn!(chunk = chunk.id, "event chunk has no faction, skipping");
                    stats.chunks_skipped += 1;
                    continue;
                }
            };
            by_faction.entry(faction).or_default().push(chunk);
        }
        Ok(by_faction)
    }

    fn event_clusters(
        &self,
        dj: &DjProfile,
        limit: usize,
        exclusions: &Exclusions,
        stats: &mut ExtractionStats,
    ) -> Result<Vec<(String, Vec<Chunk>)>, DeadAirError> {
        let by_faction = self.dated_event_chunks(dj, limit, exclusions, stats)?;

        let mut clusters = Vec::new();
        for (faction, mut chunks) in by_faction {
            chunks.sort_by_key(|c| c.meta.year);
            let mut current: Vec<Chunk> = Vec::new();
            for chunk in chunks {
                let split = current.last().is_some_and(|prev| {
                    match (prev.meta.year, chunk.meta.year) {
                        (Some(a), Some(b)) => b - a > EVENT_CLUSTER_SPAN,
                        _ => false,
                    }
                });
                if split {
                    clusters.push((faction.clone(), std::mem::take(&mut current)));
                }
                current.push(chunk);
            }
            if !current.is_empty() {
                clusters.push((faction.clone(), current));
            }
        }
        stats.groups = clusters.len();
        Ok(clusters)
    }

    /// Build one story from an ordered chunk group, then run it through the
    /// full gauntlet: acts, timeline, weight gate, canon, DJ, rotation.
    fn synthesize(
        &self,
        title: &str,
        chunks: &[Chunk],
        content_type: ContentType,
        dj: &DjProfile,
        exclusions: &Exclusions,
        stats: &mut ExtractionStats,
    ) -> Option<Story> {
        let acts = build_acts(chunks);
        if acts.is_empty() {
            return None;
        }

        let mut story = self.assemble(title, chunks, acts, content_type, dj);

        // Rotation filters that only resolve once acts exist.
        if exclusions.tones.contains(&dominant_tone(&story.acts)) {
            debug!(story = story.title, "tone over-represented, skipping");
            stats.chunks_skipped += chunks.len();
            return None;
        }
        if let Some(tier) = exclusions.complexity {
            if ComplexityTier::for_act_count(story.acts.len()) != tier {
                debug!(story = story.title, expected = %tier, "complexity rotation mismatch");
                return None;
            }
        }

        // Timeline assignment, then the weight gate with one demotion.
        story.timeline = assign_timeline(&story, self.canon);
        story.narrative_weight = narrative_weight(&story, self.canon);
        match gate_timeline(story.timeline, story.narrative_weight, self.policy) {
            GateOutcome::Accepted(timeline) => story.timeline = timeline,
            GateOutcome::Demoted(timeline) => {
                stats.demoted += 1;
                story.timeline = timeline;
            }
            GateOutcome::Discarded => {
                let rejection = Rejection::BelowWeightFloor {
                    timeline: story.timeline,
                    weight: story.narrative_weight,
                    floor: self.policy.weight_floor(story.timeline),
                };
                debug!(story = story.title, %rejection, "discarding candidate");
                stats.rejected += 1;
                return None;
            }
        }

        let lore = LoreValidator::new(self.canon);
        let rejections = lore.check(&story);
        if !rejections.is_empty() {
            for rejection in &rejections {
                warn!(story = story.title, %rejection, "canon rejection");
            }
            stats.rejected += 1;
            return None;
        }

        if let Err(rejection) = narration_decision(&story, dj) {
            debug!(story = story.title, dj = dj.id, %rejection, "DJ cannot narrate");
            stats.rejected += 1;
            return None;
        }

        stats.built += 1;
        Some(story)
    }

    fn assemble(
        &self,
        title: &str,
        chunks: &[Chunk],
        acts: Vec<StoryAct>,
        content_type: ContentType,
        dj: &DjProfile,
    ) -> Story {
        let mut factions = std::collections::BTreeSet::new();
        let mut themes = std::collections::BTreeSet::new();
        let mut region_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut year_min = None;
        let mut year_max = None;
        let mut era = None;
        let mut tier = KnowledgeTier::Common;

        for chunk in chunks {
            if let Some(f) = &chunk.meta.faction {
                factions.insert(f.clone());
            }
            for theme in &chunk.meta.themes {
                themes.insert(theme.to_lowercase());
            }
            if let Some(r) = &chunk.meta.region {
                *region_counts.entry(r.clone()).or_default() += 1;
            }
            if let Some(y) = chunk.meta.year {
                year_min = Some(year_min.map_or(y, |m: i32| m.min(y)));
                year_max = Some(year_max.map_or(y, |m: i32| m.max(y)));
            }
            if era.is_none() {
                era = chunk.meta.era.clone();
            }
            if let Some(t) = chunk.meta.extra.get("knowledge_tier") {
                if let Ok(parsed) = t.parse::<KnowledgeTier>() {
                    tier = tier.max(parsed);
                }
            }
        }

        let region = region_counts
            .into_iter()
            .max_by_key(|(_, count)| *count)
            .map(|(region, _)| region);

        // Stories naming a hard-dated canon event can't circulate as rumor
        // before the event happens.
        let plausible = !acts.iter().any(|a| {
            self.canon.events().any(|(event, _)| {
                a.title.to_lowercase().contains(event) || a.summary.to_lowercase().contains(event)
            })
        });

        Story {
            id: derive_story_id(title, content_type, chunks),
            title: title.to_string(),
            content_type,
            timeline: Timeline::Daily,
            status: StoryStatus::Dormant,
            era,
            year_min,
            year_max,
            region,
            factions,
            locations: std::collections::BTreeSet::new(),
            characters: std::collections::BTreeSet::new(),
            themes,
            knowledge_tier: tier,
            compatible_djs: [dj.id.clone()].into_iter().collect(),
            acts,
            narrative_weight: 0.0,
            source_chunks: chunks.iter().map(|c| c.id.clone()).collect(),
            escalated_from: None,
            plausible,
        }
    }

    fn finish(
        &self,
        what: &str,
        mut stories: Vec<Story>,
        limit: usize,
        stats: ExtractionStats,
    ) -> (Vec<Story>, ExtractionStats) {
        stories.sort_by(|a, b| {
            b.narrative_weight
                .partial_cmp(&a.narrative_weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.title.cmp(&b.title))
        });
        stories.truncate(limit);
        info!(
            what,
            built = stats.built,
            demoted = stats.demoted,
            rejected = stats.rejected,
            returned = stories.len(),
            "extraction pass complete"
        );
        (stories, stats)
    }
}

fn cluster_title(faction: &str, chunks: &[Chunk]) -> String {
    let mut titles: Vec<&str> = chunks.iter().map(|c| c.wiki_title.as_str()).collect();
    titles.dedup();
    if titles.len() == 1 {
        return titles[0].to_string();
    }
    let years: Vec<i32> = chunks.iter().filter_map(|c| c.meta.year).collect();
    match (years.iter().min(), years.iter().max()) {
        (Some(min), Some(max)) if min != max => format!("{faction}, {min}-{max}"),
        (Some(year), _) => format!("{faction}, {year}"),
        _ => faction.to_string(),
    }
}

/// Where a freshly built story starts on the cadence ladder. Checked from
/// the top down; first match wins.
pub fn assign_timeline(story: &Story, canon: &CanonTables) -> Timeline {
    let acts = story.acts.len();
    let conflict_avg = story.mean_conflict();

    let world_event = world_event_keywords().is_match(&story.title)
        || story
            .acts
            .iter()
            .any(|a| world_event_keywords().is_match(&a.title));
    if acts >= 7 || world_event {
        return Timeline::Yearly;
    }

    let rival_factions = canon.has_hostile_pair(&story.factions)
        || {
            let list: Vec<&String> = story.factions.iter().collect();
            let mut non_neutral = false;
            for (i, a) in list.iter().enumerate() {
                for b in &list[i + 1..] {
                    if canon.relation(a, b) != deadair_world::canon::FactionRelation::Neutral {
                        non_neutral = true;
                    }
                }
            }
            non_neutral
        };
    if (5..=6).contains(&acts) || (story.factions.len() >= 2 && rival_factions) {
        return Timeline::Monthly;
    }

    if acts == 4 || ((2..=3).contains(&acts) && conflict_avg >= 0.5) {
        return Timeline::Weekly;
    }

    Timeline::Daily
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Accepted(Timeline),
    Demoted(Timeline),
    Discarded,
}

/// The narrative-weight gate: reject below the floor, demote one step and
/// retry once, discard if still under.
pub fn gate_timeline(timeline: Timeline, weight: f64, policy: &SchedulerPolicy) -> GateOutcome {
    if weight >= policy.weight_floor(timeline) {
        return GateOutcome::Accepted(timeline);
    }
    match timeline.demoted() {
        Some(lower) if weight >= policy.weight_floor(lower) => GateOutcome::Demoted(lower),
        _ => GateOutcome::Discarded,
    }
}
