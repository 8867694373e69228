//! Anti-repetition: time-recovery freshness, subject windows, tone
//! balance, and the complexity rotation sequencer. One tracker per DJ.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use deadair_common::config::FreshnessPolicy;
use deadair_common::types::Exclusions;
use deadair_world::types::{ComplexityTier, EmotionalTone};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub last_used_at: DateTime<Utc>,
    pub use_count: u32,
}

/// Per-DJ rotation state. Serializable so it can ride along with periodic
/// snapshots; everything here is advisory, never canon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreshnessTracker {
    policy: FreshnessPolicy,
    usage: BTreeMap<String, UsageRecord>,
    /// (used_at, subject) pairs inside the sliding window.
    subject_window: VecDeque<(DateTime<Utc>, String)>,
    tone_history: VecDeque<EmotionalTone>,
    variety_history: VecDeque<String>,
    /// Entity sets of the most recent broadcasts, for engagement novelty.
    recent_broadcasts: VecDeque<BTreeSet<String>>,
    complexity_cursor: usize,
    last_complexity: Option<ComplexityTier>,
}

impl FreshnessTracker {
    pub fn new(policy: FreshnessPolicy) -> Self {
        Self {
            policy,
            usage: BTreeMap::new(),
            subject_window: VecDeque::new(),
            tone_history: VecDeque::new(),
            variety_history: VecDeque::new(),
            recent_broadcasts: VecDeque::new(),
            complexity_cursor: 0,
            last_complexity: None,
        }
    }

    pub fn policy(&self) -> &FreshnessPolicy {
        &self.policy
    }

    // --- scoring ---

    /// Hours-based recovery toward 1.0; never-used ids are fully fresh.
    pub fn time_factor(&self, id: &str, now: DateTime<Utc>) -> f64 {
        match self.usage.get(id) {
            None => 1.0,
            Some(record) => {
                let hours = (now - record.last_used_at).num_minutes() as f64 / 60.0;
                (hours / self.policy.recovery_hours).clamp(0.0, 1.0)
            }
        }
    }

    fn subject_novelty(&self, subjects: &BTreeSet<String>, now: DateTime<Utc>) -> f64 {
        if subjects.is_empty() {
            return 1.0;
        }
        let windowed: BTreeSet<&String> = self
            .subject_window
            .iter()
            .filter(|(used_at, _)| self.in_window(*used_at, now))
            .map(|(_, s)| s)
            .collect();
        let fresh = subjects.iter().filter(|s| !windowed.contains(s)).count();
        fresh as f64 / subjects.len() as f64
    }

    fn variety_novelty(&self, group: &str) -> f64 {
        if self.variety_history.iter().any(|g| g == group) {
            0.0
        } else {
            1.0
        }
    }

    fn in_window(&self, used_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - used_at <= Duration::hours(self.policy.subject_window_hours)
    }

    /// Combined freshness in [0, 1].
    pub fn score(
        &self,
        id: &str,
        subjects: &BTreeSet<String>,
        variety_group: &str,
        now: DateTime<Utc>,
    ) -> f64 {
        let p = &self.policy;
        let combined = p.time_weight * self.time_factor(id, now)
            + p.subject_weight * self.subject_novelty(subjects, now)
            + p.variety_weight * self.variety_novelty(variety_group);
        combined.clamp(0.0, 1.0)
    }

    /// Linear map from freshness to the inclusion-probability multiplier.
    pub fn multiplier(&self, score: f64) -> f64 {
        let p = &self.policy;
        p.multiplier_min + score.clamp(0.0, 1.0) * (p.multiplier_max - p.multiplier_min)
    }

    // --- recording ---

    /// Mark one id (story or source chunk) as spent. Only touches the
    /// usage map; the windows belong to [`FreshnessTracker::record_use`].
    pub fn record_chunk_use(&mut self, id: &str, now: DateTime<Utc>) {
        let record = self.usage.entry(id.to_string()).or_insert(UsageRecord {
            last_used_at: now,
            use_count: 0,
        });
        record.last_used_at = now;
        record.use_count += 1;
    }

    /// Record one on-air use of a story and its subjects.
    pub fn record_use(
        &mut self,
        id: &str,
        subjects: &BTreeSet<String>,
        variety_group: &str,
        tone: EmotionalTone,
        now: DateTime<Utc>,
    ) {
        self.record_chunk_use(id, now);

        for subject in subjects {
            self.subject_window.push_back((now, subject.clone()));
        }
        while let Some((used_at, _)) = self.subject_window.front() {
            if !self.in_window(*used_at, now) {
                self.subject_window.pop_front();
            } else {
                break;
            }
        }

        self.tone_history.push_back(tone);
        while self.tone_history.len() > self.policy.tone_window {
            self.tone_history.pop_front();
        }

        self.variety_history.push_back(variety_group.to_string());
        while self.variety_history.len() > self.policy.variety_history {
            self.variety_history.pop_front();
        }
    }

    /// Note the entities mentioned in one finished broadcast.
    pub fn note_broadcast(&mut self, entities: BTreeSet<String>) {
        self.recent_broadcasts.push_back(entities);
        while self.recent_broadcasts.len() > self.policy.recent_mention_window {
            self.recent_broadcasts.pop_front();
        }
    }

    /// Engagement novelty for an entity: 1.0 when unmentioned recently,
    /// falling to 0.0 as mentions saturate (cap 5 over the window).
    pub fn novelty(&self, entity: &str) -> f64 {
        let mentions = self
            .recent_broadcasts
            .iter()
            .filter(|set| set.contains(entity))
            .count()
            .min(5);
        1.0 - mentions as f64 / 5.0
    }

    // --- complexity rotation ---

    /// The tier the sequencer expects next.
    pub fn expected_complexity(&self) -> ComplexityTier {
        ComplexityTier::ROTATION[self.complexity_cursor % ComplexityTier::ROTATION.len()]
    }

    /// Strict round-robin with skip-if-unavailable; never serves the same
    /// tier twice in a row when an alternative exists.
    pub fn next_complexity(&mut self, available: &[ComplexityTier]) -> Option<ComplexityTier> {
        if available.is_empty() {
            return None;
        }
        let len = ComplexityTier::ROTATION.len();
        let mut fallback: Option<(usize, ComplexityTier)> = None;
        for offset in 0..len {
            let idx = (self.complexity_cursor + offset) % len;
            let tier = ComplexityTier::ROTATION[idx];
            if !available.contains(&tier) {
                continue;
            }
            if self.last_complexity == Some(tier) {
                fallback.get_or_insert((idx, tier));
                continue;
            }
            self.complexity_cursor = idx + 1;
            self.last_complexity = Some(tier);
            return Some(tier);
        }
        // Only the just-served tier is available; repetition beats silence.
        if let Some((idx, tier)) = fallback {
            self.complexity_cursor = idx + 1;
            self.last_complexity = Some(tier);
            return Some(tier);
        }
        None
    }

    // --- extractor coupling ---

    /// Everything the extractor should avoid this pass. `chunk_ids` holds
    /// whatever the usage map was fed, which the director feeds with every
    /// aired story's source chunk ids so the embargo reaches the store
    /// filter.
    pub fn exclusions(&self, now: DateTime<Utc>) -> Exclusions {
        let stale: BTreeSet<String> = self
            .usage
            .keys()
            .filter(|id| self.time_factor(id.as_str(), now) < self.policy.stale_threshold)
            .cloned()
            .collect();

        let subjects: BTreeSet<String> = self
            .subject_window
            .iter()
            .filter(|(used_at, _)| self.in_window(*used_at, now))
            .map(|(_, s)| s.clone())
            .collect();

        let tones = self.over_represented_tones();

        Exclusions {
            chunk_ids: stale,
            subjects,
            tones,
            complexity: Some(self.expected_complexity()),
        }
    }

    /// A tone is over-represented when it fills more than a third of a
    /// reasonably full recent window.
    fn over_represented_tones(&self) -> BTreeSet<EmotionalTone> {
        let mut tones = BTreeSet::new();
        if self.tone_history.len() < 6 {
            return tones;
        }
        let mut counts: BTreeMap<EmotionalTone, usize> = BTreeMap::new();
        for tone in &self.tone_history {
            *counts.entry(*tone).or_default() += 1;
        }
        for (tone, count) in counts {
            if count * 3 > self.tone_history.len() {
                tones.insert(tone);
            }
        }
        tones
    }
}
