//! Policy tables. Plain data with shipped defaults; everything here is
//! serde-roundtrippable so deployments can load overrides from a file. The
//! core itself reads no environment and parses no CLI.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use deadair_world::types::Timeline;

/// Fixed scheduling policy for one timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimelinePolicy {
    /// Base per-tick inclusion probability before the freshness multiplier.
    pub inclusion_p: f64,
    /// Minimum broadcasts between two beats of this timeline.
    pub min_gap: u64,
    pub min_broadcasts_per_act: u32,
    pub max_broadcasts_per_act: u32,
    /// Probability of advancing the act once the minimum is met.
    pub advance_p: f64,
    /// Broadcasts the slot stays empty after a completion.
    pub completion_cooldown: u32,
    /// Minimum narrative weight for stories pooled at this cadence.
    pub weight_floor: f64,
}

impl TimelinePolicy {
    /// Broadcasts a story of `act_count` acts is expected to take. Stories
    /// running past twice this without resolving get abandoned.
    pub fn expected_duration(&self, act_count: u32) -> u32 {
        act_count.max(1) * self.min_broadcasts_per_act.max(1)
    }
}

/// The four-row policy table driving the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerPolicy {
    pub daily: TimelinePolicy,
    pub weekly: TimelinePolicy,
    pub monthly: TimelinePolicy,
    pub yearly: TimelinePolicy,
}

impl SchedulerPolicy {
    pub fn timeline(&self, timeline: Timeline) -> &TimelinePolicy {
        match timeline {
            Timeline::Daily => &self.daily,
            Timeline::Weekly => &self.weekly,
            Timeline::Monthly => &self.monthly,
            Timeline::Yearly => &self.yearly,
        }
    }

    pub fn weight_floor(&self, timeline: Timeline) -> f64 {
        self.timeline(timeline).weight_floor
    }
}

impl Default for SchedulerPolicy {
    fn default() -> Self {
        Self {
            daily: TimelinePolicy {
                inclusion_p: 0.70,
                min_gap: 0,
                min_broadcasts_per_act: 1,
                max_broadcasts_per_act: 3,
                advance_p: 0.30,
                completion_cooldown: 2,
                weight_floor: 1.0,
            },
            weekly: TimelinePolicy {
                inclusion_p: 0.40,
                min_gap: 1,
                min_broadcasts_per_act: 2,
                max_broadcasts_per_act: 6,
                advance_p: 0.30,
                completion_cooldown: 5,
                weight_floor: 5.0,
            },
            monthly: TimelinePolicy {
                inclusion_p: 0.20,
                min_gap: 3,
                min_broadcasts_per_act: 3,
                max_broadcasts_per_act: 15,
                advance_p: 0.30,
                completion_cooldown: 10,
                weight_floor: 7.0,
            },
            yearly: TimelinePolicy {
                inclusion_p: 0.10,
                min_gap: 10,
                min_broadcasts_per_act: 5,
                max_broadcasts_per_act: 30,
                advance_p: 0.30,
                completion_cooldown: 20,
                weight_floor: 9.0,
            },
        }
    }
}

/// Gate a completed story must clear to re-emerge one cadence up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EscalationRule {
    pub min_engagement: f64,
    pub min_broadcasts: u32,
}

/// Escalation thresholds keyed by the source timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    pub rules: BTreeMap<Timeline, EscalationRule>,
}

impl EscalationPolicy {
    pub fn rule(&self, from: Timeline) -> Option<EscalationRule> {
        self.rules.get(&from).copied()
    }
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        let mut rules = BTreeMap::new();
        rules.insert(
            Timeline::Daily,
            EscalationRule {
                min_engagement: 0.7,
                min_broadcasts: 3,
            },
        );
        rules.insert(
            Timeline::Weekly,
            EscalationRule {
                min_engagement: 0.8,
                min_broadcasts: 10,
            },
        );
        rules.insert(
            Timeline::Monthly,
            EscalationRule {
                min_engagement: 0.85,
                min_broadcasts: 25,
            },
        );
        Self { rules }
    }
}

/// Weights and windows for the anti-repetition layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FreshnessPolicy {
    pub time_weight: f64,
    pub subject_weight: f64,
    pub variety_weight: f64,
    /// Hours until a used id recovers full time-factor freshness.
    pub recovery_hours: f64,
    /// Sliding window for subject repetition.
    pub subject_window_hours: i64,
    /// How many recent broadcasts tone counts cover.
    pub tone_window: usize,
    /// Variety groups remembered for the novelty check.
    pub variety_history: usize,
    pub multiplier_min: f64,
    pub multiplier_max: f64,
    /// Chunks under this freshness are excluded from extraction queries.
    pub stale_threshold: f64,
    /// Broadcasts scanned when computing engagement novelty.
    pub recent_mention_window: usize,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            time_weight: 0.5,
            subject_weight: 0.3,
            variety_weight: 0.2,
            recovery_hours: 168.0,
            subject_window_hours: 24,
            tone_window: 20,
            variety_history: 10,
            multiplier_min: 0.5,
            multiplier_max: 1.2,
            stale_threshold: 0.3,
            recent_mention_window: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_the_published_table() {
        let p = SchedulerPolicy::default();
        assert_eq!(p.timeline(Timeline::Daily).inclusion_p, 0.70);
        assert_eq!(p.timeline(Timeline::Weekly).min_gap, 1);
        assert_eq!(p.timeline(Timeline::Monthly).max_broadcasts_per_act, 15);
        assert_eq!(p.timeline(Timeline::Yearly).completion_cooldown, 20);
        assert_eq!(p.weight_floor(Timeline::Weekly), 5.0);
    }

    #[test]
    fn expected_duration_scales_with_acts() {
        let p = SchedulerPolicy::default();
        assert_eq!(p.timeline(Timeline::Daily).expected_duration(3), 3);
        assert_eq!(p.timeline(Timeline::Weekly).expected_duration(4), 8);
        assert_eq!(p.timeline(Timeline::Yearly).expected_duration(7), 35);
    }

    #[test]
    fn escalation_defaults() {
        let e = EscalationPolicy::default();
        let daily = e.rule(Timeline::Daily).unwrap();
        assert_eq!(daily.min_engagement, 0.7);
        assert_eq!(daily.min_broadcasts, 3);
        assert!(e.rule(Timeline::Yearly).is_none());
    }

    #[test]
    fn policies_round_trip_as_json() {
        let p = SchedulerPolicy::default();
        let back: SchedulerPolicy =
            serde_json::from_str(&serde_json::to_string(&p).unwrap()).unwrap();
        assert_eq!(p, back);
    }
}
