//! Structural checks a story must pass before entering any pool.

use crate::config::SchedulerPolicy;
use crate::types::{Story, MAX_ACTS};

/// Returns every structural problem found. Empty means pool-eligible.
pub fn structure_errors(story: &Story, policy: &SchedulerPolicy) -> Vec<String> {
    let mut errors = Vec::new();

    if story.acts.is_empty() {
        errors.push("story has no acts".to_string());
    }
    if story.acts.len() > MAX_ACTS {
        errors.push(format!(
            "story has {} acts (max {MAX_ACTS})",
            story.acts.len()
        ));
    }
    for (i, act) in story.acts.iter().enumerate() {
        let expected = (i + 1) as u32;
        if act.number != expected {
            errors.push(format!(
                "act numbering gap: position {} holds act {}",
                i + 1,
                act.number
            ));
            break;
        }
        if !(0.0..=1.0).contains(&act.conflict) {
            errors.push(format!(
                "act {} conflict {} outside [0,1]",
                act.number, act.conflict
            ));
        }
    }

    if let (Some(min), Some(max)) = (story.year_min, story.year_max) {
        if min > max {
            errors.push(format!("year_min {min} > year_max {max}"));
        }
    }

    if story.compatible_djs.is_empty() {
        errors.push("no compatible DJs".to_string());
    }

    if !(1.0..=10.0).contains(&story.narrative_weight) {
        errors.push(format!(
            "narrative weight {} outside [1.0, 10.0]",
            story.narrative_weight
        ));
    } else {
        let floor = policy.weight_floor(story.timeline);
        if story.narrative_weight < floor {
            errors.push(format!(
                "weight {:.1} under {} floor {floor:.1}",
                story.narrative_weight, story.timeline
            ));
        }
    }

    errors
}
