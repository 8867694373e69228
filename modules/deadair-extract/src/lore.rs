//! Canon enforcement. Every check returns rejections as values; the caller
//! decides whether to discard or demote the candidate.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use deadair_common::error::Rejection;
use deadair_common::types::{CanonTables, Story};

fn cooperation_keywords() -> &'static Regex {
    static KEYWORDS: OnceLock<Regex> = OnceLock::new();
    KEYWORDS.get_or_init(|| {
        Regex::new(r"(?i)\b(allian\w*|allied|cooperat\w*|joint|together|truce|treat(y|ies)|partner\w*)\b")
            .expect("static regex")
    })
}

pub struct LoreValidator<'a> {
    canon: &'a CanonTables,
}

impl<'a> LoreValidator<'a> {
    pub fn new(canon: &'a CanonTables) -> Self {
        Self { canon }
    }

    /// Run every canon check. An empty list means the story may be pooled.
    pub fn check(&self, story: &Story) -> Vec<Rejection> {
        let mut rejections = Vec::new();
        self.check_cooperation(story, &mut rejections);
        self.check_faction_eras(story, &mut rejections);
        self.check_canon_events(story, &mut rejections);
        self.check_year_ordering(story, &mut rejections);
        if !rejections.is_empty() {
            debug!(
                story = story.id,
                count = rejections.len(),
                "story failed canon validation"
            );
        }
        rejections
    }

    /// A story "claims cooperation" when its act text or themes carry
    /// cooperation language. Hostile factions merely appearing together is
    /// fine; that is what wars look like on the radio.
    fn claims_cooperation(story: &Story) -> bool {
        if story
            .themes
            .iter()
            .any(|t| matches!(t.as_str(), "alliance" | "cooperation" | "unity"))
        {
            return true;
        }
        let re = cooperation_keywords();
        story
            .acts
            .iter()
            .any(|a| re.is_match(&a.title) || re.is_match(&a.summary))
    }

    fn check_cooperation(&self, story: &Story, out: &mut Vec<Rejection>) {
        if !Self::claims_cooperation(story) {
            return;
        }
        let factions: Vec<&String> = story.factions.iter().collect();
        for (i, a) in factions.iter().enumerate() {
            for b in &factions[i + 1..] {
                if self.canon.relation(a, b).forbids_cooperation() {
                    out.push(Rejection::CanonConflict {
                        detail: format!("{a} and {b} portrayed as cooperating while hostile"),
                    });
                }
            }
        }
    }

    fn check_faction_eras(&self, story: &Story, out: &mut Vec<Rejection>) {
        let (year_min, year_max) = match (story.year_min, story.year_max) {
            (Some(min), Some(max)) => (min, max),
            (Some(y), None) | (None, Some(y)) => (y, y),
            (None, None) => return, // timeless story, nothing to check
        };
        for faction in &story.factions {
            if let Some(lifespan) = self.canon.lifespan(faction) {
                if !lifespan.exists_during(year_min, year_max) {
                    let dissolved = lifespan
                        .dissolved
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "present".to_string());
                    out.push(Rejection::FactionAnachronism {
                        faction: faction.clone(),
                        detail: format!(
                            "active {} to {dissolved}, story spans {year_min}-{year_max}",
                            lifespan.founded
                        ),
                    });
                }
            }
        }
    }

    fn check_canon_events(&self, story: &Story, out: &mut Vec<Rejection>) {
        for (event, canonical) in self.canon.events() {
            for act in &story.acts {
                let mentioned = act.title.to_lowercase().contains(event)
                    || act.summary.to_lowercase().contains(event);
                if !mentioned {
                    continue;
                }
                if let Some(claimed) = act.year {
                    if claimed != canonical {
                        out.push(Rejection::EventDateMismatch {
                            event: event.to_string(),
                            claimed,
                            canonical,
                        });
                    }
                }
            }
            // A story pinned to a single year that names the event in its
            // title makes the same claim without act years.
            if story.title.to_lowercase().contains(event) {
                if let (Some(min), Some(max)) = (story.year_min, story.year_max) {
                    if min == max && min != canonical {
                        out.push(Rejection::EventDateMismatch {
                            event: event.to_string(),
                            claimed: min,
                            canonical,
                        });
                    }
                }
            }
        }
    }

    fn check_year_ordering(&self, story: &Story, out: &mut Vec<Rejection>) {
        if let (Some(min), Some(max)) = (story.year_min, story.year_max) {
            if min > max {
                out.push(Rejection::CanonConflict {
                    detail: format!("year bounds inverted: {min} > {max}"),
                });
            }
        }
        let mut last_year: Option<i32> = None;
        for act in &story.acts {
            if let Some(year) = act.year {
                if let Some(prev) = last_year {
                    if year < prev {
                        out.push(Rejection::CanonConflict {
                            detail: format!(
                                "act {} steps back in time ({year} after {prev})",
                                act.number
                            ),
                        });
                    }
                }
                last_year = Some(year);
            }
        }
    }
}
