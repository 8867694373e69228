//! Per-broadcast composition: arrange the emitted beats, pick transition
//! phrases from the fixed table, surface callbacks to recently completed
//! stories. The weaver arranges; it never writes story content.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use deadair_common::types::{ArchivedStory, StoryBeat};
use deadair_world::types::{ActType, Timeline};

/// How many archived completions the callback scan looks back over.
const CALLBACK_LOOKBACK: usize = 5;

/// Reference to a recently completed story sharing subjects with this
/// broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Callback {
    pub story_id: String,
    pub title: String,
    /// The overlapping subjects that justify bringing it back up.
    pub shared_subjects: Vec<String>,
}

/// The single packet the core hands to the external script generator each
/// tick. Empty is a normal steady state, not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BeatPacket {
    /// At most four beats, in daily → weekly → monthly → yearly order.
    pub ordered_beats: Vec<StoryBeat>,
    /// One transition hint per adjacent beat pair.
    pub transitions: Vec<String>,
    pub callbacks: Vec<Callback>,
    /// Set when an external emergency suppressed story beats this tick.
    pub emergency_preempt: bool,
}

/// Transition phrase for a beat pair, keyed by the two cadences. The fixed
/// emission order makes ascending pairs the only ones that occur.
pub fn transition_phrase(prev: Timeline, next: Timeline) -> &'static str {
    use Timeline::*;
    match (prev, next) {
        (Daily, Weekly) => "And while today keeps moving, there's a bigger story still unfolding.",
        (Daily, Monthly) => "Step back with me now, this one's been building for a while.",
        (Daily, Yearly) => "Now for the long story, the one the whole wasteland is living through.",
        (Weekly, Monthly) => "That thread ties into something larger out there.",
        (Weekly, Yearly) => "And beyond the week's troubles, the big picture keeps turning.",
        (Monthly, Yearly) => "Which brings us back to the story of the age.",
        // Same-cadence or descending pairs never occur in a packet; keep a
        // neutral bridge so a malformed caller still gets usable text.
        _ => "But that's not the only thing happening out there.",
    }
}

/// Intro hint for a beat, keyed by its act type.
pub fn intro_hint(act_type: ActType) -> &'static str {
    match act_type {
        ActType::Setup => "Word's just starting to get around about this one.",
        ActType::Rising => "This story's been picking up steam.",
        ActType::Climax => "Hold on to something, because this is where it all comes to a head.",
        ActType::Falling => "The dust is starting to settle on this one.",
        ActType::Resolution => "Time to close the book on a story you've heard me tell.",
    }
}

/// Outro hint for a beat, keyed by its act type.
pub fn outro_hint(act_type: ActType) -> &'static str {
    match act_type {
        ActType::Setup => "Keep your ears on, I have a feeling there's more coming.",
        ActType::Rising => "I'll let you know the moment anything breaks.",
        ActType::Climax => "Stay tuned, nobody knows how this one lands yet.",
        ActType::Falling => "We'll see what's left standing when it's all done.",
        ActType::Resolution => "And that, friends, is how it ended.",
    }
}

/// Assemble the packet for one broadcast. `beats` must already be in slot
/// order with positions assigned; `completed` is the completed archive,
/// newest last.
pub fn compose(
    beats: Vec<StoryBeat>,
    completed: &[ArchivedStory],
    emergency_preempt: bool,
) -> BeatPacket {
    if emergency_preempt {
        return BeatPacket {
            ordered_beats: Vec::new(),
            transitions: Vec::new(),
            callbacks: Vec::new(),
            emergency_preempt: true,
        };
    }

    let transitions = beats
        .windows(2)
        .map(|pair| transition_phrase(pair[0].timeline, pair[1].timeline).to_string())
        .collect();

    let callbacks = find_callbacks(&beats, completed);

    BeatPacket {
        ordered_beats: beats,
        transitions,
        callbacks,
        emergency_preempt: false,
    }
}

fn find_callbacks(beats: &[StoryBeat], completed: &[ArchivedStory]) -> Vec<Callback> {
    if beats.is_empty() {
        return Vec::new();
    }
    let mut subjects = std::collections::BTreeSet::new();
    for beat in beats {
        subjects.extend(beat.entities.iter().cloned());
        subjects.extend(beat.themes.iter().cloned());
    }
    let on_air: std::collections::BTreeSet<&String> =
        beats.iter().map(|b| &b.story_id).collect();

    completed
        .iter()
        .rev()
        .take(CALLBACK_LOOKBACK)
        .filter(|archived| !on_air.contains(&archived.id))
        .filter_map(|archived| {
            let shared: Vec<String> = archived
                .themes
                .iter()
                .chain(archived.entities.iter())
                .filter(|s| subjects.contains(*s))
                .cloned()
                .collect();
            if shared.is_empty() {
                None
            } else {
                Some(Callback {
                    story_id: archived.id.clone(),
                    title: archived.title.clone(),
                    shared_subjects: shared,
                })
            }
        })
        .collect()
}
