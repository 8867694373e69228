use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// --- Scheduling cadences ---

/// One of the four concurrent narrative cadences. Slot processing, beat
/// ordering, and freshness updates all follow `Timeline::ALL` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Timeline {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Timeline {
    /// All timelines in fixed scheduling order (daily first).
    pub const ALL: [Timeline; 4] = [
        Timeline::Daily,
        Timeline::Weekly,
        Timeline::Monthly,
        Timeline::Yearly,
    ];

    /// The next cadence up, if any. Escalations move exactly one step.
    pub fn escalated(self) -> Option<Timeline> {
        match self {
            Timeline::Daily => Some(Timeline::Weekly),
            Timeline::Weekly => Some(Timeline::Monthly),
            Timeline::Monthly => Some(Timeline::Yearly),
            Timeline::Yearly => None,
        }
    }

    /// The next cadence down, if any. Weight gating demotes one step.
    pub fn demoted(self) -> Option<Timeline> {
        match self {
            Timeline::Daily => None,
            Timeline::Weekly => Some(Timeline::Daily),
            Timeline::Monthly => Some(Timeline::Weekly),
            Timeline::Yearly => Some(Timeline::Monthly),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeline::Daily => "daily",
            Timeline::Weekly => "weekly",
            Timeline::Monthly => "monthly",
            Timeline::Yearly => "yearly",
        }
    }
}

impl std::fmt::Display for Timeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Timeline {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            other => Err(format!("unknown Timeline: {other}")),
        }
    }
}

// --- Story classification ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Quest,
    Event,
    CharacterArc,
    FactionArc,
    Lore,
}

impl ContentType {
    /// Multiplier applied as the final step of narrative weight scoring.
    pub fn weight_modifier(self) -> f64 {
        match self {
            ContentType::Event => 1.0,
            ContentType::FactionArc => 1.1,
            ContentType::CharacterArc => 0.95,
            ContentType::Quest => 1.0,
            ContentType::Lore => 0.8,
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentType::Quest => write!(f, "quest"),
            ContentType::Event => write!(f, "event"),
            ContentType::CharacterArc => write!(f, "character_arc"),
            ContentType::FactionArc => write!(f, "faction_arc"),
            ContentType::Lore => write!(f, "lore"),
        }
    }
}

impl std::str::FromStr for ContentType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "quest" => Ok(Self::Quest),
            "event" => Ok(Self::Event),
            "character_arc" => Ok(Self::CharacterArc),
            "faction_arc" => Ok(Self::FactionArc),
            "lore" => Ok(Self::Lore),
            other => Err(format!("unknown ContentType: {other}")),
        }
    }
}

// --- Lifecycle ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StoryStatus {
    Dormant,
    Active,
    Climax,
    Resolution,
    Completed,
    Abandoned,
    Archived,
}

impl std::fmt::Display for StoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoryStatus::Dormant => write!(f, "dormant"),
            StoryStatus::Active => write!(f, "active"),
            StoryStatus::Climax => write!(f, "climax"),
            StoryStatus::Resolution => write!(f, "resolution"),
            StoryStatus::Completed => write!(f, "completed"),
            StoryStatus::Abandoned => write!(f, "abandoned"),
            StoryStatus::Archived => write!(f, "archived"),
        }
    }
}

impl std::str::FromStr for StoryStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "dormant" => Ok(Self::Dormant),
            "active" => Ok(Self::Active),
            "climax" => Ok(Self::Climax),
            "resolution" => Ok(Self::Resolution),
            "completed" => Ok(Self::Completed),
            "abandoned" => Ok(Self::Abandoned),
            "archived" => Ok(Self::Archived),
            other => Err(format!("unknown StoryStatus: {other}")),
        }
    }
}

// --- Act structure ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActType {
    Setup,
    Rising,
    Climax,
    Falling,
    Resolution,
}

impl std::fmt::Display for ActType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActType::Setup => write!(f, "setup"),
            ActType::Rising => write!(f, "rising"),
            ActType::Climax => write!(f, "climax"),
            ActType::Falling => write!(f, "falling"),
            ActType::Resolution => write!(f, "resolution"),
        }
    }
}

impl std::str::FromStr for ActType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "setup" => Ok(Self::Setup),
            "rising" => Ok(Self::Rising),
            "climax" => Ok(Self::Climax),
            "falling" => Ok(Self::Falling),
            "resolution" => Ok(Self::Resolution),
            other => Err(format!("unknown ActType: {other}")),
        }
    }
}

// --- Access control ---

/// Access-control label on a story. `Ord` follows the ceiling order: a DJ
/// with a `Regional` ceiling may narrate `Common` and `Regional` stories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeTier {
    Common,
    Regional,
    Restricted,
    Classified,
}

impl std::fmt::Display for KnowledgeTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KnowledgeTier::Common => write!(f, "common"),
            KnowledgeTier::Regional => write!(f, "regional"),
            KnowledgeTier::Restricted => write!(f, "restricted"),
            KnowledgeTier::Classified => write!(f, "classified"),
        }
    }
}

impl std::str::FromStr for KnowledgeTier {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "common" => Ok(Self::Common),
            "regional" => Ok(Self::Regional),
            "restricted" => Ok(Self::Restricted),
            "classified" => Ok(Self::Classified),
            other => Err(format!("unknown KnowledgeTier: {other}")),
        }
    }
}

// --- Epistemic stance ---

/// How a DJ relates to a story on air: own knowledge, verified but distant,
/// hearsay, or guesswork about actors they cannot name with confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    Direct,
    Report,
    Rumor,
    Speculation,
}

impl std::fmt::Display for Framing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Framing::Direct => write!(f, "direct"),
            Framing::Report => write!(f, "report"),
            Framing::Rumor => write!(f, "rumor"),
            Framing::Speculation => write!(f, "speculation"),
        }
    }
}

impl std::str::FromStr for Framing {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "direct" => Ok(Self::Direct),
            "report" => Ok(Self::Report),
            "rumor" => Ok(Self::Rumor),
            "speculation" => Ok(Self::Speculation),
            other => Err(format!("unknown Framing: {other}")),
        }
    }
}

// --- Tone ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EmotionalTone {
    Hopeful,
    Tragic,
    Mysterious,
    Comedic,
    Tense,
    Neutral,
}

impl std::fmt::Display for EmotionalTone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmotionalTone::Hopeful => write!(f, "hopeful"),
            EmotionalTone::Tragic => write!(f, "tragic"),
            EmotionalTone::Mysterious => write!(f, "mysterious"),
            EmotionalTone::Comedic => write!(f, "comedic"),
            EmotionalTone::Tense => write!(f, "tense"),
            EmotionalTone::Neutral => write!(f, "neutral"),
        }
    }
}

impl std::str::FromStr for EmotionalTone {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "hopeful" => Ok(Self::Hopeful),
            "tragic" => Ok(Self::Tragic),
            "mysterious" => Ok(Self::Mysterious),
            "comedic" => Ok(Self::Comedic),
            "tense" => Ok(Self::Tense),
            "neutral" => Ok(Self::Neutral),
            other => Err(format!("unknown EmotionalTone: {other}")),
        }
    }
}

// --- Complexity rotation ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityTier {
    Simple,
    Moderate,
    Complex,
}

impl ComplexityTier {
    /// Strict rotation order used by the freshness sequencer.
    pub const ROTATION: [ComplexityTier; 3] = [
        ComplexityTier::Simple,
        ComplexityTier::Moderate,
        ComplexityTier::Complex,
    ];

    /// A story's complexity follows its act count.
    pub fn for_act_count(acts: usize) -> ComplexityTier {
        match acts {
            0..=2 => ComplexityTier::Simple,
            3..=4 => ComplexityTier::Moderate,
            _ => ComplexityTier::Complex,
        }
    }
}

impl std::fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComplexityTier::Simple => write!(f, "simple"),
            ComplexityTier::Moderate => write!(f, "moderate"),
            ComplexityTier::Complex => write!(f, "complex"),
        }
    }
}

impl std::str::FromStr for ComplexityTier {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "simple" => Ok(Self::Simple),
            "moderate" => Ok(Self::Moderate),
            "complex" => Ok(Self::Complex),
            other => Err(format!("unknown ComplexityTier: {other}")),
        }
    }
}
