use serde::{Deserialize, Serialize};

/// Perceived caller emotion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionTag {
    #[default]
    Neutral,
    Happy,
    Frustrated,
    Confused,
}

impl EmotionTag {
    /// Quality score adjustment applied when this tag is assigned
    pub fn quality_delta(self) -> i32 {
        match self {
            EmotionTag::Happy => 5,
            EmotionTag::Frustrated => -10,
            EmotionTag::Confused => -5,
            EmotionTag::Neutral => 0,
        }
    }
}

const HAPPY_KEYWORDS: &[&str] = &[
    "thank",
    "great",
    "perfect",
    "awesome",
    "excellent",
    "wonderful",
    "appreciate",
    "helpful",
    "love",
];

const FRUSTRATED_KEYWORDS: &[&str] = &[
    "problem",
    "issue",
    "frustrat",
    "annoy",
    "angry",
    "terrible",
    "not working",
    "broken",
    "ridiculous",
    "waste",
];

const CONFUSED_KEYWORDS: &[&str] = &[
    "confus",
    "don't understand",
    "do not understand",
    "not sure",
    "what do you mean",
    "unclear",
    "say that again",
];

/// Classify caller text by keyword containment.
///
/// Sets are checked happy, frustrated, confused in that order and the first
/// match wins, so "thank you, but I have a problem" is happy.
pub fn classify_emotion(text: &str) -> EmotionTag {
    let lower = text.to_lowercase();
    let contains_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if contains_any(HAPPY_KEYWORDS) {
        EmotionTag::Happy
    } else if contains_any(FRUSTRATED_KEYWORDS) {
        EmotionTag::Frustrated
    } else if contains_any(CONFUSED_KEYWORDS) {
        EmotionTag::Confused
    } else {
        EmotionTag::Neutral
    }
}

/// Current emotion tag and cumulative quality score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionSignal {
    pub tag: EmotionTag,
    /// Clamped to [0, 100]
    pub quality_score: u8,
}

impl EmotionSignal {
    pub const MAX_QUALITY: u8 = 100;

    /// Assign a new tag and apply its quality delta
    pub fn apply(&mut self, tag: EmotionTag) {
        self.tag = tag;
        let score = i32::from(self.quality_score) + tag.quality_delta();
        self.quality_score = score.clamp(0, i32::from(Self::MAX_QUALITY)) as u8;
    }
}

impl Default for EmotionSignal {
    fn default() -> Self {
        Self {
            tag: EmotionTag::Neutral,
            quality_score: Self::MAX_QUALITY,
        }
    }
}
