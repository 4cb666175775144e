use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced a transcript fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Caller,
    Agent,
}

impl Speaker {
    /// Map a transport role (`user`, `assistant`, `bot`) to a speaker
    pub fn from_role(role: &str) -> Option<Self> {
        match role {
            "user" | "caller" => Some(Speaker::Caller),
            "assistant" | "bot" | "agent" => Some(Speaker::Agent),
            _ => None,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Speaker::Caller => 0,
            Speaker::Agent => 1,
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::Caller => f.write_str("caller"),
            Speaker::Agent => f.write_str("agent"),
        }
    }
}

/// One utterance in the reconciled history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,

    /// Cumulative text for this utterance
    pub text: String,

    pub is_final: bool,

    /// Insertion order, fixed for the entry's lifetime
    pub sequence: u64,

    /// Commit order, assigned when the entry is frozen
    pub commit: Option<u64>,
}
