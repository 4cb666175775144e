use crate::error::CallError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Call lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    #[default]
    Idle,
    AcquiringMicrophone,
    Connecting,
    Active,
    Ending,
    Failed,
}

impl CallState {
    /// A call is starting, live, or being torn down
    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            CallState::AcquiringMicrophone
                | CallState::Connecting
                | CallState::Active
                | CallState::Ending
        )
    }
}

/// Observable snapshot of the current call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallSession {
    /// Identifier of the most recent `start_call`
    pub call_id: Option<String>,

    pub state: CallState,

    /// Current connect attempt (0-based)
    pub attempt: u32,

    pub started_at: Option<DateTime<Utc>>,

    pub ended_at: Option<DateTime<Utc>>,

    /// Most recent classified error; cleared when a call connects
    pub last_error: Option<CallError>,

    pub muted: bool,
}
