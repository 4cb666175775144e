use super::state::{CallSession, CallState};
use crate::signals::{EmotionTag, SignalSnapshot};
use crate::transcript::{Speaker, TranscriptEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of the current (or last) call for status views
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallStats {
    pub call_id: Option<String>,

    pub state: CallState,

    /// When the call went live
    pub started_at: Option<DateTime<Utc>>,

    /// Seconds since the call went live (frozen once it ends)
    pub duration_secs: f64,

    /// Entries in the transcript, by speaker
    pub caller_entries: usize,
    pub agent_entries: usize,

    pub emotion: EmotionTag,

    pub quality_score: u8,

    pub last_latency_ms: Option<u64>,

    pub average_latency_ms: Option<u64>,

    pub muted: bool,

    /// Latest microphone level (0-100)
    pub audio_level: u8,
}

impl CallStats {
    pub fn collect(
        session: &CallSession,
        transcript: &[TranscriptEntry],
        signals: &SignalSnapshot,
        audio_level: u8,
    ) -> Self {
        let duration_secs = session
            .started_at
            .map(|start| {
                let end = session.ended_at.unwrap_or_else(Utc::now);
                end.signed_duration_since(start).num_milliseconds().max(0) as f64 / 1000.0
            })
            .unwrap_or(0.0);

        let count = |speaker| transcript.iter().filter(|e| e.speaker == speaker).count();

        Self {
            call_id: session.call_id.clone(),
            state: session.state,
            started_at: session.started_at,
            duration_secs,
            caller_entries: count(Speaker::Caller),
            agent_entries: count(Speaker::Agent),
            emotion: signals.emotion.tag,
            quality_score: signals.emotion.quality_score,
            last_latency_ms: signals.last_latency_ms,
            average_latency_ms: signals.average_latency_ms,
            muted: session.muted,
            audio_level,
        }
    }
}
