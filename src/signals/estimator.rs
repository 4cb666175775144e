use super::emotion::{classify_emotion, EmotionSignal, EmotionTag};
use super::latency::LatencyTimer;
use crate::transcript::{Speaker, TranscriptEntry};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// Point-in-time view of the estimator for status views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalSnapshot {
    pub emotion: EmotionSignal,
    pub caller_speaking: bool,
    pub last_latency_ms: Option<u64>,
    pub average_latency_ms: Option<u64>,
}

/// Keyword emotion heuristic plus response latency timer
///
/// Only entries that just became final are fed in. Interim text never
/// moves the emotion tag.
#[derive(Debug, Default, Clone)]
pub struct SignalEstimator {
    emotion: EmotionSignal,
    latency: LatencyTimer,
    caller_speaking: bool,
}

impl SignalEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caller started talking; a half-open latency timer is discarded
    pub fn speech_started(&mut self) {
        self.caller_speaking = true;
        self.latency.disarm();
    }

    /// Caller stopped talking; arms the latency timer
    pub fn speech_ended(&mut self, now: Instant) {
        self.caller_speaking = false;
        self.latency.arm(now);
    }

    /// Feed an entry that has just transitioned to final.
    ///
    /// Returns the new emotion tag for caller entries.
    pub fn entry_finalized(&mut self, entry: &TranscriptEntry, now: Instant) -> Option<EmotionTag> {
        if !entry.is_final {
            return None;
        }

        match entry.speaker {
            Speaker::Caller => {
                let tag = classify_emotion(&entry.text);
                self.emotion.apply(tag);
                debug!(
                    "Caller emotion: {:?} (quality={})",
                    tag, self.emotion.quality_score
                );
                Some(tag)
            }
            Speaker::Agent => {
                if let Some(ms) = self.latency.complete(now) {
                    debug!("Agent response latency: {}ms", ms);
                }
                None
            }
        }
    }

    /// Call ended; any armed timer is discarded
    pub fn call_ended(&mut self) {
        self.caller_speaking = false;
        self.latency.disarm();
    }

    pub fn emotion(&self) -> EmotionSignal {
        self.emotion
    }

    pub fn last_latency_ms(&self) -> Option<u64> {
        self.latency.last_latency_ms()
    }

    pub fn snapshot(&self) -> SignalSnapshot {
        SignalSnapshot {
            emotion: self.emotion,
            caller_speaking: self.caller_speaking,
            last_latency_ms: self.latency.last_latency_ms(),
            average_latency_ms: self.latency.average_latency_ms(),
        }
    }
}
