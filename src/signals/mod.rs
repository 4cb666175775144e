//! Live call signals derived from the reconciled transcript
//!
//! - Emotion tag and quality score from finalized caller entries
//! - Response latency between caller speech-end and the next agent final

mod emotion;
mod estimator;
mod latency;

pub use emotion::{classify_emotion, EmotionSignal, EmotionTag};
pub use estimator::{SignalEstimator, SignalSnapshot};
pub use latency::LatencyTimer;
