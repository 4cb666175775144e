// Integration tests for live call signals

use callwaiting_voice::signals::{classify_emotion, EmotionTag, SignalEstimator};
use callwaiting_voice::transcript::{Speaker, TranscriptEntry};
use std::time::{Duration, Instant};

fn final_entry(speaker: Speaker, text: &str) -> TranscriptEntry {
    TranscriptEntry {
        speaker,
        text: text.to_string(),
        is_final: true,
        sequence: 0,
        commit: Some(0),
    }
}

#[test]
fn test_happy_wins_over_frustrated() {
    let mut estimator = SignalEstimator::new();
    let now = Instant::now();

    // Lower the score first so the +5 is observable below the clamp
    estimator.entry_finalized(&final_entry(Speaker::Caller, "this is broken"), now);
    let before = estimator.emotion().quality_score;
    assert_eq!(before, 90);

    let tag = estimator.entry_finalized(
        &final_entry(Speaker::Caller, "thank you, but I have a problem"),
        now,
    );

    assert_eq!(tag, Some(EmotionTag::Happy));
    assert_eq!(estimator.emotion().tag, EmotionTag::Happy);
    assert_eq!(estimator.emotion().quality_score, before + 5);
}

#[test]
fn test_classification_priority() {
    assert_eq!(classify_emotion("That's GREAT, thanks"), EmotionTag::Happy);
    assert_eq!(classify_emotion("still not working"), EmotionTag::Frustrated);
    assert_eq!(classify_emotion("I'm not sure what you mean"), EmotionTag::Confused);
    assert_eq!(classify_emotion("Tuesday at 3pm"), EmotionTag::Neutral);
}

#[test]
fn test_quality_score_is_clamped() {
    let mut estimator = SignalEstimator::new();
    let now = Instant::now();

    for _ in 0..20 {
        estimator.entry_finalized(&final_entry(Speaker::Caller, "this is terrible"), now);
    }
    assert_eq!(estimator.emotion().quality_score, 0);

    for _ in 0..30 {
        estimator.entry_finalized(&final_entry(Speaker::Caller, "perfect"), now);
    }
    assert_eq!(estimator.emotion().quality_score, 100);
}

#[test]
fn test_agent_text_does_not_affect_emotion() {
    let mut estimator = SignalEstimator::new();
    let tag = estimator.entry_finalized(
        &final_entry(Speaker::Agent, "sorry about the problem"),
        Instant::now(),
    );
    assert_eq!(tag, None);
    assert_eq!(estimator.emotion().tag, EmotionTag::Neutral);
    assert_eq!(estimator.emotion().quality_score, 100);
}

#[test]
fn test_latency_from_speech_end_to_agent_final() {
    let mut estimator = SignalEstimator::new();
    let t0 = Instant::now();

    estimator.speech_ended(t0);
    // Caller finals do not close the timer
    estimator.entry_finalized(&final_entry(Speaker::Caller, "hello"), t0);
    estimator.entry_finalized(
        &final_entry(Speaker::Agent, "hi"),
        t0 + Duration::from_millis(850),
    );

    assert_eq!(estimator.last_latency_ms(), Some(850));

    // Disarmed after one measurement
    estimator.entry_finalized(
        &final_entry(Speaker::Agent, "anything else?"),
        t0 + Duration::from_millis(5000),
    );
    assert_eq!(estimator.last_latency_ms(), Some(850));
}

#[test]
fn test_call_end_discards_armed_timer() {
    let mut estimator = SignalEstimator::new();
    let t0 = Instant::now();

    estimator.speech_ended(t0);
    estimator.call_ended();
    estimator.entry_finalized(
        &final_entry(Speaker::Agent, "goodbye"),
        t0 + Duration::from_millis(400),
    );

    assert_eq!(estimator.last_latency_ms(), None);
    assert_eq!(estimator.snapshot().average_latency_ms, None);
}

#[test]
fn test_speech_start_discards_armed_timer() {
    let mut estimator = SignalEstimator::new();
    let t0 = Instant::now();

    estimator.speech_ended(t0);
    estimator.speech_started();
    assert!(estimator.snapshot().caller_speaking);

    estimator.entry_finalized(
        &final_entry(Speaker::Agent, "yes?"),
        t0 + Duration::from_millis(200),
    );
    assert_eq!(estimator.last_latency_ms(), None);
}
