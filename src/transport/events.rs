use crate::error::RawTransportError;
use crate::transcript::Speaker;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;

/// Event emitted by the transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    CallStart,
    CallEnd,
    /// Caller started talking
    SpeechStart,
    /// Caller stopped talking
    SpeechEnd,
    /// Arbitrary message; transcripts are extracted with [`TranscriptFragment::from_message`]
    Message(serde_json::Value),
    Error(RawTransportError),
}

impl TransportEvent {
    /// Event name as the transport spells it
    pub fn name(&self) -> &'static str {
        match self {
            TransportEvent::CallStart => "call-start",
            TransportEvent::CallEnd => "call-end",
            TransportEvent::SpeechStart => "speech-start",
            TransportEvent::SpeechEnd => "speech-end",
            TransportEvent::Message(_) => "message",
            TransportEvent::Error(_) => "error",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptPayload {
    #[serde(rename = "type")]
    kind: String,
    role: String,
    transcript: String,
    #[serde(default)]
    transcript_type: Option<String>,
    #[serde(default)]
    is_final: Option<bool>,
}

/// One transcript fragment carried by a `message` event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptFragment {
    pub speaker: Speaker,
    pub text: String,
    pub is_final: bool,
}

impl TranscriptFragment {
    /// Extract a fragment from a transport message.
    ///
    /// Returns `None` for anything that is not a transcript from a known role.
    pub fn from_message(message: &serde_json::Value) -> Option<Self> {
        let payload = TranscriptPayload::deserialize(message).ok()?;
        if payload.kind != "transcript" {
            return None;
        }

        let speaker = Speaker::from_role(&payload.role)?;
        let is_final = match payload.transcript_type.as_deref() {
            Some("final") => true,
            Some("partial") => false,
            Some(_) => return None,
            None => payload.is_final.unwrap_or(false),
        };

        Some(Self {
            speaker,
            text: payload.transcript,
            is_final,
        })
    }
}

/// Identifies one subscription on an [`EventBus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Receiving end of an event subscription
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    /// Discard queued events, returning how many were dropped
    pub fn drain(&mut self) -> usize {
        let mut dropped = 0;
        while self.events.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

/// Fan-out of transport events to subscribers
///
/// Unsubscribing drops the sender, so the subscriber's receiver ends once
/// it has drained what was already queued.
#[derive(Debug, Default)]
pub struct EventBus {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<SubscriptionId, mpsc::UnboundedSender<TransportEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);
        debug!("Transport subscription {:?} added", id);
        Subscription { id, events: rx }
    }

    /// Remove a subscription. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let removed = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if removed.is_some() {
            debug!("Transport subscription {:?} removed", id);
        }
    }

    /// Deliver an event to every subscriber, dropping closed ones
    pub fn emit(&self, event: TransportEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|_, tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_final_transcript_message() {
        let msg = json!({
            "type": "transcript",
            "role": "user",
            "transcript": "hello there",
            "transcriptType": "final"
        });
        let fragment = TranscriptFragment::from_message(&msg).unwrap();
        assert_eq!(fragment.speaker, Speaker::Caller);
        assert_eq!(fragment.text, "hello there");
        assert!(fragment.is_final);
    }

    #[test]
    fn test_legacy_is_final_flag() {
        let msg = json!({
            "type": "transcript",
            "role": "assistant",
            "transcript": "hi",
            "isFinal": true
        });
        let fragment = TranscriptFragment::from_message(&msg).unwrap();
        assert_eq!(fragment.speaker, Speaker::Agent);
        assert!(fragment.is_final);
    }

    #[test]
    fn test_non_transcript_messages_ignored() {
        let update = json!({"type": "speech-update", "status": "started", "role": "assistant"});
        assert!(TranscriptFragment::from_message(&update).is_none());

        let unknown_role = json!({
            "type": "transcript",
            "role": "system",
            "transcript": "x",
            "transcriptType": "final"
        });
        assert!(TranscriptFragment::from_message(&unknown_role).is_none());

        assert!(TranscriptFragment::from_message(&json!("text")).is_none());
    }

    #[tokio::test]
    async fn test_unsubscribe_ends_stream() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        bus.emit(TransportEvent::CallStart);
        bus.unsubscribe(sub.id);
        bus.emit(TransportEvent::CallEnd);

        assert_eq!(sub.recv().await, Some(TransportEvent::CallStart));
        assert_eq!(sub.recv().await, None);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
