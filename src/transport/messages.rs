use super::events::TransportEvent;
use crate::error::RawTransportError;
use serde::{Deserialize, Serialize};

/// Command sent to the voice engine on `voice.command.<session>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum CommandMessage {
    Start { config: serde_json::Value },
    Stop,
    Mute { muted: bool },
}

/// Reply to a `start` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandReply {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RawTransportError>,
}

/// Event envelope received on `voice.event.<session>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum EventEnvelope {
    CallStart,
    CallEnd,
    SpeechStart,
    SpeechEnd,
    Message { message: serde_json::Value },
    Error { error: RawTransportError },
}

impl From<EventEnvelope> for TransportEvent {
    fn from(envelope: EventEnvelope) -> Self {
        match envelope {
            EventEnvelope::CallStart => TransportEvent::CallStart,
            EventEnvelope::CallEnd => TransportEvent::CallEnd,
            EventEnvelope::SpeechStart => TransportEvent::SpeechStart,
            EventEnvelope::SpeechEnd => TransportEvent::SpeechEnd,
            EventEnvelope::Message { message } => TransportEvent::Message(message),
            EventEnvelope::Error { error } => TransportEvent::Error(error),
        }
    }
}

/// Caller audio frame published on `voice.audio.<session>`
#[derive(Debug, Serialize, Deserialize)]
pub struct AudioFrameMessage {
    pub session_id: String,
    pub sequence: u32,
    pub pcm: String, // Base64-encoded PCM bytes
    pub sample_rate: u32,
    pub channels: u16,
    pub timestamp: String, // RFC3339 timestamp
}
