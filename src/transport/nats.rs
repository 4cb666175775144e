use super::events::{EventBus, Subscription, SubscriptionId, TransportEvent};
use super::messages::{AudioFrameMessage, CommandMessage, CommandReply, EventEnvelope};
use super::Transport;
use crate::audio::AudioFrame;
use crate::error::RawTransportError;
use crate::session::CallConfig;
use anyhow::{Context, Result};
use async_nats::Client;
use base64::Engine;
use futures::stream::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Voice engine reached over NATS
///
/// Commands go to `voice.command.<session>`, events arrive on
/// `voice.event.<session>` and caller audio is published to
/// `voice.audio.<session>`.
pub struct NatsTransport {
    client: Client,
    session_id: String,
    bus: Arc<EventBus>,
    muted: AtomicBool,
    frame_sequence: AtomicU32,
    listener: JoinHandle<()>,
}

impl NatsTransport {
    /// Connect to NATS and start listening for engine events
    pub async fn connect(url: &str, session_id: String) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        let subject = event_subject(&session_id);
        let mut subscriber = client
            .subscribe(subject.clone())
            .await
            .context("Failed to subscribe to voice events")?;

        info!("Subscribed to {}", subject);

        let bus = Arc::new(EventBus::new());
        let listener_bus = Arc::clone(&bus);
        let listener = tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                match serde_json::from_slice::<EventEnvelope>(&msg.payload) {
                    Ok(envelope) => {
                        let event = TransportEvent::from(envelope);
                        debug!("Voice event: {}", event.name());
                        listener_bus.emit(event);
                    }
                    Err(e) => {
                        warn!("Failed to parse voice event: {}", e);
                    }
                }
            }
            info!("Voice event listener stopped");
        });

        Ok(Self {
            client,
            session_id,
            bus,
            muted: AtomicBool::new(false),
            frame_sequence: AtomicU32::new(0),
            listener,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn publish_command(&self, command: &CommandMessage) -> Result<(), RawTransportError> {
        let payload = serde_json::to_vec(command)
            .map_err(|e| RawTransportError::with_type(e.to_string(), "serialization"))?;

        self.client
            .publish(command_subject(&self.session_id), payload.into())
            .await
            .map_err(|e| {
                RawTransportError::with_type(format!("connection error: {}", e), "publish")
            })
    }
}

fn command_subject(session_id: &str) -> String {
    format!("voice.command.{}", session_id)
}

fn event_subject(session_id: &str) -> String {
    format!("voice.event.{}", session_id)
}

fn audio_subject(session_id: &str) -> String {
    format!("voice.audio.{}", session_id)
}

#[async_trait::async_trait]
impl Transport for NatsTransport {
    async fn start(&self, config: &CallConfig) -> Result<(), RawTransportError> {
        let command = CommandMessage::Start {
            config: config.to_value(),
        };
        let payload = serde_json::to_vec(&command)
            .map_err(|e| RawTransportError::with_type(e.to_string(), "serialization"))?;

        info!("Requesting call start on {}", command_subject(&self.session_id));

        let reply = self
            .client
            .request(command_subject(&self.session_id), payload.into())
            .await
            // Request failures are no-responders/timeouts, i.e. connection class
            .map_err(|e| {
                RawTransportError::with_type(format!("connection failed: {}", e), "request")
            })?;

        let reply: CommandReply = serde_json::from_slice(&reply.payload).map_err(|e| {
            RawTransportError::with_type(format!("malformed start reply: {}", e), "protocol")
        })?;

        if reply.ok {
            self.muted.store(false, Ordering::SeqCst);
            Ok(())
        } else {
            Err(reply
                .error
                .unwrap_or_else(|| RawTransportError::new("start rejected without a reason")))
        }
    }

    async fn stop(&self) -> Result<(), RawTransportError> {
        info!("Requesting call stop");
        self.publish_command(&CommandMessage::Stop).await
    }

    async fn set_muted(&self, muted: bool) -> Result<(), RawTransportError> {
        self.publish_command(&CommandMessage::Mute { muted }).await?;
        self.muted.store(muted, Ordering::SeqCst);
        info!("Microphone {}", if muted { "muted" } else { "unmuted" });
        Ok(())
    }

    async fn send_audio(&self, frame: &AudioFrame) -> Result<(), RawTransportError> {
        if self.muted.load(Ordering::SeqCst) {
            return Ok(());
        }

        let message = AudioFrameMessage {
            session_id: self.session_id.clone(),
            sequence: self.frame_sequence.fetch_add(1, Ordering::SeqCst),
            pcm: base64::engine::general_purpose::STANDARD.encode(frame.to_pcm_bytes()),
            sample_rate: frame.sample_rate,
            channels: frame.channels,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        let payload = serde_json::to_vec(&message)
            .map_err(|e| RawTransportError::with_type(e.to_string(), "serialization"))?;

        self.client
            .publish(audio_subject(&self.session_id), payload.into())
            .await
            .map_err(|e| {
                error!("Failed to publish audio frame: {}", e);
                RawTransportError::with_type(format!("connection error: {}", e), "publish")
            })
    }

    fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.bus.unsubscribe(id);
    }

    fn name(&self) -> &str {
        "nats"
    }
}

impl Drop for NatsTransport {
    fn drop(&mut self) {
        self.listener.abort();
    }
}
