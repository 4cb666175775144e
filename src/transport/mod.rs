//! Real-time voice transport contract
//!
//! The transport is an opaque peer: it accepts start/stop/mute commands
//! and emits call, speech, message and error events through a typed
//! subscription that can be removed deterministically.

mod events;
pub mod messages;
mod nats;

pub use events::{EventBus, Subscription, SubscriptionId, TranscriptFragment, TransportEvent};
pub use nats::NatsTransport;

use crate::audio::AudioFrame;
use crate::error::RawTransportError;
use crate::session::CallConfig;

/// Command/event peer driving the actual voice call
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Start a call. Resolves once the engine accepted the request; the call
    /// is live only after a `call-start` event.
    async fn start(&self, config: &CallConfig) -> Result<(), RawTransportError>;

    async fn stop(&self) -> Result<(), RawTransportError>;

    async fn set_muted(&self, muted: bool) -> Result<(), RawTransportError>;

    /// Forward captured caller audio. Engines that capture audio themselves
    /// keep the default no-op.
    async fn send_audio(&self, _frame: &AudioFrame) -> Result<(), RawTransportError> {
        Ok(())
    }

    fn subscribe(&self) -> Subscription;

    fn unsubscribe(&self, id: SubscriptionId);

    /// Transport name for logging
    fn name(&self) -> &str;
}
