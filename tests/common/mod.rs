// Scripted fakes shared by the integration tests
#![allow(dead_code)]

use callwaiting_voice::audio::{AudioFrame, AudioTrack, MicrophoneConstraints, MicrophoneSource, MicrophoneStream};
use callwaiting_voice::error::{MicrophoneError, RawTransportError};
use callwaiting_voice::session::CallConfig;
use callwaiting_voice::transport::{EventBus, Subscription, SubscriptionId, Transport, TransportEvent};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// What the fake transport does on one `start()` call
#[derive(Debug, Clone)]
pub enum StartScript {
    /// Resolve and emit `call-start`
    Accept,
    /// Resolve without emitting anything
    AcceptSilently,
    /// Reject with the given error
    Reject(RawTransportError),
    /// Resolve, then emit an `error` event instead of `call-start`
    AcceptThenError(RawTransportError),
    /// Never resolve
    Hang,
}

/// Transport double: scripted `start` outcomes and command counters
#[derive(Default)]
pub struct MockTransport {
    bus: EventBus,
    script: Mutex<VecDeque<StartScript>>,
    /// Used once the script is exhausted
    fallback: Mutex<Option<StartScript>>,
    pub start_calls: AtomicUsize,
    pub stop_calls: AtomicUsize,
    pub mute_calls: AtomicUsize,
    pub frames_sent: AtomicUsize,
    pub reject_mute: AtomicBool,
    configs: Mutex<Vec<CallConfig>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Transport that plays `script` in order, then accepts
    pub fn scripted(script: impl IntoIterator<Item = StartScript>) -> Arc<Self> {
        let transport = Self::default();
        transport.script.lock().unwrap().extend(script);
        Arc::new(transport)
    }

    /// Transport that behaves the same on every `start()`
    pub fn always(behaviour: StartScript) -> Arc<Self> {
        let transport = Self::default();
        *transport.fallback.lock().unwrap() = Some(behaviour);
        Arc::new(transport)
    }

    pub fn emit(&self, event: TransportEvent) {
        self.bus.emit(event);
    }

    pub fn transcript(&self, role: &str, text: &str, is_final: bool) {
        self.emit(TransportEvent::Message(serde_json::json!({
            "type": "transcript",
            "role": role,
            "transcript": text,
            "transcriptType": if is_final { "final" } else { "partial" },
        })));
    }

    pub fn starts(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn subscribers(&self) -> usize {
        self.bus.subscriber_count()
    }

    /// Configs passed to `start()`, in call order
    pub fn configs(&self) -> Vec<CallConfig> {
        self.configs.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn start(&self, config: &CallConfig) -> Result<(), RawTransportError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.configs.lock().unwrap().push(config.clone());

        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.lock().unwrap().clone())
            .unwrap_or(StartScript::Accept);

        match step {
            StartScript::Accept => {
                self.bus.emit(TransportEvent::CallStart);
                Ok(())
            }
            StartScript::AcceptSilently => Ok(()),
            StartScript::Reject(err) => Err(err),
            StartScript::AcceptThenError(err) => {
                self.bus.emit(TransportEvent::Error(err));
                Ok(())
            }
            StartScript::Hang => std::future::pending().await,
        }
    }

    async fn stop(&self) -> Result<(), RawTransportError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_muted(&self, _muted: bool) -> Result<(), RawTransportError> {
        self.mute_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_mute.load(Ordering::SeqCst) {
            return Err(RawTransportError::new("mute rejected"));
        }
        Ok(())
    }

    async fn send_audio(&self, _frame: &AudioFrame) -> Result<(), RawTransportError> {
        self.frames_sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.bus.unsubscribe(id);
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Track that counts every `stop()` call
pub struct CountingTrack {
    stops: Arc<AtomicUsize>,
}

impl AudioTrack for CountingTrack {
    fn label(&self) -> &str {
        "mock-track"
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.stops.load(Ordering::SeqCst) == 0
    }
}

#[derive(Debug, Clone)]
pub enum MicBehaviour {
    Grant,
    Deny(MicrophoneError),
    /// Permission prompt never answered
    Pending,
    /// Grant after a delay
    GrantAfter(Duration),
}

/// Microphone double with a counted track
pub struct MockMicrophone {
    behaviour: MicBehaviour,
    pub acquire_calls: AtomicUsize,
    pub track_stops: Arc<AtomicUsize>,
    frames: Mutex<Option<broadcast::Sender<AudioFrame>>>,
}

impl MockMicrophone {
    pub fn new(behaviour: MicBehaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            acquire_calls: AtomicUsize::new(0),
            track_stops: Arc::new(AtomicUsize::new(0)),
            frames: Mutex::new(None),
        })
    }

    pub fn granting() -> Arc<Self> {
        Self::new(MicBehaviour::Grant)
    }

    pub fn stops(&self) -> usize {
        self.track_stops.load(Ordering::SeqCst)
    }

    /// Push a frame into the most recently granted stream
    pub fn push(&self, frame: AudioFrame) -> usize {
        match self.frames.lock().unwrap().as_ref() {
            Some(tx) => tx.send(frame).unwrap_or(0),
            None => 0,
        }
    }

    fn grant(&self) -> MicrophoneStream {
        let (tx, _) = broadcast::channel(64);
        *self.frames.lock().unwrap() = Some(tx.clone());
        let track: Arc<dyn AudioTrack> = Arc::new(CountingTrack {
            stops: Arc::clone(&self.track_stops),
        });
        MicrophoneStream::new(vec![track], tx)
    }
}

#[async_trait::async_trait]
impl MicrophoneSource for MockMicrophone {
    async fn acquire(
        &self,
        _constraints: &MicrophoneConstraints,
    ) -> Result<MicrophoneStream, MicrophoneError> {
        self.acquire_calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            MicBehaviour::Grant => Ok(self.grant()),
            MicBehaviour::Deny(err) => Err(err.clone()),
            MicBehaviour::Pending => std::future::pending().await,
            MicBehaviour::GrantAfter(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(self.grant())
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

pub fn connection_error() -> RawTransportError {
    RawTransportError::with_type("Connection timed out", "daily-call-join-error")
}

pub fn voice_error() -> RawTransportError {
    RawTransportError::new("Couldn't find voice 'harry' for provider")
}

pub fn frame(samples: Vec<i16>) -> AudioFrame {
    AudioFrame {
        samples,
        sample_rate: 16000,
        channels: 1,
        timestamp_ms: 0,
    }
}

/// Let spawned tasks run until they block
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
