use super::config::{CallConfig, ControllerOptions, RetryPolicy};
use super::state::{CallSession, CallState};
use super::stats::CallStats;
use crate::audio::{
    AudioFrame, AudioLevelMeter, MicrophoneConstraints, MicrophoneSource, MicrophoneStream,
};
use crate::error::{
    classify_error, is_connection_class, CallError, CallErrorKind, RawTransportError,
};
use crate::signals::{SignalEstimator, SignalSnapshot};
use crate::transcript::{TranscriptEntry, TranscriptReconciler};
use crate::transport::{Subscription, SubscriptionId, TranscriptFragment, Transport, TransportEvent};
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Owns one voice call at a time
///
/// The controller is the only component that issues start/stop/mute to the
/// transport and the only one that releases the microphone. UI code reads
/// state through the watch channels and the snapshot getters; it never
/// mutates the session directly.
///
/// Every `start_call` captures an epoch. `end_call`, `dispose` and failure
/// teardown advance it, and any continuation holding an older epoch becomes
/// a no-op.
pub struct CallSessionController {
    shared: Arc<Shared>,
}

struct Shared {
    transport: Arc<dyn Transport>,
    microphone: Arc<dyn MicrophoneSource>,
    retry: RetryPolicy,
    constraints: MicrophoneConstraints,
    meter: AudioLevelMeter,
    session_tx: watch::Sender<CallSession>,
    epoch_tx: watch::Sender<u64>,
    updates_tx: watch::Sender<u64>,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    epoch: u64,
    disposed: bool,
    /// A transport `start` has been issued and not yet stopped
    transport_session: bool,
    microphone: Option<Arc<MicrophoneStream>>,
    subscription: Option<SubscriptionId>,
    uplink: Option<JoinHandle<()>>,
    reconciler: TranscriptReconciler,
    signals: SignalEstimator,
}

/// Resources taken out of `Inner` for release outside the lock
struct Teardown {
    stop_transport: bool,
    microphone: Option<Arc<MicrophoneStream>>,
    subscription: Option<SubscriptionId>,
    uplink: Option<JoinHandle<()>>,
}

impl Inner {
    fn take_teardown(&mut self, stop_transport: bool) -> Teardown {
        let had_session = std::mem::take(&mut self.transport_session);
        self.signals.call_ended();
        Teardown {
            stop_transport: stop_transport && had_session,
            microphone: self.microphone.take(),
            subscription: self.subscription.take(),
            uplink: self.uplink.take(),
        }
    }
}

enum ConnectOutcome {
    Connected,
    Failed(RawTransportError),
    Cancelled,
}

impl CallSessionController {
    pub fn new(
        transport: Arc<dyn Transport>,
        microphone: Arc<dyn MicrophoneSource>,
        options: ControllerOptions,
    ) -> Self {
        let (session_tx, _) = watch::channel(CallSession::default());
        let (epoch_tx, _) = watch::channel(0);
        let (updates_tx, _) = watch::channel(0);

        info!(
            "Call controller created (transport={}, microphone={}, max_attempts={})",
            transport.name(),
            microphone.name(),
            options.retry.max_attempts
        );

        Self {
            shared: Arc::new(Shared {
                transport,
                microphone,
                retry: options.retry,
                constraints: options.microphone,
                meter: AudioLevelMeter::new(options.meter),
                session_tx,
                epoch_tx,
                updates_tx,
                inner: Mutex::new(Inner::default()),
            }),
        }
    }

    /// Start a call.
    ///
    /// Rejects immediately with `AlreadyInProgress` unless the state is
    /// `Idle`. Resolves once the call is `Active`; rejects with the
    /// classified error once it is `Failed`, or with `Cancelled` when
    /// `end_call`/`dispose` interrupted the attempt.
    pub async fn start_call(&self, config: CallConfig) -> Result<CallSession, CallError> {
        self.shared.start_call(config).await
    }

    /// End the current call. No-op when idle, failed or already ending.
    pub async fn end_call(&self) -> CallSession {
        self.shared.end_call().await
    }

    /// Mute or unmute the caller. Only forwarded while `Active`; returns
    /// whether the transport applied it.
    pub async fn set_muted(&self, muted: bool) -> bool {
        self.shared.set_muted(muted).await
    }

    /// Acknowledge a failure: `Failed → Idle`. No-op in other states.
    pub fn reset(&self) -> CallSession {
        self.shared.reset()
    }

    /// Tear down from any state and refuse further calls
    pub async fn dispose(&self) {
        self.shared.dispose().await
    }

    pub fn session(&self) -> CallSession {
        self.shared.session_tx.borrow().clone()
    }

    pub fn state(&self) -> CallState {
        self.shared.session_tx.borrow().state
    }

    /// Observe session changes
    pub fn subscribe_session(&self) -> watch::Receiver<CallSession> {
        self.shared.session_tx.subscribe()
    }

    /// Observe transcript/signal changes (the value is a revision counter)
    pub fn subscribe_updates(&self) -> watch::Receiver<u64> {
        self.shared.updates_tx.subscribe()
    }

    /// Observe the microphone level (0-100)
    pub fn subscribe_level(&self) -> watch::Receiver<u8> {
        self.shared.meter.subscribe()
    }

    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.shared.lock().reconciler.entries().to_vec()
    }

    pub fn signals(&self) -> SignalSnapshot {
        self.shared.lock().signals.snapshot()
    }

    pub fn stats(&self) -> CallStats {
        let session = self.session();
        let (transcript, signals) = {
            let inner = self.shared.lock();
            (inner.reconciler.entries().to_vec(), inner.signals.snapshot())
        };
        CallStats::collect(&session, &transcript, &signals, self.shared.meter.level())
    }

    /// Whether the level meter is currently sampling
    pub fn is_metering(&self) -> bool {
        self.shared.meter.is_running()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the inner state and session if `epoch` is still
    /// current. Returns `None` for stale epochs.
    fn with_current<R>(
        &self,
        epoch: u64,
        f: impl FnOnce(&mut Inner, &mut CallSession) -> R,
    ) -> Option<R> {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return None;
        }
        let mut out = None;
        self.session_tx.send_modify(|session| out = Some(f(&mut *inner, session)));
        out
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.lock().epoch == epoch
    }

    /// Advance the epoch while holding the lock
    fn advance_epoch(&self, inner: &mut Inner) -> u64 {
        inner.epoch += 1;
        self.epoch_tx.send_replace(inner.epoch);
        inner.epoch
    }

    /// Resolves once `epoch` is no longer current
    async fn cancelled(&self, epoch: u64) {
        let mut rx = self.epoch_tx.subscribe();
        let _ = rx.wait_for(|current| *current != epoch).await;
    }

    fn bump_updates(&self) {
        self.updates_tx.send_modify(|rev| *rev += 1);
    }

    fn begin(&self) -> Result<u64, CallError> {
        let mut inner = self.lock();
        if inner.disposed {
            return Err(CallError::disposed());
        }

        let state = self.session_tx.borrow().state;
        if state != CallState::Idle {
            warn!("Call already in progress (state={:?})", state);
            return Err(CallError::already_in_progress());
        }

        let epoch = self.advance_epoch(&mut inner);
        inner.reconciler.clear();
        inner.signals = SignalEstimator::new();
        self.session_tx.send_replace(CallSession {
            call_id: Some(format!("call-{}", uuid::Uuid::new_v4())),
            state: CallState::AcquiringMicrophone,
            ..CallSession::default()
        });
        drop(inner);

        self.bump_updates();
        Ok(epoch)
    }

    async fn start_call(self: &Arc<Self>, config: CallConfig) -> Result<CallSession, CallError> {
        let epoch = self.begin()?;
        info!(epoch, "Starting call: requesting microphone");

        let acquired = tokio::select! {
            res = self.microphone.acquire(&self.constraints) => res,
            _ = self.cancelled(epoch) => {
                info!(epoch, "Call cancelled while acquiring microphone");
                return Err(CallError::cancelled());
            }
        };

        let stream = match acquired {
            Ok(stream) => Arc::new(stream),
            Err(e) => {
                warn!(epoch, "Microphone unavailable: {}", e);
                // Permission and device errors are never retried
                return Err(self.fail(epoch, CallError::from(e), false).await);
            }
        };

        let mut subscription = self.transport.subscribe();
        let stored = self.with_current(epoch, |inner, session| {
            inner.microphone = Some(Arc::clone(&stream));
            inner.subscription = Some(subscription.id);
            session.state = CallState::Connecting;
        });
        if stored.is_none() {
            // Superseded between the grant and now
            self.transport.unsubscribe(subscription.id);
            stream.release();
            return Err(CallError::cancelled());
        }
        info!(epoch, "Microphone granted ({})", stream.id());

        let mut config = config;
        let mut attempt = 0u32;
        let mut voice_fallback_used = false;

        loop {
            let connecting = self.with_current(epoch, |inner, session| {
                inner.transport_session = true;
                session.state = CallState::Connecting;
                session.attempt = attempt;
            });
            if connecting.is_none() {
                return Err(CallError::cancelled());
            }

            info!(epoch, attempt, "Connecting to {}", self.transport.name());
            let raw = match self.connect_once(epoch, &config, &mut subscription).await {
                ConnectOutcome::Connected => break,
                ConnectOutcome::Cancelled => return Err(CallError::cancelled()),
                ConnectOutcome::Failed(raw) => raw,
            };

            let kind = classify_error(&raw);
            warn!(epoch, attempt, "Connect attempt failed ({}): {}", kind, raw);

            if kind == CallErrorKind::ConfigurationError
                && !voice_fallback_used
                && config.has_voice()
            {
                voice_fallback_used = true;
                config.strip_voice();
                warn!(epoch, "Retrying with the transport's default voice");
                self.record_error(epoch, CallError::from_transport(&raw, attempt + 1));
                subscription.drain();
                continue;
            }

            // Voice failures that also look like a dropped connection keep
            // their connection retry budget
            let retryable = kind.is_retryable()
                || (kind == CallErrorKind::ConfigurationError && is_connection_class(&raw));
            if retryable && attempt + 1 < self.retry.max_attempts {
                attempt += 1;
                let backoff = self.retry.backoff(attempt);
                info!(
                    epoch,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "Retrying connection"
                );
                self.record_error(epoch, CallError::from_transport(&raw, attempt));
                if !self.sleep_unless_cancelled(epoch, backoff).await {
                    info!(epoch, "Retry abandoned after cancellation");
                    return Err(CallError::cancelled());
                }
                subscription.drain();
                continue;
            }

            let err = CallError::from_transport(&raw, attempt + 1);
            error!(epoch, attempts = attempt + 1, "Call failed: {}", err);
            return Err(self.fail(epoch, err, true).await);
        }

        self.activate(epoch, subscription, &stream)
    }

    async fn connect_once(
        &self,
        epoch: u64,
        config: &CallConfig,
        subscription: &mut Subscription,
    ) -> ConnectOutcome {
        let started = tokio::select! {
            res = self.transport.start(config) => res,
            _ = self.cancelled(epoch) => return ConnectOutcome::Cancelled,
        };
        if let Err(raw) = started {
            return ConnectOutcome::Failed(raw);
        }

        loop {
            let event = tokio::select! {
                event = subscription.recv() => event,
                _ = self.cancelled(epoch) => return ConnectOutcome::Cancelled,
            };

            match event {
                Some(TransportEvent::CallStart) => return ConnectOutcome::Connected,
                Some(TransportEvent::Error(raw)) => return ConnectOutcome::Failed(raw),
                Some(TransportEvent::CallEnd) => {
                    return ConnectOutcome::Failed(RawTransportError::with_type(
                        "session ended before the call started",
                        "call-end",
                    ))
                }
                Some(other) => debug!(epoch, "Ignoring {} while connecting", other.name()),
                None => {
                    return ConnectOutcome::Failed(RawTransportError::new(
                        "transport connection closed",
                    ))
                }
            }
        }
    }

    async fn sleep_unless_cancelled(&self, epoch: u64, delay: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => self.is_current(epoch),
            _ = self.cancelled(epoch) => false,
        }
    }

    fn record_error(&self, epoch: u64, err: CallError) {
        self.with_current(epoch, |_, session| session.last_error = Some(err));
    }

    fn activate(
        self: &Arc<Self>,
        epoch: u64,
        subscription: Subscription,
        stream: &Arc<MicrophoneStream>,
    ) -> Result<CallSession, CallError> {
        let activated = self.with_current(epoch, |inner, session| {
            inner.uplink = Some(self.spawn_uplink(stream.subscribe()));
            self.meter.start(stream);
            session.state = CallState::Active;
            session.started_at = Some(Utc::now());
            session.last_error = None;
            session.clone()
        });

        let Some(session) = activated else {
            return Err(CallError::cancelled());
        };

        // The pump exits on its own once teardown removes the subscription
        self.spawn_event_pump(epoch, subscription);
        info!(epoch, attempt = session.attempt, "Call active");
        Ok(session)
    }

    fn spawn_event_pump(self: &Arc<Self>, epoch: u64, mut subscription: Subscription) {
        let weak: Weak<Shared> = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                let Some(shared) = weak.upgrade() else { break };
                if !shared.is_current(epoch) {
                    debug!(epoch, "Dropping {} after teardown", event.name());
                    break;
                }
                shared.handle_event(epoch, event).await;
            }
            debug!(epoch, "Event pump stopped");
        });
    }

    fn spawn_uplink(&self, mut frames: broadcast::Receiver<AudioFrame>) -> JoinHandle<()> {
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            loop {
                match frames.recv().await {
                    Ok(frame) => {
                        if let Err(e) = transport.send_audio(&frame).await {
                            debug!("Audio uplink error: {}", e);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Audio uplink lagged by {} frames", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    async fn handle_event(&self, epoch: u64, event: TransportEvent) {
        match event {
            TransportEvent::CallStart => debug!(epoch, "Duplicate call-start ignored"),
            TransportEvent::CallEnd => {
                info!(epoch, "Transport ended the call");
                self.finish(epoch, false).await;
            }
            TransportEvent::SpeechStart => {
                self.with_active(epoch, |inner| inner.signals.speech_started());
            }
            TransportEvent::SpeechEnd => {
                let now = tokio::time::Instant::now().into_std();
                self.with_active(epoch, |inner| inner.signals.speech_ended(now));
            }
            TransportEvent::Message(message) => {
                let Some(fragment) = TranscriptFragment::from_message(&message) else {
                    return;
                };
                let now = tokio::time::Instant::now().into_std();
                self.with_active(epoch, |inner| {
                    let applied = inner.reconciler.apply_fragment(
                        fragment.speaker,
                        &fragment.text,
                        fragment.is_final,
                    );
                    if let Some(applied) = applied {
                        if applied.kind.is_final() {
                            inner.signals.entry_finalized(&applied.entry, now);
                        }
                    }
                });
            }
            TransportEvent::Error(raw) => {
                let err = CallError::from_transport(&raw, 1);
                error!(epoch, "Transport error during call: {}", raw);
                self.fail(epoch, err, true).await;
            }
        }
    }

    /// Apply a transcript/signal update if the call is still live
    fn with_active(&self, epoch: u64, f: impl FnOnce(&mut Inner)) {
        let applied = {
            let mut inner = self.lock();
            let active = self.session_tx.borrow().state == CallState::Active;
            if inner.epoch == epoch && active {
                f(&mut *inner);
                true
            } else {
                false
            }
        };
        if applied {
            self.bump_updates();
        }
    }

    /// Move to `Failed`, tear everything down and return the error to
    /// surface. Returns `Cancelled` if `epoch` is already stale.
    async fn fail(&self, epoch: u64, err: CallError, stop_transport: bool) -> CallError {
        let teardown = {
            let mut inner = self.lock();
            if inner.epoch != epoch {
                return CallError::cancelled();
            }
            self.advance_epoch(&mut inner);
            self.session_tx.send_modify(|session| {
                session.state = CallState::Failed;
                session.ended_at = Some(Utc::now());
                session.last_error = Some(err.clone());
                session.muted = false;
            });
            inner.take_teardown(stop_transport)
        };

        self.release(teardown).await;
        err
    }

    /// `Active`/`Connecting` → `Ending` → `Idle`
    async fn finish(&self, epoch: u64, stop_transport: bool) -> CallSession {
        let (teardown, ending_epoch) = {
            let mut inner = self.lock();
            if inner.epoch != epoch {
                return self.session_tx.borrow().clone();
            }
            let ending_epoch = self.advance_epoch(&mut inner);
            self.session_tx
                .send_modify(|session| session.state = CallState::Ending);
            (inner.take_teardown(stop_transport), ending_epoch)
        };

        self.release(teardown).await;

        let inner = self.lock();
        if inner.epoch == ending_epoch {
            self.session_tx.send_modify(|session| {
                session.state = CallState::Idle;
                session.ended_at = Some(Utc::now());
                session.muted = false;
            });
            info!(epoch, "Call ended");
        }
        drop(inner);
        self.session_tx.borrow().clone()
    }

    async fn end_call(&self) -> CallSession {
        let epoch = {
            let inner = self.lock();
            let state = self.session_tx.borrow().state;
            if !state.is_in_progress() || state == CallState::Ending {
                debug!("end_call ignored (state={:?})", state);
                return self.session_tx.borrow().clone();
            }
            inner.epoch
        };

        info!(epoch, "Ending call");
        self.finish(epoch, true).await
    }

    async fn set_muted(&self, muted: bool) -> bool {
        let epoch = {
            let inner = self.lock();
            if self.session_tx.borrow().state != CallState::Active {
                debug!("Mute ignored: no active call");
                return false;
            }
            inner.epoch
        };

        match self.transport.set_muted(muted).await {
            Ok(()) => self
                .with_current(epoch, |_, session| session.muted = muted)
                .is_some(),
            Err(e) => {
                warn!(epoch, "Transport rejected mute change: {}", e);
                false
            }
        }
    }

    fn reset(&self) -> CallSession {
        let _inner = self.lock();
        self.session_tx.send_if_modified(|session| {
            if session.state == CallState::Failed {
                session.state = CallState::Idle;
                session.attempt = 0;
                true
            } else {
                false
            }
        });
        self.session_tx.borrow().clone()
    }

    async fn dispose(&self) {
        let teardown = {
            let mut inner = self.lock();
            if inner.disposed {
                return;
            }
            inner.disposed = true;
            let epoch = self.advance_epoch(&mut inner);
            info!(epoch, "Disposing call controller");
            self.session_tx.send_if_modified(|session| {
                if session.state == CallState::Idle {
                    return false;
                }
                if session.state != CallState::Failed {
                    session.state = CallState::Idle;
                    session.ended_at = Some(Utc::now());
                }
                session.muted = false;
                true
            });
            inner.take_teardown(true)
        };

        self.release(teardown).await;
    }

    async fn release(&self, teardown: Teardown) {
        if let Some(uplink) = teardown.uplink {
            uplink.abort();
        }
        self.meter.stop();
        if let Some(id) = teardown.subscription {
            self.transport.unsubscribe(id);
        }
        if teardown.stop_transport {
            if let Err(e) = self.transport.stop().await {
                warn!("Transport stop failed: {}", e);
            }
        }
        if let Some(stream) = teardown.microphone {
            stream.release();
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let teardown = self
            .inner
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take_teardown(true);

        if let Some(uplink) = teardown.uplink {
            uplink.abort();
        }
        if let Some(id) = teardown.subscription {
            self.transport.unsubscribe(id);
        }
        if let Some(stream) = teardown.microphone {
            stream.release();
        }
        if teardown.stop_transport {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let transport = Arc::clone(&self.transport);
                handle.spawn(async move {
                    if let Err(e) = transport.stop().await {
                        warn!("Transport stop on drop failed: {}", e);
                    }
                });
            }
        }
    }
}
