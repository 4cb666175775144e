use super::frame::AudioFrame;
use crate::error::MicrophoneError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Capture hints passed when requesting the microphone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicrophoneConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    /// Preferred sample rate (sources may deliver another rate)
    pub sample_rate: u32,
    /// Preferred channel count
    pub channels: u16,
}

impl Default for MicrophoneConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
            sample_rate: 16000,
            channels: 1,
        }
    }
}

/// One capture track of a microphone stream
///
/// `stop` must be safe to call on an already stopped track.
pub trait AudioTrack: Send + Sync {
    fn label(&self) -> &str;

    fn stop(&self);

    fn is_live(&self) -> bool;
}

/// A live microphone stream
///
/// Owned by the call controller once acquired. Other components only
/// subscribe to its frames and never stop it.
pub struct MicrophoneStream {
    id: String,
    tracks: Vec<Arc<dyn AudioTrack>>,
    frames: broadcast::Sender<AudioFrame>,
    released: AtomicBool,
}

impl MicrophoneStream {
    pub fn new(tracks: Vec<Arc<dyn AudioTrack>>, frames: broadcast::Sender<AudioFrame>) -> Self {
        Self {
            id: format!("mic-{}", uuid::Uuid::new_v4()),
            tracks,
            frames,
            released: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Receive captured frames
    pub fn subscribe(&self) -> broadcast::Receiver<AudioFrame> {
        self.frames.subscribe()
    }

    pub fn tracks(&self) -> &[Arc<dyn AudioTrack>] {
        &self.tracks
    }

    /// Stop every track.
    ///
    /// Returns `false` when the stream had already been released.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            debug!("Microphone stream {} already released", self.id);
            return false;
        }

        for track in &self.tracks {
            track.stop();
        }
        info!(
            "Released microphone stream {} ({} tracks)",
            self.id,
            self.tracks.len()
        );
        true
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for MicrophoneStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MicrophoneStream")
            .field("id", &self.id)
            .field("tracks", &self.tracks.len())
            .field("released", &self.is_released())
            .finish()
    }
}

/// Microphone acquisition capability
///
/// Implementations may block indefinitely while a permission prompt is open.
#[async_trait::async_trait]
pub trait MicrophoneSource: Send + Sync {
    /// Request access and start capturing
    async fn acquire(
        &self,
        constraints: &MicrophoneConstraints,
    ) -> Result<MicrophoneStream, MicrophoneError>;

    /// Source name for logging
    fn name(&self) -> &str;
}
