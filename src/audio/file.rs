use super::frame::AudioFrame;
use super::microphone::{AudioTrack, MicrophoneConstraints, MicrophoneSource, MicrophoneStream};
use crate::error::MicrophoneError;
use anyhow::{Context, Result};
use hound::WavReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// 16-bit PCM audio loaded from a WAV file
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Split into consecutive frames of `frame_ms` (the last one may be short)
    pub fn frames(&self, frame_ms: u64) -> Vec<AudioFrame> {
        let per_frame = (self.sample_rate as u64 * frame_ms / 1000) as usize
            * usize::from(self.channels.max(1));
        if per_frame == 0 {
            return Vec::new();
        }

        self.samples
            .chunks(per_frame)
            .enumerate()
            .map(|(i, chunk)| AudioFrame {
                samples: chunk.to_vec(),
                sample_rate: self.sample_rate,
                channels: self.channels,
                timestamp_ms: i as u64 * frame_ms,
            })
            .collect()
    }
}

/// Track of a file-backed microphone
struct FileTrack {
    label: String,
    live: AtomicBool,
}

impl AudioTrack for FileTrack {
    fn label(&self) -> &str {
        &self.label
    }

    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            debug!("Stopped track {}", self.label);
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

/// Replays a WAV file as a live microphone, looping until stopped
pub struct FileMicrophone {
    path: PathBuf,
    frame_ms: u64,
}

impl FileMicrophone {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            frame_ms: 100,
        }
    }

    /// Set the frame length in milliseconds (default 100ms)
    pub fn with_frame_ms(mut self, frame_ms: u64) -> Self {
        self.frame_ms = frame_ms.max(1);
        self
    }
}

#[async_trait::async_trait]
impl MicrophoneSource for FileMicrophone {
    async fn acquire(
        &self,
        constraints: &MicrophoneConstraints,
    ) -> Result<MicrophoneStream, MicrophoneError> {
        if !self.path.exists() {
            return Err(MicrophoneError::DeviceNotFound(
                self.path.display().to_string(),
            ));
        }

        let audio = AudioFile::open(&self.path)
            .map_err(|e| MicrophoneError::Capture(format!("{:#}", e)))?;
        if audio.sample_rate != constraints.sample_rate {
            debug!(
                "File rate {}Hz differs from requested {}Hz",
                audio.sample_rate, constraints.sample_rate
            );
        }

        let frames = audio.frames(self.frame_ms);
        if frames.is_empty() {
            return Err(MicrophoneError::Capture(format!(
                "{} contains no audio",
                audio.path
            )));
        }

        let track = Arc::new(FileTrack {
            label: format!("file:{}", audio.path),
            live: AtomicBool::new(true),
        });
        let (tx, _) = broadcast::channel(64);

        let producer_track = Arc::clone(&track);
        let producer_tx = tx.clone();
        let frame_ms = self.frame_ms;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(frame_ms));
            let mut elapsed_ms = 0u64;
            'replay: loop {
                for frame in &frames {
                    ticker.tick().await;
                    if !producer_track.is_live() {
                        break 'replay;
                    }
                    let mut frame = frame.clone();
                    frame.timestamp_ms = elapsed_ms;
                    elapsed_ms += frame_ms;
                    // No receivers is fine; the frame is simply dropped
                    let _ = producer_tx.send(frame);
                }
            }
            debug!("File microphone producer stopped");
        });

        info!("File microphone acquired: {}", self.path.display());
        Ok(MicrophoneStream::new(vec![track as Arc<dyn AudioTrack>], tx))
    }

    fn name(&self) -> &str {
        "file"
    }
}
