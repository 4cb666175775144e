//! Live microphone volume meter
//!
//! Samples raw energy from the captured microphone stream (not from the
//! transport) and publishes a 0-100 level on a watch channel. Analysis runs
//! on the refresh tick and only while somebody observes the level.

use super::frame::AudioFrame;
use super::microphone::MicrophoneStream;
use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Configuration for the level meter
#[derive(Debug, Clone)]
pub struct MeterConfig {
    /// FFT window length (power of two)
    pub fft_size: usize,
    /// Refresh cadence for publishing a new level
    pub refresh_interval: Duration,
    /// Per-bin smoothing between snapshots (0 = none)
    pub smoothing: f32,
    /// Magnitude mapped to level byte 0
    pub min_decibels: f32,
    /// Magnitude mapped to level byte 255
    pub max_decibels: f32,
}

const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(1);

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            fft_size: 256,
            refresh_interval: Duration::from_millis(16), // ~60 Hz display refresh
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

/// Frequency-domain energy snapshot over the most recent samples
pub struct LevelAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    ring: Vec<f32>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
}

impl LevelAnalyzer {
    pub fn new(config: &MeterConfig) -> Self {
        let fft_size = config.fft_size.max(2);
        let fft = FftPlanner::<f32>::new().plan_fft_forward(fft_size);
        let window = (0..fft_size)
            .map(|i| {
                0.5 * (1.0
                    - (2.0 * std::f32::consts::PI * i as f32 / (fft_size as f32 - 1.0)).cos())
            })
            .collect();

        Self {
            fft,
            fft_size,
            ring: Vec::with_capacity(fft_size * 2),
            window,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            smoothed: vec![0.0; fft_size / 2],
            smoothing: config.smoothing.clamp(0.0, 0.99),
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
        }
    }

    /// Append a captured frame (downmixed to mono)
    pub fn push_frame(&mut self, frame: &AudioFrame) {
        self.push_samples(&frame.mono_f32());
    }

    pub fn push_samples(&mut self, samples: &[f32]) {
        self.ring.extend_from_slice(samples);
        // Keep only the latest window
        if self.ring.len() > self.fft_size * 2 {
            let drain = self.ring.len() - self.fft_size;
            self.ring.drain(..drain);
        }
    }

    /// Compute the current level in [0, 100]
    pub fn level(&mut self) -> u8 {
        if self.ring.is_empty() {
            return 0;
        }

        // Zero-pad at the front until a full window has been captured
        let available = self.ring.len().min(self.fft_size);
        let pad = self.fft_size - available;
        let start = self.ring.len() - available;
        for i in 0..self.fft_size {
            let sample = if i < pad { 0.0 } else { self.ring[start + i - pad] };
            self.buffer[i] = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft.process(&mut self.buffer);

        let range = self.max_decibels - self.min_decibels;
        let scale = 1.0 / self.fft_size as f32;
        let mut total = 0.0f32;
        for (bin, smoothed) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.buffer[bin].norm() * scale;
            *smoothed = self.smoothing * *smoothed + (1.0 - self.smoothing) * magnitude;

            let byte = if *smoothed > 0.0 {
                let db = 20.0 * smoothed.log10();
                (255.0 * (db - self.min_decibels) / range).clamp(0.0, 255.0)
            } else {
                0.0
            };
            total += byte;
        }

        let average = total / self.smoothed.len() as f32;
        (average / 255.0 * 100.0).round().min(100.0) as u8
    }

    pub fn reset(&mut self) {
        self.ring.clear();
        self.smoothed.iter_mut().for_each(|s| *s = 0.0);
    }
}

/// Publishes a 0-100 microphone level while a call is active
///
/// The meter borrows the microphone stream by subscribing to its frames.
/// `stop` aborts the analysis task and drops the FFT state; it never
/// touches the stream's tracks.
pub struct AudioLevelMeter {
    config: MeterConfig,
    level_tx: Arc<watch::Sender<u8>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AudioLevelMeter {
    /// A zero refresh interval is raised to one millisecond.
    pub fn new(mut config: MeterConfig) -> Self {
        config.refresh_interval = config.refresh_interval.max(MIN_REFRESH_INTERVAL);
        let (level_tx, _) = watch::channel(0);
        Self {
            config,
            level_tx: Arc::new(level_tx),
            task: Mutex::new(None),
        }
    }

    /// Observe the published level
    pub fn subscribe(&self) -> watch::Receiver<u8> {
        self.level_tx.subscribe()
    }

    /// Most recently published level
    pub fn level(&self) -> u8 {
        *self.level_tx.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Start sampling `stream`. A running analysis is replaced.
    pub fn start(&self, stream: &MicrophoneStream) {
        self.stop();

        let mut frames = stream.subscribe();
        let level_tx = Arc::clone(&self.level_tx);
        let mut analyzer = LevelAnalyzer::new(&self.config);
        let refresh_interval = self.config.refresh_interval;

        let handle = tokio::spawn(async move {
            let mut refresh = tokio::time::interval(refresh_interval);
            refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    frame = frames.recv() => match frame {
                        Ok(frame) => analyzer.push_frame(&frame),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!("Level meter lagged by {} frames", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = refresh.tick() => {
                        // Nobody is watching: skip the analysis entirely
                        if level_tx.receiver_count() == 0 {
                            continue;
                        }
                        level_tx.send_replace(analyzer.level());
                    }
                }
            }

            level_tx.send_replace(0);
            debug!("Level meter input closed");
        });

        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        info!("Audio level meter started for {}", stream.id());
    }

    /// Stop sampling and release the analysis state. Safe to call repeatedly.
    pub fn stop(&self) {
        let handle = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            handle.abort();
            info!("Audio level meter stopped");
        }
        self.level_tx.send_replace(0);
    }
}

impl Default for AudioLevelMeter {
    fn default() -> Self {
        Self::new(MeterConfig::default())
    }
}

impl Drop for AudioLevelMeter {
    fn drop(&mut self) {
        if let Some(handle) = self
            .task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}
