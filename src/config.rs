use crate::audio::{MeterConfig, MicrophoneConstraints};
use crate::session::{CallConfig, ControllerOptions, RetryPolicy};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub transport: TransportConfig,
    pub call: CallDefaults,
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    pub nats_url: String,
    pub session_id: String,
}

/// Defaults applied to calls started over the HTTP API
#[derive(Debug, Clone, Deserialize)]
pub struct CallDefaults {
    pub assistant_id: String,
    #[serde(default)]
    pub voice: Option<String>,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub fft_size: usize,
    pub refresh_interval_ms: u64,
    /// WAV file replayed as the caller's microphone
    #[serde(default)]
    pub input_file: Option<String>,
}

impl Config {
    /// Load defaults, then `path` (any format the config crate knows, optional),
    /// then `CALLWAITING__SECTION__KEY` environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("service.name", "callwaiting-voice")?
            .set_default("service.http.bind", "127.0.0.1")?
            .set_default("service.http.port", 8090)?
            .set_default("transport.nats_url", "nats://localhost:4222")?
            .set_default("transport.session_id", "default")?
            .set_default("call.assistant_id", "")?
            .set_default("call.max_attempts", 3)?
            .set_default("call.base_delay_ms", 1000)?
            .set_default("audio.sample_rate", 16000)?
            .set_default("audio.fft_size", 256)?
            .set_default("audio.refresh_interval_ms", 16)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("CALLWAITING").separator("__"))
            .build()
            .with_context(|| format!("Failed to load config from {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.service.http.bind, self.service.http.port)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.call.max_attempts.max(1),
            base_delay: Duration::from_millis(self.call.base_delay_ms),
        }
    }

    pub fn meter_config(&self) -> MeterConfig {
        MeterConfig {
            fft_size: self.audio.fft_size,
            refresh_interval: Duration::from_millis(self.audio.refresh_interval_ms.max(1)),
            ..MeterConfig::default()
        }
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            retry: self.retry_policy(),
            microphone: MicrophoneConstraints {
                sample_rate: self.audio.sample_rate,
                ..MicrophoneConstraints::default()
            },
            meter: self.meter_config(),
        }
    }

    /// Call config used when a start request does not override it
    pub fn call_config(&self) -> CallConfig {
        let config = CallConfig::for_assistant(self.call.assistant_id.clone());
        match &self.call.voice {
            Some(voice) => config.with_voice(voice.clone()),
            None => config,
        }
    }

    /// `audio.input_file` with `~` and environment variables expanded
    pub fn input_path(&self) -> Result<Option<PathBuf>> {
        self.audio
            .input_file
            .as_deref()
            .map(|path| {
                shellexpand::full(path)
                    .map(|expanded| PathBuf::from(expanded.into_owned()))
                    .with_context(|| format!("Failed to expand input path {}", path))
            })
            .transpose()
    }
}
