use crate::audio::{MeterConfig, MicrophoneConstraints};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Opaque call configuration handed to the transport
///
/// Model, voice and prompt parameters pass through untouched. The only
/// field the controller interprets is `voice`, which is removed for the
/// one-time voice fallback retry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallConfig(Map<String, Value>);

impl CallConfig {
    pub const VOICE_KEY: &'static str = "voice";

    pub fn new() -> Self {
        Self::default()
    }

    /// Config that starts a call with a pre-built assistant
    pub fn for_assistant(assistant_id: impl Into<String>) -> Self {
        Self::new().with("assistantId", assistant_id.into())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn with_voice(self, voice: impl Into<Value>) -> Self {
        self.with(Self::VOICE_KEY, voice)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn voice(&self) -> Option<&Value> {
        self.0.get(Self::VOICE_KEY)
    }

    pub fn has_voice(&self) -> bool {
        self.0.contains_key(Self::VOICE_KEY)
    }

    /// Drop the voice override so the transport falls back to its default voice
    pub fn strip_voice(&mut self) -> Option<Value> {
        self.0.remove(Self::VOICE_KEY)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Map<String, Value>> for CallConfig {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Connect retry policy (linear backoff)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total connect attempts for connection-class failures
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before attempt `attempt` (0-based; attempt 0 has no delay)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

/// Everything the controller needs besides its collaborators
#[derive(Debug, Clone, Default)]
pub struct ControllerOptions {
    pub retry: RetryPolicy,
    pub microphone: MicrophoneConstraints,
    pub meter: MeterConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_voice_keeps_other_fields() {
        let mut config = CallConfig::for_assistant("asst-1")
            .with_voice(json!({"provider": "vapi", "voiceId": "harry"}))
            .with("silenceTimeoutSeconds", 30);

        let voice = config.strip_voice();
        assert!(voice.is_some());
        assert!(!config.has_voice());
        assert_eq!(config.get("assistantId"), Some(&json!("asst-1")));
        assert_eq!(config.get("silenceTimeoutSeconds"), Some(&json!(30)));
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::ZERO);
        assert_eq!(policy.backoff(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff(2), Duration::from_millis(2000));
    }

    #[test]
    fn test_config_serializes_as_plain_object() {
        let config = CallConfig::for_assistant("a").with_voice("jennifer");
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value, json!({"assistantId": "a", "voice": "jennifer"}));
    }
}
