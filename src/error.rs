//! Error taxonomy for call sessions.
//!
//! The transport reports failures as loosely shaped `{message, type}` records.
//! Everything that reaches the UI is first folded into a [`CallError`] with one
//! of the [`CallErrorKind`]s below; raw transport errors never leave the
//! controller.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classified failure kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallErrorKind {
    /// The user refused microphone access
    PermissionDenied,
    /// No usable capture device
    DeviceNotFound,
    /// Network/connection class failure, retried up to the attempt cap
    ConnectionError,
    /// Voice/provider configuration problem, triggers one voice fallback
    ConfigurationError,
    /// `start_call` while a call is already in progress
    AlreadyInProgress,
    /// The in-flight start was superseded by `end_call` or `dispose`
    Cancelled,
    /// The controller has been disposed
    Disposed,
    /// Anything unrecognised; never retried
    Unknown,
}

impl CallErrorKind {
    /// Whether the connect policy may retry this failure with the same config
    pub fn is_retryable(self) -> bool {
        matches!(self, CallErrorKind::ConnectionError)
    }

    /// Whether the user can fix this themselves (grant access, plug in a device)
    pub fn is_user_actionable(self) -> bool {
        matches!(
            self,
            CallErrorKind::PermissionDenied | CallErrorKind::DeviceNotFound
        )
    }
}

impl fmt::Display for CallErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallErrorKind::PermissionDenied => "permission denied",
            CallErrorKind::DeviceNotFound => "device not found",
            CallErrorKind::ConnectionError => "connection error",
            CallErrorKind::ConfigurationError => "configuration error",
            CallErrorKind::AlreadyInProgress => "already in progress",
            CallErrorKind::Cancelled => "cancelled",
            CallErrorKind::Disposed => "disposed",
            CallErrorKind::Unknown => "unknown error",
        };
        f.write_str(name)
    }
}

/// A classified, human-readable call failure
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct CallError {
    pub kind: CallErrorKind,
    pub message: String,
}

impl CallError {
    pub fn new(kind: CallErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn already_in_progress() -> Self {
        Self::new(
            CallErrorKind::AlreadyInProgress,
            "A call is already in progress",
        )
    }

    pub fn cancelled() -> Self {
        Self::new(CallErrorKind::Cancelled, "The call was cancelled")
    }

    pub fn disposed() -> Self {
        Self::new(
            CallErrorKind::Disposed,
            "The call controller has been shut down",
        )
    }

    /// Build the user-facing error for a transport failure.
    ///
    /// `attempts` is the number of connect attempts made; when more than one
    /// attempt was made the message summarises them instead of listing each.
    pub fn from_transport(raw: &RawTransportError, attempts: u32) -> Self {
        let kind = classify_error(raw);
        let message = match kind {
            CallErrorKind::ConnectionError if attempts > 1 => format!(
                "Could not connect to the voice agent after {} attempts: {}",
                attempts, raw.message
            ),
            CallErrorKind::ConnectionError => {
                format!("Could not connect to the voice agent: {}", raw.message)
            }
            CallErrorKind::ConfigurationError => format!(
                "The voice agent rejected its voice configuration: {}",
                raw.message
            ),
            CallErrorKind::PermissionDenied => {
                "Microphone access denied. Please allow microphone access and try again."
                    .to_string()
            }
            CallErrorKind::DeviceNotFound => {
                "No microphone was found. Connect a microphone and try again.".to_string()
            }
            _ => format!("The call failed: {}", raw.message),
        };
        Self { kind, message }
    }
}

impl From<MicrophoneError> for CallError {
    fn from(err: MicrophoneError) -> Self {
        match err {
            MicrophoneError::PermissionDenied(_) => Self::new(
                CallErrorKind::PermissionDenied,
                "Microphone access denied. Please allow microphone access and try again.",
            ),
            MicrophoneError::DeviceNotFound(_) => Self::new(
                CallErrorKind::DeviceNotFound,
                "No microphone was found. Connect a microphone and try again.",
            ),
            MicrophoneError::Capture(message) => Self::new(
                CallErrorKind::Unknown,
                format!("Microphone capture failed: {}", message),
            ),
        }
    }
}

/// Microphone acquisition failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MicrophoneError {
    #[error("Microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("Microphone not found: {0}")]
    DeviceNotFound(String),

    #[error("Microphone capture failed: {0}")]
    Capture(String),
}

/// Unstructured error as reported by the transport
#[derive(Error, Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[error("{message}")]
pub struct RawTransportError {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl RawTransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: None,
        }
    }

    pub fn with_type(message: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: Some(kind.into()),
        }
    }
}

const DEVICE_TOKENS: &[&str] = &[
    "notfounderror",
    "device not found",
    "requested device not found",
    "no microphone",
];

const PERMISSION_TOKENS: &[&str] = &[
    "notallowederror",
    "permission",
    "not allowed",
    "denied",
    "microphone",
];

const CONFIGURATION_TOKENS: &[&str] = &[
    "voice",
    "provider",
    "elevenlabs",
    "11labs",
    "invalid assistant",
];

const CONNECTION_TOKENS: &[&str] = &[
    "connection",
    "network",
    "timeout",
    "timed out",
    "session ended",
    "meeting has ended",
    "ejection",
    "failed to fetch",
    "websocket",
    "no responders",
    "disconnected",
    "daily-call-join-error",
    "start-method-error",
];

/// Classify a raw transport failure.
///
/// Matching is by lower-cased substring over both the message and the type.
/// Permission and device signatures always win and are terminal. Unknown
/// signatures are terminal as well; only connection-class failures retry.
pub fn classify_error(raw: &RawTransportError) -> CallErrorKind {
    let haystack = signature(raw);
    let matches_any = |tokens: &[&str]| tokens.iter().any(|t| haystack.contains(t));

    if matches_any(DEVICE_TOKENS) {
        CallErrorKind::DeviceNotFound
    } else if matches_any(PERMISSION_TOKENS) {
        CallErrorKind::PermissionDenied
    } else if matches_any(CONFIGURATION_TOKENS) {
        CallErrorKind::ConfigurationError
    } else if matches_any(CONNECTION_TOKENS) {
        CallErrorKind::ConnectionError
    } else {
        CallErrorKind::Unknown
    }
}

/// Whether the failure carries a connection-class signature.
///
/// Independent of [`classify_error`]: a voice/provider failure that also
/// mentions a timeout is still eligible for connection retries. Permission
/// and device failures never are.
pub fn is_connection_class(raw: &RawTransportError) -> bool {
    let haystack = signature(raw);
    let matches_any = |tokens: &[&str]| tokens.iter().any(|t| haystack.contains(t));

    !matches_any(DEVICE_TOKENS)
        && !matches_any(PERMISSION_TOKENS)
        && matches_any(CONNECTION_TOKENS)
}

fn signature(raw: &RawTransportError) -> String {
    format!(
        "{} {}",
        raw.message.to_lowercase(),
        raw.kind.as_deref().unwrap_or_default().to_lowercase()
    )
}
