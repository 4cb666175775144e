pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod signals;
pub mod transcript;
pub mod transport;

pub use audio::{
    AudioFile, AudioFrame, AudioLevelMeter, AudioTrack, FileMicrophone, MeterConfig,
    MicrophoneConstraints, MicrophoneSource, MicrophoneStream,
};
pub use config::Config;
pub use error::{
    classify_error, is_connection_class, CallError, CallErrorKind, MicrophoneError,
    RawTransportError,
};
pub use http::{create_router, AppState};
pub use session::{
    CallConfig, CallSession, CallSessionController, CallState, CallStats, ControllerOptions,
    RetryPolicy,
};
pub use signals::{EmotionSignal, EmotionTag, SignalSnapshot};
pub use transcript::{Speaker, TranscriptEntry, TranscriptReconciler};
pub use transport::{NatsTransport, Transport, TransportEvent};
