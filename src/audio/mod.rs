pub mod file;
pub mod frame;
pub mod level;
pub mod microphone;

pub use file::{AudioFile, FileMicrophone};
pub use frame::AudioFrame;
pub use level::{AudioLevelMeter, LevelAnalyzer, MeterConfig};
pub use microphone::{AudioTrack, MicrophoneConstraints, MicrophoneSource, MicrophoneStream};
