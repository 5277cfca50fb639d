//! Local audio I/O for voice sessions
//!
//! The session sends microphone audio to the peer connection as G.711 µ-law
//! (the realtime service's `g711_ulaw` format) and plays remote audio through
//! a single output sink. Device handling is behind traits so sessions can run
//! headless in tests.

pub mod capture;
pub mod playback;
pub mod ulaw;

pub use capture::{AudioCapture, MicrophoneCapture};
pub use playback::{AudioSink, SpeakerSink};

/// Sample rate of the peer-connection audio payload (G.711 telephony rate).
pub const WIRE_SAMPLE_RATE: u32 = 8_000;

/// Samples per 20 ms frame at the wire rate.
pub const FRAME_SAMPLES: usize = (WIRE_SAMPLE_RATE as usize / 1000) * 20;

/// Error types for audio device operations
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no audio device available: {0}")]
    NoDevice(String),
    #[error("unsupported audio configuration: {0}")]
    Unsupported(String),
    #[error("audio stream error: {0}")]
    Stream(String),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
