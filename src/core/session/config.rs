//! Voice session configuration

use std::time::Duration;

use crate::core::tools::dispatcher::DEFAULT_CONTINUE_DELAY;

/// Configuration for a `VoiceSession`.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Local trusted endpoint that mints the ephemeral credential
    pub token_url: String,
    /// Remote realtime endpoint accepting the SDP offer
    pub negotiation_url: String,
    /// Patient-functions collaborator backing tool calls, if any
    pub patient_functions_url: Option<String>,
    /// ICE servers for NAT traversal
    pub ice_servers: Vec<String>,

    /// Server-side voice activity detection threshold
    pub vad_threshold: f32,
    /// Audio lead-in kept before detected speech, in milliseconds
    pub vad_prefix_padding_ms: u32,
    /// Trailing silence before an utterance is considered complete
    pub vad_silence_duration_ms: u32,
    /// Model used for input-audio transcription
    pub transcription_model: String,
    /// Whether the tool set is declared to the remote model
    pub tools_enabled: bool,

    /// Pause between a tool result and the continuation request
    pub continue_delay: Duration,
    /// Timeout for credential fetch and SDP exchange requests
    pub request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_url: "http://127.0.0.1:3002/v1/realtime/token".to_string(),
            negotiation_url: "https://api.openai.com/v1/realtime".to_string(),
            patient_functions_url: None,
            ice_servers: vec![
                "stun:stun.l.google.com:19302".to_string(),
                "stun:stun1.l.google.com:19302".to_string(),
            ],
            vad_threshold: 0.5,
            vad_prefix_padding_ms: 300,
            vad_silence_duration_ms: 500,
            transcription_model: "whisper-1".to_string(),
            tools_enabled: true,
            continue_delay: DEFAULT_CONTINUE_DELAY,
            request_timeout: Duration::from_secs(10),
        }
    }
}
