//! Error types for voice session operations

use crate::core::audio::AudioError;
use crate::credential::CredentialError;

/// Error types for voice session operations.
///
/// Every variant raised during session start aborts the start and leaves no
/// partial session; errors during an active session are recovered locally.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The trusted token endpoint was unavailable or rejected the request
    #[error("credential exchange failed: {0}")]
    Credential(#[from] CredentialError),
    /// Microphone permission or device acquisition failed
    #[error("microphone access failed: {0}")]
    MediaAccess(#[from] AudioError),
    /// The remote SDP exchange failed
    #[error("negotiation failed: {0}")]
    Negotiation(String),
    /// The control channel refused or failed a send
    #[error("control channel error: {0}")]
    Channel(String),
    /// Session components could not be constructed
    #[error("session setup failed: {0}")]
    Setup(String),
}

impl From<webrtc::Error> for SessionError {
    fn from(err: webrtc::Error) -> Self {
        SessionError::Negotiation(err.to_string())
    }
}

/// Result type for voice session operations
pub type SessionResult<T> = Result<T, SessionError>;
