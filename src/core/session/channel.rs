//! Control channel abstraction
//!
//! The control channel is the side-channel data link multiplexed alongside
//! the audio peer connection. Sends are guarded by the channel's readiness so
//! a send after teardown fails cleanly instead of panicking mid-conversation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::data_channel::RTCDataChannel;

use super::errors::{SessionError, SessionResult};

/// Outbound side of the control channel.
#[async_trait]
pub trait ControlChannel: Send + Sync {
    /// Send one JSON message. Fails with `SessionError::Channel` when the
    /// channel is not open.
    async fn send(&self, payload: String) -> SessionResult<()>;

    /// Whether the underlying transport is currently open.
    fn is_open(&self) -> bool;
}

/// Control channel over a WebRTC data channel.
pub struct WebRtcControlChannel {
    inner: Arc<RTCDataChannel>,
}

impl WebRtcControlChannel {
    pub fn new(inner: Arc<RTCDataChannel>) -> Self {
        Self { inner }
    }

    /// Close the underlying data channel. Errors are logged, not raised:
    /// teardown must always make progress.
    pub async fn close(&self) {
        if let Err(e) = self.inner.close().await {
            debug!("control channel close: {}", e);
        }
    }
}

#[async_trait]
impl ControlChannel for WebRtcControlChannel {
    async fn send(&self, payload: String) -> SessionResult<()> {
        if !self.is_open() {
            return Err(SessionError::Channel(
                "control channel is not open".to_string(),
            ));
        }
        self.inner
            .send_text(payload)
            .await
            .map_err(|e| SessionError::Channel(e.to_string()))?;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.inner.ready_state() == RTCDataChannelState::Open
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Test double recording every sent payload.
    pub(crate) struct RecordingChannel {
        open: AtomicBool,
        sent: Mutex<Vec<String>>,
    }

    impl RecordingChannel {
        pub(crate) fn open() -> Self {
            Self {
                open: AtomicBool::new(true),
                sent: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn closed() -> Self {
            Self {
                open: AtomicBool::new(false),
                sent: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn close(&self) {
            self.open.store(false, Ordering::Release);
        }

        pub(crate) fn sent(&self) -> Vec<String> {
            self.sent.lock().clone()
        }
    }

    #[async_trait]
    impl ControlChannel for RecordingChannel {
        async fn send(&self, payload: String) -> SessionResult<()> {
            if !self.is_open() {
                return Err(SessionError::Channel(
                    "control channel is not open".to_string(),
                ));
            }
            self.sent.lock().push(payload);
            Ok(())
        }

        fn is_open(&self) -> bool {
            self.open.load(Ordering::Acquire)
        }
    }

    #[tokio::test]
    async fn test_recording_channel_refuses_when_closed() {
        let channel = RecordingChannel::closed();
        let result = channel.send("{}".to_string()).await;
        assert!(matches!(result, Err(SessionError::Channel(_))));
        assert!(channel.sent().is_empty());
    }
}
