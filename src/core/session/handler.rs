//! Control-channel protocol handler
//!
//! Drives the `Closed -> Open -> Closed` life of the control channel. The
//! open transition fires exactly once per session and pushes the remote
//! session configuration; thereafter inbound events are classified into
//! transcript lines and tool invocations, in arrival order.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::core::protocol::{
    ClientEvent, InputAudioTranscription, ServerEvent, SessionUpdate, TurnDetection,
};
use crate::core::session::channel::ControlChannel;
use crate::core::session::config::SessionConfig;
use crate::core::tools::{declared_tools, ToolDispatcher};
use crate::core::transcript::{Speaker, TranscriptLog};

/// Control channel state. Re-entrant per session: a new session gets a new
/// handler starting at `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Closed,
    Open,
}

/// Signals forwarded from the data-channel callbacks into the session's
/// owned event queue. The callbacks only enqueue; all handling happens on
/// the single drain task, so events are processed strictly in arrival order.
#[derive(Debug)]
pub enum ChannelSignal {
    Open,
    Message(String),
    Close,
}

/// Drain channel signals in arrival order until the queue closes or the
/// session tears the drain task down.
pub async fn drive(
    handler: Arc<ControlChannelHandler>,
    mut signals: mpsc::UnboundedReceiver<ChannelSignal>,
) {
    while let Some(signal) = signals.recv().await {
        match signal {
            ChannelSignal::Open => handler.on_open().await,
            ChannelSignal::Message(text) => handler.on_message(&text).await,
            ChannelSignal::Close => handler.on_close(),
        }
    }
    debug!("control event queue drained");
}

/// Classifies inbound control-channel events and owns the channel state.
pub struct ControlChannelHandler {
    state: Mutex<ChannelState>,
    channel: Arc<dyn ControlChannel>,
    transcript: Arc<TranscriptLog>,
    dispatcher: ToolDispatcher,
    config: SessionConfig,
}

impl ControlChannelHandler {
    pub fn new(
        channel: Arc<dyn ControlChannel>,
        transcript: Arc<TranscriptLog>,
        dispatcher: ToolDispatcher,
        config: SessionConfig,
    ) -> Self {
        Self {
            state: Mutex::new(ChannelState::Closed),
            channel,
            transcript,
            dispatcher,
            config,
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.state.lock()
    }

    /// The channel signalled readiness. Transitions `Closed -> Open` and
    /// configures the remote session; a second open signal is ignored.
    pub async fn on_open(&self) {
        {
            let mut state = self.state.lock();
            if *state == ChannelState::Open {
                warn!("control channel signalled open twice");
                return;
            }
            *state = ChannelState::Open;
        }

        debug!("control channel open, configuring remote session");
        let update = self.session_update();
        match update.to_json() {
            Ok(json) => {
                if let Err(e) = self.channel.send(json).await {
                    warn!("failed to send session configuration: {}", e);
                }
            }
            Err(e) => warn!("failed to encode session configuration: {}", e),
        }
    }

    /// The channel closed; no further messages are handled.
    pub fn on_close(&self) {
        *self.state.lock() = ChannelState::Closed;
        debug!("control channel closed");
    }

    /// Handle one inbound message. Malformed JSON is logged and dropped;
    /// unrecognized kinds are ignored.
    pub async fn on_message(&self, raw: &str) {
        if self.state() != ChannelState::Open {
            warn!("dropping control message received while channel closed");
            return;
        }

        let event: ServerEvent = match serde_json::from_str(raw) {
            Ok(event) => event,
            Err(e) => {
                warn!("dropping malformed control message: {}", e);
                return;
            }
        };

        match event {
            ServerEvent::InputTranscriptionCompleted { transcript } => {
                if !transcript.is_empty() {
                    self.transcript.append(Speaker::Therapist, transcript);
                }
            }
            ServerEvent::AudioTranscriptDone { transcript } => {
                if !transcript.is_empty() {
                    self.transcript.append(Speaker::Assistant, transcript);
                }
            }
            ServerEvent::ResponseDone { response } => {
                for item in response.output {
                    if !item.is_function_call() {
                        continue;
                    }
                    let Some(name) = item.name else {
                        warn!("function call item without a name, skipping");
                        continue;
                    };
                    let arguments = item.arguments.unwrap_or_else(|| "{}".to_string());
                    if let Err(e) = self
                        .dispatcher
                        .dispatch(&name, item.call_id, &arguments)
                        .await
                    {
                        warn!("tool call {} failed: {}", name, e);
                    }
                }
            }
            ServerEvent::Unrecognized => {}
        }
    }

    fn session_update(&self) -> ClientEvent {
        let tools = if self.config.tools_enabled {
            declared_tools()
        } else {
            Vec::new()
        };
        let tool_choice = self.config.tools_enabled.then(|| "auto".to_string());

        ClientEvent::SessionUpdate {
            session: SessionUpdate {
                turn_detection: TurnDetection {
                    kind: "server_vad".to_string(),
                    threshold: self.config.vad_threshold,
                    prefix_padding_ms: self.config.vad_prefix_padding_ms,
                    silence_duration_ms: self.config.vad_silence_duration_ms,
                    create_response: true,
                },
                input_audio_transcription: InputAudioTranscription {
                    model: self.config.transcription_model.clone(),
                },
                tools,
                tool_choice,
            },
        }
    }
}
