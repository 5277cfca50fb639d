//! Realtime voice session
//!
//! `VoiceSession` owns every piece of session-scoped state: the peer
//! connection, the control channel and its handler, local capture, the
//! playback sink, and the transcript log. A session is created on demand by
//! `start` and torn down by `stop`; at most one is active per `VoiceSession`
//! instance, and no other component mutates its resources.

pub mod channel;
pub mod config;
pub mod errors;
pub mod handler;
mod negotiator;

pub use config::SessionConfig;

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::peer_connection::RTCPeerConnection;

use crate::core::audio::{
    AudioCapture, AudioSink, MicrophoneCapture, SpeakerSink,
};
use crate::core::tools::{
    HttpPatientFunctions, NullPatientFunctions, PatientFunctions, ToolDispatcher,
};
use crate::core::transcript::TranscriptLog;
use crate::credential::CredentialClient;
use channel::{ControlChannel, WebRtcControlChannel};
use errors::{SessionError, SessionResult};
use handler::{ChannelSignal, ControlChannelHandler};

/// Label of the data channel carrying control events; created before the
/// offer so it is part of the SDP negotiation.
const CONTROL_CHANNEL_LABEL: &str = "oai-events";

/// Everything owned by one established session.
struct ActiveSession {
    id: Uuid,
    peer: Arc<RTCPeerConnection>,
    channel: Arc<WebRtcControlChannel>,
    writer: tokio::task::JoinHandle<()>,
    /// Single consumer of the control event queue; owns the handler
    events: tokio::task::JoinHandle<()>,
}

/// Client for realtime voice sessions against the remote speech service.
pub struct VoiceSession {
    config: SessionConfig,
    http: reqwest::Client,
    credentials: CredentialClient,
    functions: Arc<dyn PatientFunctions>,
    capture: Mutex<Box<dyn AudioCapture>>,
    sink: Arc<dyn AudioSink>,
    transcript: Arc<TranscriptLog>,
    active: Mutex<Option<ActiveSession>>,
}

impl VoiceSession {
    /// Create a session client using the default microphone and speakers.
    pub fn new(config: SessionConfig) -> SessionResult<Self> {
        let sink = Arc::new(SpeakerSink::new()?);
        let functions: Arc<dyn PatientFunctions> = match &config.patient_functions_url {
            Some(url) => Arc::new(
                HttpPatientFunctions::new(url.clone(), config.request_timeout)
                    .map_err(|e| SessionError::Setup(e.to_string()))?,
            ),
            None => Arc::new(NullPatientFunctions),
        };
        Self::with_io(config, Box::new(MicrophoneCapture::new()), sink, functions)
    }

    /// Create a session client with explicit audio I/O and patient lookups.
    /// This is the seam used by headless embeddings and tests.
    pub fn with_io(
        config: SessionConfig,
        capture: Box<dyn AudioCapture>,
        sink: Arc<dyn AudioSink>,
        functions: Arc<dyn PatientFunctions>,
    ) -> SessionResult<Self> {
        let credentials =
            CredentialClient::new(config.token_url.clone(), config.request_timeout)?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SessionError::Setup(e.to_string()))?;

        Ok(Self {
            config,
            http,
            credentials,
            functions,
            capture: Mutex::new(capture),
            sink,
            transcript: Arc::new(TranscriptLog::new()),
            active: Mutex::new(None),
        })
    }

    /// The session transcript. Entries accumulate while a session runs and
    /// are cleared on the next `start`.
    pub fn transcript(&self) -> Arc<TranscriptLog> {
        self.transcript.clone()
    }

    pub async fn is_active(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// Start a session, optionally scoped to a patient.
    ///
    /// A no-op when a session is already active. Any failure along the way
    /// tears down whatever was built and leaves no partial session; the
    /// caller may simply call `start` again.
    pub async fn start(&self, patient_id: Option<i64>) -> SessionResult<()> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            debug!("session already active, ignoring start");
            return Ok(());
        }

        self.transcript.clear();

        let credential = self.credentials.fetch(patient_id).await?;

        let peer =
            negotiator::build_peer_connection(&self.config.ice_servers, self.sink.clone()).await?;

        let frames = match self.capture.lock().await.open() {
            Ok(rx) => rx,
            Err(e) => {
                let _ = peer.close().await;
                return Err(e.into());
            }
        };

        let writer = match negotiator::attach_local_track(&peer, frames).await {
            Ok(writer) => writer,
            Err(e) => {
                self.capture.lock().await.close();
                let _ = peer.close().await;
                return Err(e);
            }
        };

        // The control channel must exist before the offer is generated.
        let data_channel = match peer.create_data_channel(CONTROL_CHANNEL_LABEL, None).await {
            Ok(dc) => dc,
            Err(e) => {
                writer.abort();
                self.capture.lock().await.close();
                let _ = peer.close().await;
                return Err(e.into());
            }
        };

        let control: Arc<WebRtcControlChannel> =
            Arc::new(WebRtcControlChannel::new(data_channel.clone()));
        let dispatcher = ToolDispatcher::new(
            control.clone() as Arc<dyn ControlChannel>,
            self.transcript.clone(),
            self.functions.clone(),
            self.config.continue_delay,
        );
        let handler = Arc::new(ControlChannelHandler::new(
            control.clone() as Arc<dyn ControlChannel>,
            self.transcript.clone(),
            dispatcher,
            self.config.clone(),
        ));

        // Callbacks only enqueue signals; the owned drain task below handles
        // them, one at a time, in arrival order.
        let (signal_tx, signal_rx) = mpsc::unbounded_channel::<ChannelSignal>();
        {
            let tx = signal_tx.clone();
            data_channel.on_open(Box::new(move || {
                let _ = tx.send(ChannelSignal::Open);
                Box::pin(async {})
            }));

            let tx = signal_tx.clone();
            data_channel.on_message(Box::new(move |msg: DataChannelMessage| {
                match String::from_utf8(msg.data.to_vec()) {
                    Ok(text) => {
                        let _ = tx.send(ChannelSignal::Message(text));
                    }
                    Err(_) => warn!("dropping non-UTF-8 control message"),
                }
                Box::pin(async {})
            }));

            let tx = signal_tx;
            data_channel.on_close(Box::new(move || {
                let _ = tx.send(ChannelSignal::Close);
                Box::pin(async {})
            }));
        }
        let events = tokio::spawn(handler::drive(handler, signal_rx));

        if let Err(e) = negotiator::negotiate(
            &peer,
            &self.http,
            &self.config.negotiation_url,
            &credential.model,
            &credential.secret,
        )
        .await
        {
            writer.abort();
            events.abort();
            self.capture.lock().await.close();
            control.close().await;
            let _ = peer.close().await;
            return Err(e);
        }

        let id = Uuid::new_v4();
        info!(session = %id, model = %credential.model, "voice session established");

        *active = Some(ActiveSession {
            id,
            peer,
            channel: control,
            writer,
            events,
        });

        Ok(())
    }

    /// Stop the active session, if any. Idempotent: stopping twice, or with
    /// no session, succeeds and leaves the same inactive state.
    pub async fn stop(&self) -> SessionResult<()> {
        let mut active = self.active.lock().await;
        let Some(session) = active.take() else {
            debug!("no active session to stop");
            return Ok(());
        };

        session.channel.close().await;
        if let Err(e) = session.peer.close().await {
            warn!("peer connection close: {}", e);
        }
        session.writer.abort();
        session.events.abort();
        self.capture.lock().await.close();

        info!(session = %session.id, "voice session stopped");
        Ok(())
    }
}

impl Drop for VoiceSession {
    fn drop(&mut self) {
        if let Ok(active) = self.active.try_lock() {
            if active.is_some() {
                warn!("VoiceSession dropped without explicit stop call");
            }
        }
    }
}
