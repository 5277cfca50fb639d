//! Peer connection negotiation
//!
//! Builds the WebRTC peer connection, attaches the outbound microphone
//! track, and exchanges SDP with the remote realtime endpoint over HTTP.
//! The control data channel is created by the session before the offer is
//! generated so it rides the SDP negotiation.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tokio::sync::mpsc;
use tracing::{debug, info};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_PCMU};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use crate::core::audio::playback::AudioSink;
use crate::core::audio::{ulaw, WIRE_SAMPLE_RATE};
use crate::core::session::errors::{SessionError, SessionResult};

const FRAME_DURATION: Duration = Duration::from_millis(20);
const MAX_ERROR_BODY_LEN: usize = 500;

/// Create a peer connection whose inbound audio drains into the playback
/// sink.
pub(super) async fn build_peer_connection(
    ice_servers: &[String],
    sink: Arc<dyn AudioSink>,
) -> SessionResult<Arc<RTCPeerConnection>> {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs()?;

    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut media_engine)?;

    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build();

    let ice_servers: Vec<RTCIceServer> = ice_servers
        .iter()
        .map(|url| RTCIceServer {
            urls: vec![url.clone()],
            ..Default::default()
        })
        .collect();

    let rtc_config = RTCConfiguration {
        ice_servers,
        ..Default::default()
    };

    let pc = Arc::new(api.new_peer_connection(rtc_config).await?);

    pc.on_peer_connection_state_change(Box::new(move |state| {
        debug!(?state, "peer connection state changed");
        Box::pin(async {})
    }));

    // Inbound remote audio goes straight to the playback sink.
    pc.on_track(Box::new(move |track, _receiver, _transceiver| {
        let sink = sink.clone();
        Box::pin(async move {
            if track.kind() == RTPCodecType::Audio {
                info!(
                    codec = track.codec().capability.mime_type,
                    "remote audio track received"
                );
                tokio::spawn(async move {
                    drain_remote_track(track, sink).await;
                });
            }
        })
    }));

    Ok(pc)
}

/// Attach the outbound microphone track and spawn the writer feeding it.
pub(super) async fn attach_local_track(
    pc: &Arc<RTCPeerConnection>,
    mut frames: mpsc::Receiver<Vec<i16>>,
) -> SessionResult<tokio::task::JoinHandle<()>> {
    let track = Arc::new(TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: MIME_TYPE_PCMU.to_owned(),
            clock_rate: WIRE_SAMPLE_RATE,
            channels: 1,
            ..Default::default()
        },
        "audio".to_owned(),
        "echo-mic".to_owned(),
    ));

    pc.add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
        .await?;

    let writer = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            let payload = ulaw::encode_frame(&frame);
            let sample = Sample {
                data: Bytes::from(payload),
                duration: FRAME_DURATION,
                ..Default::default()
            };
            if let Err(e) = track.write_sample(&sample).await {
                debug!("outbound track write ended: {}", e);
                break;
            }
        }
        debug!("microphone writer task finished");
    });

    Ok(writer)
}

/// Generate the local offer, exchange it with the remote endpoint, and apply
/// the returned answer.
pub(super) async fn negotiate(
    pc: &Arc<RTCPeerConnection>,
    http: &reqwest::Client,
    negotiation_url: &str,
    model: &str,
    secret: &str,
) -> SessionResult<()> {
    let offer = pc.create_offer(None).await?;
    pc.set_local_description(offer).await?;

    let offer_sdp = pc
        .local_description()
        .await
        .ok_or_else(|| SessionError::Negotiation("local description missing".to_string()))?
        .sdp;

    let answer_sdp = exchange_sdp(http, negotiation_url, model, secret, offer_sdp).await?;

    let answer = RTCSessionDescription::answer(answer_sdp)
        .map_err(|e| SessionError::Negotiation(format!("invalid SDP answer: {e}")))?;
    pc.set_remote_description(answer).await?;

    info!("SDP negotiation complete");
    Ok(())
}

/// POST the raw SDP offer, authenticated with the ephemeral secret, and
/// return the raw SDP answer.
async fn exchange_sdp(
    http: &reqwest::Client,
    negotiation_url: &str,
    model: &str,
    secret: &str,
    offer_sdp: String,
) -> SessionResult<String> {
    let mut url = url::Url::parse(negotiation_url)
        .map_err(|e| SessionError::Negotiation(format!("invalid negotiation URL: {e}")))?;
    url.query_pairs_mut().append_pair("model", model);

    let response = http
        .post(url)
        .header(AUTHORIZATION, format!("Bearer {secret}"))
        .header(CONTENT_TYPE, "application/sdp")
        .body(offer_sdp)
        .send()
        .await
        .map_err(|e| SessionError::Negotiation(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| SessionError::Negotiation(e.to_string()))?;

    if !status.is_success() {
        let capped = if body.len() > MAX_ERROR_BODY_LEN {
            format!("{}... (truncated)", &body[..MAX_ERROR_BODY_LEN])
        } else {
            body
        };
        return Err(SessionError::Negotiation(format!(
            "remote endpoint returned {status}: {capped}"
        )));
    }

    Ok(body)
}

/// Read RTP from the remote track, decode the µ-law payload, and push the
/// PCM into the playback sink until the track ends.
async fn drain_remote_track(track: Arc<TrackRemote>, sink: Arc<dyn AudioSink>) {
    loop {
        match track.read_rtp().await {
            Ok((packet, _attributes)) => {
                if packet.payload.is_empty() {
                    continue;
                }
                let pcm = ulaw::decode_payload(&packet.payload);
                sink.push_pcm(&pcm, WIRE_SAMPLE_RATE);
            }
            Err(e) => {
                debug!("remote track read ended: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_exchange_sdp_posts_offer_and_returns_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(query_param("model", "gpt-4o-realtime-preview-2024-12-17"))
            .and(header("content-type", "application/sdp"))
            .and(header("authorization", "Bearer ek_test"))
            .respond_with(ResponseTemplate::new(200).set_body_string("v=0\r\nanswer"))
            .expect(1)
            .mount(&server)
            .await;

        let http = reqwest::Client::new();
        let answer = exchange_sdp(
            &http,
            &server.uri(),
            "gpt-4o-realtime-preview-2024-12-17",
            "ek_test",
            "v=0\r\noffer".to_string(),
        )
        .await
        .unwrap();

        assert_eq!(answer, "v=0\r\nanswer");
    }

    #[tokio::test]
    async fn test_exchange_sdp_maps_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("expired credential"))
            .mount(&server)
            .await;

        let http = reqwest::Client::new();
        let result = exchange_sdp(&http, &server.uri(), "m", "ek", "v=0".to_string()).await;

        match result {
            Err(SessionError::Negotiation(msg)) => {
                assert!(msg.contains("403"));
                assert!(msg.contains("expired credential"));
            }
            other => panic!("expected negotiation error, got {other:?}"),
        }
    }
}
