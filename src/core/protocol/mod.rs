//! Control-channel wire messages
//!
//! JSON messages exchanged on the data channel riding alongside the audio
//! peer connection. Inbound events are a closed tagged-variant enum keyed by
//! the `type` discriminator, with a catch-all for kinds this client does not
//! act on; outbound messages cover session configuration, tool results, and
//! response continuation.

use serde::{Deserialize, Serialize};

use crate::core::tools::ToolDefinition;

/// Events received from the remote service on the control channel.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Server-side transcription of the therapist's utterance finished.
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputTranscriptionCompleted {
        #[serde(default)]
        transcript: String,
    },
    /// Transcript of the assistant's synthesized speech finished.
    #[serde(rename = "response.audio_transcript.done")]
    AudioTranscriptDone {
        #[serde(default)]
        transcript: String,
    },
    /// A model response completed; its output items may contain tool calls.
    #[serde(rename = "response.done")]
    ResponseDone { response: ResponseSummary },
    /// Any event kind this client does not act on.
    #[serde(other)]
    Unrecognized,
}

/// The completed-response payload carried by `response.done`.
#[derive(Debug, Default, Deserialize)]
pub struct ResponseSummary {
    #[serde(default)]
    pub output: Vec<OutputItem>,
}

/// One output item of a completed response.
#[derive(Debug, Deserialize)]
pub struct OutputItem {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub call_id: Option<String>,
    /// Tool-call arguments as a JSON-encoded string, exactly as delivered.
    #[serde(default)]
    pub arguments: Option<String>,
}

impl OutputItem {
    pub fn is_function_call(&self) -> bool {
        self.kind == "function_call"
    }
}

/// Messages this client sends on the control channel.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionUpdate },
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },
    #[serde(rename = "response.create")]
    ResponseCreate,
}

/// Remote session behavior established once the channel opens.
#[derive(Debug, Serialize)]
pub struct SessionUpdate {
    pub turn_detection: TurnDetection,
    pub input_audio_transcription: InputAudioTranscription,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
}

/// Server-side voice activity detection parameters.
#[derive(Debug, Serialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
    pub create_response: bool,
}

#[derive(Debug, Serialize)]
pub struct InputAudioTranscription {
    pub model: String,
}

/// Conversation item carrying a tool result back to the model.
#[derive(Debug, Serialize)]
pub struct ConversationItem {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    pub output: String,
}

impl ClientEvent {
    /// Build the `conversation.item.create` message for a tool result.
    pub fn function_call_output(call_id: Option<String>, output: impl Into<String>) -> Self {
        ClientEvent::ConversationItemCreate {
            item: ConversationItem {
                kind: "function_call_output".to_string(),
                call_id,
                output: output.into(),
            },
        }
    }

    /// Serialize for the wire.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
