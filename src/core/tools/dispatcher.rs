//! Tool-call execution
//!
//! Runs model-requested function calls against the patient lookups, records
//! both the call and its result in the transcript, and returns the result on
//! the control channel followed by a continuation request.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::core::protocol::ClientEvent;
use crate::core::session::channel::ControlChannel;
use crate::core::session::errors::{SessionError, SessionResult};
use crate::core::tools::PatientFunctions;
use crate::core::transcript::{Speaker, TranscriptLog};

/// Default pause between the tool-result message and the continuation
/// request. The two sends are not atomic on the remote side; the pause gives
/// the result time to be ingested first. Best-effort ordering only; the
/// protocol offers no acknowledgment to sequence against.
pub const DEFAULT_CONTINUE_DELAY: Duration = Duration::from_millis(500);

/// Executes function calls arriving on the control channel.
pub struct ToolDispatcher {
    channel: Arc<dyn ControlChannel>,
    transcript: Arc<TranscriptLog>,
    functions: Arc<dyn PatientFunctions>,
    continue_delay: Duration,
}

impl ToolDispatcher {
    pub fn new(
        channel: Arc<dyn ControlChannel>,
        transcript: Arc<TranscriptLog>,
        functions: Arc<dyn PatientFunctions>,
        continue_delay: Duration,
    ) -> Self {
        Self {
            channel,
            transcript,
            functions,
            continue_delay,
        }
    }

    /// Execute one function call and answer it on the control channel.
    ///
    /// Malformed argument JSON degrades to an empty argument set; unknown
    /// function names produce a sentinel result. Send failures propagate to
    /// the caller, which logs them; tool calls are advisory, not durable.
    pub async fn dispatch(
        &self,
        name: &str,
        call_id: Option<String>,
        arguments: &str,
    ) -> SessionResult<()> {
        let args: Value = serde_json::from_str(arguments).unwrap_or_else(|e| {
            warn!("unparseable tool arguments for {}: {}", name, e);
            json!({})
        });

        self.transcript
            .append(Speaker::Tool, format!("{name}({args})"));

        let result = self.execute(name, &args).await;
        debug!(tool = name, "tool call result: {}", result);

        self.transcript.append(Speaker::Tool, result.clone());

        let item = ClientEvent::function_call_output(call_id, result)
            .to_json()
            .map_err(|e| SessionError::Channel(format!("failed to encode tool result: {e}")))?;
        self.channel.send(item).await?;

        // Continuation goes out after the delay without holding up event
        // handling. If the session was torn down in the meantime the send
        // fails on the closed channel and is only logged.
        let channel = self.channel.clone();
        let delay = self.continue_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let request = match ClientEvent::ResponseCreate.to_json() {
                Ok(json) => json,
                Err(e) => {
                    warn!("failed to encode response.create: {}", e);
                    return;
                }
            };
            if let Err(e) = channel.send(request).await {
                debug!("continuation after tool call not sent: {}", e);
            }
        });

        Ok(())
    }

    async fn execute(&self, name: &str, args: &Value) -> String {
        let patient_id = args.get("patientId").and_then(Value::as_i64).unwrap_or(0);

        match name {
            "getPatientSummary" => {
                let date = args.get("date").and_then(Value::as_str).unwrap_or("");
                self.functions.patient_summary(patient_id, date).await
            }
            "getClientSince" => self.functions.client_since(patient_id).await,
            "getTranscriptQuotes" => {
                let query = args.get("query").and_then(Value::as_str).unwrap_or("");
                let date = args.get("date").and_then(Value::as_str);
                self.functions
                    .transcript_quotes(patient_id, query, date)
                    .await
            }
            other => {
                warn!("model requested unknown function: {}", other);
                format!("Unknown function: {other}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::channel::tests::RecordingChannel;

    use async_trait::async_trait;

    struct StubFunctions;

    #[async_trait]
    impl PatientFunctions for StubFunctions {
        async fn patient_summary(&self, patient_id: i64, date: &str) -> String {
            format!("Summary for patient {patient_id} on {date}.")
        }

        async fn client_since(&self, patient_id: i64) -> String {
            format!("Patient {patient_id} has been a client since 2023-06-08.")
        }

        async fn transcript_quotes(
            &self,
            patient_id: i64,
            query: &str,
            _date: Option<&str>,
        ) -> String {
            format!("Quotes about '{query}' for patient {patient_id}.")
        }
    }

    fn dispatcher_with(
        channel: Arc<RecordingChannel>,
        transcript: Arc<TranscriptLog>,
    ) -> ToolDispatcher {
        ToolDispatcher::new(
            channel,
            transcript,
            Arc::new(StubFunctions),
            Duration::from_millis(10),
        )
    }

    #[tokio::test]
    async fn test_client_since_sends_result_then_continuation() {
        let channel = Arc::new(RecordingChannel::open());
        let transcript = Arc::new(TranscriptLog::new());
        let dispatcher = dispatcher_with(channel.clone(), transcript.clone());

        dispatcher
            .dispatch(
                "getClientSince",
                Some("call_1".to_string()),
                r#"{"patientId": 42}"#,
            )
            .await
            .unwrap();

        // Call entry then result entry, both Tool-attributed
        let entries = transcript.snapshot();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.speaker == Speaker::Tool));
        assert!(entries[0].text.starts_with("getClientSince("));
        assert!(entries[1].text.contains("42"));

        // conversation.item.create goes out immediately
        let sent = channel.sent();
        assert_eq!(sent.len(), 1);
        let item: Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(item["type"], "conversation.item.create");
        assert_eq!(item["item"]["call_id"], "call_1");
        assert!(item["item"]["output"].as_str().unwrap().contains("42"));

        // response.create follows after the delay
        tokio::time::sleep(Duration::from_millis(50)).await;
        let sent = channel.sent();
        assert_eq!(sent.len(), 2);
        let follow: Value = serde_json::from_str(&sent[1]).unwrap();
        assert_eq!(follow["type"], "response.create");
    }

    #[tokio::test]
    async fn test_unknown_function_yields_sentinel_without_error() {
        let channel = Arc::new(RecordingChannel::open());
        let transcript = Arc::new(TranscriptLog::new());
        let dispatcher = dispatcher_with(channel.clone(), transcript.clone());

        dispatcher
            .dispatch("transferFunds", None, r#"{"amount": 100}"#)
            .await
            .unwrap();

        let entries = transcript.snapshot();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.speaker == Speaker::Tool));
        assert!(entries[1].text.contains("Unknown function: transferFunds"));
    }

    #[tokio::test]
    async fn test_malformed_arguments_degrade_to_empty_set() {
        let channel = Arc::new(RecordingChannel::open());
        let transcript = Arc::new(TranscriptLog::new());
        let dispatcher = dispatcher_with(channel.clone(), transcript.clone());

        dispatcher
            .dispatch("getClientSince", None, "{not json")
            .await
            .unwrap();

        let entries = transcript.snapshot();
        assert_eq!(entries.len(), 2);
        // The call proceeds with no arguments: patient id defaults to 0
        assert!(entries[1].text.contains("Patient 0"));
    }

    #[tokio::test]
    async fn test_send_failure_propagates() {
        let channel = Arc::new(RecordingChannel::closed());
        let transcript = Arc::new(TranscriptLog::new());
        let dispatcher = dispatcher_with(channel.clone(), transcript.clone());

        let result = dispatcher
            .dispatch("getClientSince", None, r#"{"patientId": 1}"#)
            .await;
        assert!(matches!(result, Err(SessionError::Channel(_))));

        // Transcript entries were still recorded before the send
        assert_eq!(transcript.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn test_continuation_after_close_is_harmless() {
        let channel = Arc::new(RecordingChannel::open());
        let transcript = Arc::new(TranscriptLog::new());
        let dispatcher = dispatcher_with(channel.clone(), transcript.clone());

        dispatcher
            .dispatch("getClientSince", None, r#"{"patientId": 5}"#)
            .await
            .unwrap();

        // Session torn down before the delayed continuation fires
        channel.close();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Only the item.create made it out; the late send failed silently
        assert_eq!(channel.sent().len(), 1);
    }
}
