//! Patient data lookups backing the tool set
//!
//! The dispatcher executes calls through the `PatientFunctions` trait. The
//! production implementation forwards to the external patient-functions
//! collaborator (which owns the database and summarization); tests use
//! in-memory stubs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::warn;

/// Executes the closed set of patient lookups. Implementations return a
/// human-readable result string in every case; lookup failures degrade to an
/// explanatory message rather than an error, because tool results feed a live
/// conversation.
#[async_trait]
pub trait PatientFunctions: Send + Sync {
    async fn patient_summary(&self, patient_id: i64, date: &str) -> String;
    async fn client_since(&self, patient_id: i64) -> String;
    async fn transcript_quotes(&self, patient_id: i64, query: &str, date: Option<&str>) -> String;
}

/// HTTP-backed lookups against the patient-functions collaborator.
///
/// The collaborator accepts `{"functionName": ..., "args": {...}}` and
/// answers `{"result": "..."}`.
pub struct HttpPatientFunctions {
    client: Client,
    url: String,
}

impl HttpPatientFunctions {
    pub fn new(url: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(4)
            .build()?;
        Ok(Self { client, url })
    }

    async fn call(&self, function_name: &str, args: serde_json::Value) -> String {
        let body = json!({
            "functionName": function_name,
            "args": args,
        });

        let response = match self.client.post(&self.url).json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("patient function request failed: {}", e);
                return format!("Could not reach patient data service: {e}");
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!("patient function {} returned {}", function_name, status);
            return format!("Patient data service returned an error ({status}).");
        }

        match response.json::<serde_json::Value>().await {
            Ok(value) => value
                .get("result")
                .and_then(|r| r.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| "Patient data service returned no result.".to_string()),
            Err(e) => {
                warn!("patient function response was not JSON: {}", e);
                "Patient data service returned an unreadable response.".to_string()
            }
        }
    }
}

#[async_trait]
impl PatientFunctions for HttpPatientFunctions {
    async fn patient_summary(&self, patient_id: i64, date: &str) -> String {
        self.call(
            "getPatientSummary",
            json!({ "patientId": patient_id, "date": date }),
        )
        .await
    }

    async fn client_since(&self, patient_id: i64) -> String {
        self.call("getClientSince", json!({ "patientId": patient_id }))
            .await
    }

    async fn transcript_quotes(&self, patient_id: i64, query: &str, date: Option<&str>) -> String {
        let mut args = json!({ "patientId": patient_id, "query": query });
        if let Some(date) = date {
            args["date"] = json!(date);
        }
        self.call("getTranscriptQuotes", args).await
    }
}

/// Placeholder used when no patient-functions endpoint is configured; every
/// lookup explains that patient data is unavailable.
#[derive(Default)]
pub struct NullPatientFunctions;

#[async_trait]
impl PatientFunctions for NullPatientFunctions {
    async fn patient_summary(&self, _patient_id: i64, _date: &str) -> String {
        "Patient data lookups are not configured.".to_string()
    }

    async fn client_since(&self, _patient_id: i64) -> String {
        "Patient data lookups are not configured.".to_string()
    }

    async fn transcript_quotes(
        &self,
        _patient_id: i64,
        _query: &str,
        _date: Option<&str>,
    ) -> String {
        "Patient data lookups are not configured.".to_string()
    }
}
