//! Ephemeral token minting
//!
//! The local trusted endpoint the voice client calls before opening a peer
//! connection. Mints a realtime session against the upstream API and hands
//! the session JSON (including the short-lived client secret) back to the
//! caller. When a patient is selected and a context service is configured,
//! the patient's context is spliced into the session instructions so the
//! assistant can acknowledge it.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::errors::app_error::{AppError, AppResult};
use crate::state::AppState;

const MAX_ERROR_BODY_LEN: usize = 500;

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub patient_id: Option<i64>,
}

/// `GET /v1/realtime/token`: mint a realtime session, optionally scoped to
/// a patient.
pub async fn mint_token(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
) -> AppResult<Json<Value>> {
    let api_key = state
        .config
        .realtime_api_key
        .as_ref()
        .ok_or_else(|| AppError::Config("REALTIME_API_KEY is not configured".to_string()))?;

    let mut instructions = state.config.assistant_instructions.clone();
    if let Some(patient_id) = query.patient_id {
        if let Some(context) = fetch_patient_context(&state, patient_id).await {
            instructions.push_str("\n\nCurrent patient context:\n");
            instructions.push_str(&context);
            instructions.push_str(
                "\n\nPlease acknowledge the patient context when talking to the therapist \
                 about the patient.",
            );
        }
    }

    let body = json!({
        "model": state.config.realtime_model,
        "modalities": ["audio", "text"],
        "voice": state.config.realtime_voice,
        "instructions": instructions,
        "input_audio_transcription": { "model": "whisper-1" },
    });

    let response = state
        .http
        .post(format!("{}/sessions", state.config.realtime_api_base))
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error body".to_string());
        let capped = if error_body.len() > MAX_ERROR_BODY_LEN {
            format!("{}... (truncated)", &error_body[..MAX_ERROR_BODY_LEN])
        } else {
            error_body
        };
        return Err(AppError::Upstream(status, capped));
    }

    let session: Value = response
        .json()
        .await
        .map_err(|e| AppError::Internal(format!("unreadable upstream session response: {e}")))?;

    info!(patient_id = ?query.patient_id, "realtime session minted");
    Ok(Json(session))
}

/// Best-effort patient context lookup. The mint proceeds without context when
/// no context service is configured or the lookup fails.
async fn fetch_patient_context(state: &AppState, patient_id: i64) -> Option<String> {
    let base = state.config.context_service_url.as_ref()?;

    let response = state
        .http
        .get(base)
        .query(&[("patient_id", patient_id.to_string())])
        .send()
        .await;

    match response {
        Ok(r) if r.status().is_success() => match r.text().await {
            Ok(text) if !text.is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                warn!("patient context body unreadable: {}", e);
                None
            }
        },
        Ok(r) => {
            warn!("patient context lookup returned {}", r.status());
            None
        }
        Err(e) => {
            warn!("patient context lookup failed: {}", e);
            None
        }
    }
}
