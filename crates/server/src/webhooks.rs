//! Provider webhook intake
//!
//! Every inbound provider webhook must carry a valid signature; failures are
//! rejected with 403 before the payload is even parsed.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use call_agent_telephony::verify_webhook_signature;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct ProviderEvent {
    event: String,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    to: Option<String>,
}

/// POST /webhooks/telephony
pub async fn telephony_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get("x-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::new(StatusCode::FORBIDDEN, "signature_invalid", "missing signature"))?;
    let timestamp: i64 = headers
        .get("x-timestamp")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| ApiError::new(StatusCode::FORBIDDEN, "signature_invalid", "missing timestamp"))?;

    verify_webhook_signature(
        &state.settings.webhook.secret,
        timestamp,
        &body,
        signature,
        state.settings.webhook.signature_tolerance_s,
        Utc::now(),
    )?;

    let event: ProviderEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::validation(e.to_string(), None))?;

    tracing::info!(event = %event.event, from = ?event.from, to = ?event.to, "Provider webhook");

    // The simulated provider drives calls in-process; a real adapter would
    // translate the payload into CallEvents here.
    match event.event.as_str() {
        "call.incoming" => {
            let (call_id, _events) = state.telephony.inject_call(
                event.from.as_deref().unwrap_or(""),
                event.to.as_deref().unwrap_or(""),
            );
            Ok(Json(serde_json::json!({ "accepted": true, "call_id": call_id })))
        }
        _ => Ok(Json(serde_json::json!({ "accepted": true }))),
    }
}
