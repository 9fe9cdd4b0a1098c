/// Facebook Lead Ads webhook.
///
/// GET is the subscription handshake: Facebook sends `hub.mode=subscribe`,
/// the verify token configured in the app dashboard, and a challenge that
/// must be echoed back as plain text.
///
/// POST carries `leadgen` change notifications. The raw body is relayed
/// unchanged to the automation webhook (n8n), which fetches lead details.
///
/// Payload signature: `X-Hub-Signature-256: sha256=<hex>` where the hex is
/// HMAC-SHA256(raw_body, FB_APP_SECRET).
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;

use crate::{error::ApiError, SharedState};

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_HEADER: &str = "x-hub-signature-256";

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

// =============================================================================
// Signature Verification
// =============================================================================

fn verify_signature(raw_body: &[u8], header_value: &str, app_secret: &str) -> Result<(), ApiError> {
    let provided = header_value
        .strip_prefix("sha256=")
        .ok_or_else(|| ApiError::Unauthorized("malformed X-Hub-Signature-256".into()))?;

    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes())
        .map_err(|_| ApiError::Internal("HMAC key error".into()))?;
    mac.update(raw_body);
    let expected_hex = hex_encode(&mac.finalize().into_bytes());

    if !constant_time_eq(expected_hex.as_bytes(), provided.to_ascii_lowercase().as_bytes()) {
        return Err(ApiError::Unauthorized("payload signature mismatch".into()));
    }

    Ok(())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /api/facebook/webhook
pub async fn verify_subscription(
    State(state): State<SharedState>,
    Query(q): Query<VerifyQuery>,
) -> Response {
    let Some(expected) = state.config.fb_webhook_verify_token.as_deref() else {
        tracing::warn!("[Webhook:Facebook] FB_WEBHOOK_VERIFY_TOKEN not set, rejecting verification");
        return StatusCode::FORBIDDEN.into_response();
    };

    let token_ok = q
        .verify_token
        .as_deref()
        .is_some_and(|t| constant_time_eq(t.as_bytes(), expected.as_bytes()));

    match (q.mode.as_deref(), token_ok, q.challenge) {
        (Some("subscribe"), true, Some(challenge)) => {
            tracing::info!("[Webhook:Facebook] subscription verified");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                challenge,
            )
                .into_response()
        }
        (mode, _, _) => {
            tracing::warn!("[Webhook:Facebook] verification rejected (mode={mode:?}, token_ok={token_ok})");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// POST /api/facebook/webhook
pub async fn receive_event(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    match (signature, state.config.fb_app_secret.as_deref()) {
        (Some(sig), Some(secret)) => verify_signature(&body, sig, secret)?,
        (None, _) if state.config.fb_require_signature => {
            return Err(ApiError::Unauthorized("missing X-Hub-Signature-256".into()));
        }
        (Some(_), None) if state.config.fb_require_signature => {
            return Err(ApiError::NotConfigured("FB_APP_SECRET".into()));
        }
        _ => {}
    }

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid webhook payload: {e}")))?;

    let object = payload.get("object").and_then(|v| v.as_str()).unwrap_or("unknown");
    let entries = payload
        .get("entry")
        .and_then(|v| v.as_array())
        .map(|a| a.len())
        .unwrap_or(0);
    tracing::info!("[Webhook:Facebook] object={object} entries={entries} bytes={}", body.len());

    let forwarder = state
        .forwarder
        .as_ref()
        .ok_or_else(|| ApiError::NotConfigured("N8N_WEBHOOK_URL".into()))?;

    if let Err(e) = forwarder.forward(body).await {
        tracing::error!("[Webhook:Facebook] forward failed: {e}");
        return Err(e);
    }

    Ok(Json(json!({ "received": true })))
}
