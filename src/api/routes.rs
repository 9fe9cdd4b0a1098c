//! API route handlers for frontdesk-connect.
//!
//! All handlers receive `SharedState` via Axum state extraction. The OAuth
//! callback never returns an error body: every outcome becomes a redirect to
//! the dashboard with an `fb=<status>` flag the SPA turns into a toast.

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::crypto::CryptoEngine;
use crate::error::ApiError;
use crate::providers::{LEAD_ADS_FIELDS, LEAD_ADS_SCOPES};
use crate::store::PageConnectionUpsert;
use crate::voice::WebCallRequest;
use crate::webhooks::facebook as facebook_webhook;
use crate::{AppState, SharedState};

/// How long a signed OAuth state stays valid.
const STATE_TTL_SECS: i64 = 600;

// =============================================================================
// Router
// =============================================================================

pub fn api_router(state: SharedState) -> Router {
    Router::new()
        // ── Health ───────────────────────────────────────────────────────
        .route("/status", get(status))
        // ── Facebook OAuth ───────────────────────────────────────────────
        .route("/auth/facebook/start", get(facebook_start))
        .route("/auth/facebook/callback", get(facebook_callback))
        // ── Facebook Lead Ads ────────────────────────────────────────────
        .route(
            "/facebook/webhook",
            get(facebook_webhook::verify_subscription).post(facebook_webhook::receive_event),
        )
        .route("/facebook/pages", get(facebook_pages))
        .route("/facebook/pages/{page_id}/subscribe", post(facebook_page_subscribe))
        // ── Voice demo ───────────────────────────────────────────────────
        .route("/retell/web-call", post(retell_web_call))
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

async fn status() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "frontdesk-connect",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// OAuth State
// =============================================================================

/// Sign a fresh state carrying the workspace: `workspace_id:nonce:unix_ts`.
fn issue_state(crypto: &CryptoEngine, workspace_id: &str) -> Result<String, ApiError> {
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    let timestamp = chrono::Utc::now().timestamp();
    crypto.sign_state(&format!("{workspace_id}:{nonce}:{timestamp}"))
}

/// Verify a state and return its workspace id.
fn redeem_state(crypto: &CryptoEngine, signed: &str, now: i64) -> Result<String, ApiError> {
    let payload = crypto.verify_state(signed)?;

    // Workspace ids may contain ':' themselves, so split from the right.
    let mut parts = payload.rsplitn(3, ':');
    let (Some(ts), Some(_nonce), Some(workspace_id)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(ApiError::InvalidState);
    };

    let issued: i64 = ts.parse().map_err(|_| ApiError::InvalidState)?;
    if now - issued > STATE_TTL_SECS || issued - now > 60 {
        return Err(ApiError::InvalidState);
    }
    if workspace_id.is_empty() {
        return Err(ApiError::InvalidState);
    }

    Ok(workspace_id.to_string())
}

// =============================================================================
// Facebook OAuth
// =============================================================================

#[derive(Deserialize)]
struct WorkspaceQuery {
    workspace_id: Option<String>,
}

impl WorkspaceQuery {
    fn resolve(self, state: &AppState) -> String {
        self.workspace_id
            .filter(|w| !w.trim().is_empty())
            .unwrap_or_else(|| state.config.default_workspace_id.clone())
    }
}

/// GET /api/auth/facebook/start — Build the Facebook authorization URL.
async fn facebook_start(
    State(state): State<SharedState>,
    Query(q): Query<WorkspaceQuery>,
) -> Result<Json<Value>, ApiError> {
    let provider = state
        .facebook
        .as_ref()
        .ok_or_else(|| ApiError::NotConfigured("Facebook OAuth (FB_APP_ID / FB_APP_SECRET)".into()))?;

    let workspace_id = q.resolve(&state);
    let signed_state = issue_state(&state.crypto, &workspace_id)?;
    let url = provider.auth_url(LEAD_ADS_SCOPES, &signed_state, &state.config.callback_url());

    info!("[OAuth:Facebook] start for workspace {workspace_id}");
    Ok(Json(json!({ "url": url })))
}

/// Outcome of a connect attempt, sent to the dashboard as `?fb=<status>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStatus {
    Success,
    Error,
    MissingCode,
    InvalidState,
    TokenFail,
    PagesFail,
    NoPages,
    SubscribeFail,
}

impl ConnectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectStatus::Success => "success",
            ConnectStatus::Error => "error",
            ConnectStatus::MissingCode => "missing_code",
            ConnectStatus::InvalidState => "invalid_state",
            ConnectStatus::TokenFail => "token_fail",
            ConnectStatus::PagesFail => "pages_fail",
            ConnectStatus::NoPages => "no_pages",
            ConnectStatus::SubscribeFail => "subscribe_fail",
        }
    }
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// GET /api/auth/facebook/callback — Finish the connect flow and redirect.
async fn facebook_callback(
    State(state): State<SharedState>,
    query: Result<Query<CallbackQuery>, QueryRejection>,
) -> Redirect {
    let status = match query {
        Ok(Query(q)) => connect_page(&state, q).await,
        Err(e) => {
            warn!("[OAuth:Facebook] unreadable callback query: {e}");
            ConnectStatus::Error
        }
    };
    Redirect::temporary(&state.config.dashboard_redirect(status.as_str()))
}

/// Token exchange, page listing, persistence and webhook subscription, in
/// that order. Nothing is retried; a stored token is kept even if the
/// subscription afterwards fails.
async fn connect_page(state: &AppState, q: CallbackQuery) -> ConnectStatus {
    if let Some(err) = q.error {
        warn!(
            "[OAuth:Facebook] provider returned error={err} description={}",
            q.error_description.as_deref().unwrap_or("")
        );
        return ConnectStatus::Error;
    }

    let Some(code) = q.code.filter(|c| !c.is_empty()) else {
        warn!("[OAuth:Facebook] callback without code");
        return ConnectStatus::MissingCode;
    };

    let now = chrono::Utc::now().timestamp();
    let workspace_id = match q.state.as_deref().map(|s| redeem_state(&state.crypto, s, now)) {
        Some(Ok(ws)) => ws,
        Some(Err(_)) | None => {
            warn!("[OAuth:Facebook] missing, forged or expired state");
            return ConnectStatus::InvalidState;
        }
    };

    let Some(provider) = state.facebook.as_ref() else {
        error!("[OAuth:Facebook] callback hit but FB_APP_ID / FB_APP_SECRET are not set");
        return ConnectStatus::Error;
    };

    let redirect_uri = state.config.callback_url();
    let short = match provider.exchange_code(&code, &redirect_uri).await {
        Ok(t) => t,
        Err(e) => {
            error!("[OAuth:Facebook] code exchange failed: {e}");
            return ConnectStatus::TokenFail;
        }
    };

    let user_token = match provider.long_lived_token(&short.access_token).await {
        Ok(t) => t.access_token,
        Err(e) => {
            warn!("[OAuth:Facebook] long-lived upgrade failed, using short-lived token: {e}");
            short.access_token
        }
    };

    let pages = match provider.list_pages(&user_token).await {
        Ok(p) => p,
        Err(e) => {
            error!("[OAuth:Facebook] page listing failed: {e}");
            return ConnectStatus::PagesFail;
        }
    };

    let page_count = pages.len();
    let Some(page) = pages.into_iter().next() else {
        warn!("[OAuth:Facebook] user manages no pages (workspace {workspace_id})");
        return ConnectStatus::NoPages;
    };
    if page_count > 1 {
        info!("[OAuth:Facebook] {page_count} pages returned, connecting the first ({})", page.id);
    }

    let sealed = match state.crypto.seal_token(&page.access_token) {
        Ok(s) => s,
        Err(e) => {
            error!("[OAuth:Facebook] sealing page token failed: {e}");
            return ConnectStatus::Error;
        }
    };

    let conn = PageConnectionUpsert {
        workspace_id: workspace_id.clone(),
        page_id: page.id.clone(),
        page_name: page.name.clone(),
        access_token: sealed,
    };
    let conn_id = match state.store.upsert_page_connection(&conn).await {
        Ok(id) => id,
        Err(e) => {
            error!("[OAuth:Facebook] saving page {} failed: {e}", page.id);
            return ConnectStatus::Error;
        }
    };

    if let Err(e) = provider
        .subscribe_page(&page.id, &page.access_token, LEAD_ADS_FIELDS)
        .await
    {
        error!(
            "[OAuth:Facebook] webhook subscription failed for page {} (connection {conn_id} kept): {e}",
            page.id
        );
        return ConnectStatus::SubscribeFail;
    }

    info!(
        "[OAuth:Facebook] connected page {} ({}) to workspace {workspace_id}",
        page.id, page.name
    );
    ConnectStatus::Success
}

// =============================================================================
// Page Connections
// =============================================================================

/// GET /api/facebook/pages — List connected pages (no tokens).
async fn facebook_pages(
    State(state): State<SharedState>,
    Query(q): Query<WorkspaceQuery>,
) -> Result<Json<Value>, ApiError> {
    let workspace_id = q.resolve(&state);
    let pages = state.store.list_page_connections(&workspace_id).await?;

    Ok(Json(json!({ "data": pages })))
}

/// POST /api/facebook/pages/:page_id/subscribe — Retry the leadgen
/// subscription with the stored page token.
async fn facebook_page_subscribe(
    State(state): State<SharedState>,
    Path(page_id): Path<String>,
    Query(q): Query<WorkspaceQuery>,
) -> Result<Json<Value>, ApiError> {
    let provider = state
        .facebook
        .as_ref()
        .ok_or_else(|| ApiError::NotConfigured("Facebook OAuth (FB_APP_ID / FB_APP_SECRET)".into()))?;

    let workspace_id = q.resolve(&state);
    let stored = state
        .store
        .get_page_token(&workspace_id, &page_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("page connection".into()))?;
    let token = state.crypto.open_token(&stored)?;

    provider
        .subscribe_page(&page_id, &token, LEAD_ADS_FIELDS)
        .await?;

    info!("[OAuth:Facebook] resubscribed page {page_id} for workspace {workspace_id}");
    Ok(Json(json!({ "data": { "page_id": page_id, "subscribed": true } })))
}

// =============================================================================
// Voice Demo
// =============================================================================

#[derive(Deserialize, Default)]
struct WebCallBody {
    agent_id: Option<String>,
    metadata: Option<Value>,
    dynamic_variables: Option<Value>,
}

/// POST /api/retell/web-call — Create a browser voice call for the demo agent.
async fn retell_web_call(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let web_calls = state
        .web_calls
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Voice demo (RETELL_API_KEY)".into()))?;

    let body: WebCallBody = if body.is_empty() {
        WebCallBody::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid body: {e}")))?
    };

    let agent_id = body
        .agent_id
        .filter(|a| !a.is_empty())
        .or_else(|| state.config.retell_agent_id.clone())
        .ok_or_else(|| ApiError::BadRequest("agent_id is required (no RETELL_AGENT_ID)".into()))?;

    let call = web_calls
        .create_web_call(&WebCallRequest {
            agent_id,
            metadata: body.metadata,
            retell_llm_dynamic_variables: body.dynamic_variables,
        })
        .await?;

    info!("[Retell] web call {} created for agent {}", call.call_id, call.agent_id);
    Ok(Json(json!({
        "access_token": call.access_token,
        "call_id": call.call_id,
        "agent_id": call.agent_id,
    })))
}
