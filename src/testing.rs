//! In-memory fakes for router tests.

use async_trait::async_trait;
use axum::body::Bytes;
use base64::Engine as _;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::{Config, StoreBackend};
use crate::crypto::CryptoEngine;
use crate::error::ApiError;
use crate::providers::{LeadAdsProvider, ManagedPage, TokenSet};
use crate::store::{PageConnectionInfo, PageConnectionUpsert, PageStore};
use crate::voice::{WebCall, WebCallProvider, WebCallRequest};
use crate::webhooks::LeadForwarder;
use crate::{AppState, SharedState};

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn serve(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub const APP_SECRET: &str = "test-app-secret";
pub const VERIFY_TOKEN: &str = "verify-me";

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".into(),
        port: 0,
        app_url: "https://app.example.com".into(),
        redirect_path: "/dashboard/settings".into(),
        default_workspace_id: "ws_default".into(),
        fb_app_id: Some("1234567890".into()),
        fb_app_secret: Some(APP_SECRET.into()),
        fb_graph_url: "http://graph.invalid".into(),
        fb_graph_version: "v21.0".into(),
        fb_webhook_verify_token: Some(VERIFY_TOKEN.into()),
        fb_require_signature: false,
        state_secret: None,
        token_encryption_key: Some(base64::engine::general_purpose::STANDARD.encode([7u8; 32])),
        n8n_webhook_url: Some("http://n8n.invalid/webhook/leads".into()),
        store: StoreBackend::Postgres {
            url: "postgres://unused".into(),
        },
        retell_api_key: None,
        retell_agent_id: None,
        retell_api_url: "http://retell.invalid".into(),
    }
}

// ── Facebook ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Exchange,
    LongLived,
    Pages,
    Subscribe,
}

pub struct FakeFacebook {
    pub fail_at: Mutex<Option<FailAt>>,
    pub pages: Mutex<Vec<ManagedPage>>,
    /// (page_id, page_token) per successful subscription.
    pub subscribed: Mutex<Vec<(String, String)>>,
    /// User token the page listing was called with.
    pub listed_with: Mutex<Option<String>>,
}

impl FakeFacebook {
    pub fn new() -> Self {
        Self {
            fail_at: Mutex::new(None),
            pages: Mutex::new(vec![
                ManagedPage {
                    id: "111".into(),
                    name: "Bright Smile Dental".into(),
                    access_token: "page-token-111".into(),
                },
                ManagedPage {
                    id: "222".into(),
                    name: "Second Page".into(),
                    access_token: "page-token-222".into(),
                },
            ]),
            subscribed: Mutex::new(Vec::new()),
            listed_with: Mutex::new(None),
        }
    }

    pub fn fail_at(&self, stage: FailAt) {
        *self.fail_at.lock().unwrap() = Some(stage);
    }

    fn check(&self, stage: FailAt) -> Result<(), ApiError> {
        if *self.fail_at.lock().unwrap() == Some(stage) {
            return Err(ApiError::Graph(format!("{stage:?} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl LeadAdsProvider for FakeFacebook {
    fn auth_url(&self, scopes: &[&str], state: &str, redirect_uri: &str) -> String {
        let mut url = url::Url::parse("https://www.facebook.com/v21.0/dialog/oauth").unwrap();
        url.query_pairs_mut()
            .append_pair("client_id", "1234567890")
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &scopes.join(","))
            .append_pair("state", state);
        url.to_string()
    }

    async fn exchange_code(&self, code: &str, _redirect_uri: &str) -> Result<TokenSet, ApiError> {
        self.check(FailAt::Exchange)?;
        Ok(TokenSet {
            access_token: format!("short-{code}"),
            token_type: "bearer".into(),
            expires_in: Some(3600),
        })
    }

    async fn long_lived_token(&self, short_token: &str) -> Result<TokenSet, ApiError> {
        self.check(FailAt::LongLived)?;
        Ok(TokenSet {
            access_token: short_token.replace("short-", "long-"),
            token_type: "bearer".into(),
            expires_in: Some(60 * 24 * 3600),
        })
    }

    async fn list_pages(&self, user_token: &str) -> Result<Vec<ManagedPage>, ApiError> {
        self.check(FailAt::Pages)?;
        *self.listed_with.lock().unwrap() = Some(user_token.to_string());
        Ok(self.pages.lock().unwrap().clone())
    }

    async fn subscribe_page(
        &self,
        page_id: &str,
        page_token: &str,
        _fields: &[&str],
    ) -> Result<(), ApiError> {
        self.check(FailAt::Subscribe)?;
        self.subscribed
            .lock()
            .unwrap()
            .push((page_id.to_string(), page_token.to_string()));
        Ok(())
    }
}

// ── Store ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeStore {
    pub fail: Mutex<bool>,
    /// (workspace_id, page_id) -> (page_name, sealed token)
    pub rows: Mutex<HashMap<(String, String), (String, String)>>,
}

#[async_trait]
impl PageStore for FakeStore {
    async fn upsert_page_connection(&self, conn: &PageConnectionUpsert) -> Result<String, ApiError> {
        if *self.fail.lock().unwrap() {
            return Err(ApiError::Database("connection refused".into()));
        }
        self.rows.lock().unwrap().insert(
            (conn.workspace_id.clone(), conn.page_id.clone()),
            (conn.page_name.clone(), conn.access_token.clone()),
        );
        Ok(format!("conn-{}-{}", conn.workspace_id, conn.page_id))
    }

    async fn get_page_token(
        &self,
        workspace_id: &str,
        page_id: &str,
    ) -> Result<Option<String>, ApiError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(&(workspace_id.to_string(), page_id.to_string()))
            .map(|(_, token)| token.clone()))
    }

    async fn list_page_connections(
        &self,
        workspace_id: &str,
    ) -> Result<Vec<PageConnectionInfo>, ApiError> {
        let now = Utc::now();
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|((ws, _), _)| ws == workspace_id)
            .map(|((ws, page_id), (name, _))| PageConnectionInfo {
                id: format!("conn-{ws}-{page_id}"),
                workspace_id: ws.clone(),
                page_id: page_id.clone(),
                page_name: name.clone(),
                created_at: now,
                updated_at: now,
            })
            .collect())
    }
}

// ── Forwarder ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeForwarder {
    fail_next: Mutex<bool>,
    received: Mutex<Vec<Bytes>>,
}

impl FakeForwarder {
    pub fn fail_next(&self) {
        *self.fail_next.lock().unwrap() = true;
    }

    pub fn take(&self) -> Vec<Bytes> {
        std::mem::take(&mut *self.received.lock().unwrap())
    }
}

#[async_trait]
impl LeadForwarder for FakeForwarder {
    async fn forward(&self, body: Bytes) -> Result<(), ApiError> {
        if std::mem::take(&mut *self.fail_next.lock().unwrap()) {
            return Err(ApiError::Forward("downstream returned 500".into()));
        }
        self.received.lock().unwrap().push(body);
        Ok(())
    }
}

// ── Voice ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeWebCalls {
    pub requests: Mutex<Vec<WebCallRequest>>,
}

#[async_trait]
impl WebCallProvider for FakeWebCalls {
    async fn create_web_call(&self, req: &WebCallRequest) -> Result<WebCall, ApiError> {
        self.requests.lock().unwrap().push(req.clone());
        Ok(WebCall {
            access_token: "web-call-token".into(),
            call_id: "call_1".into(),
            agent_id: req.agent_id.clone(),
        })
    }
}

// ── Harness ─────────────────────────────────────────────────────────────────

pub struct Harness {
    pub state: SharedState,
    pub facebook: Arc<FakeFacebook>,
    pub store: Arc<FakeStore>,
    pub forwarder: Arc<FakeForwarder>,
    pub web_calls: Arc<FakeWebCalls>,
}

fn build(config: Config, with_forwarder: bool, with_web_calls: bool) -> Harness {
    let facebook = Arc::new(FakeFacebook::new());
    let store = Arc::new(FakeStore::default());
    let forwarder = Arc::new(FakeForwarder::default());
    let web_calls = Arc::new(FakeWebCalls::default());

    let state_key = CryptoEngine::state_key(
        config.state_secret.as_deref(),
        config.fb_app_secret.as_deref(),
    )
    .unwrap();
    let crypto = CryptoEngine::new(&state_key, config.token_encryption_key.as_deref()).unwrap();

    let state = Arc::new(AppState {
        config,
        crypto,
        facebook: Some(facebook.clone()),
        store: store.clone(),
        forwarder: with_forwarder.then(|| forwarder.clone() as Arc<dyn LeadForwarder>),
        web_calls: with_web_calls.then(|| web_calls.clone() as Arc<dyn WebCallProvider>),
    });

    Harness {
        state,
        facebook,
        store,
        forwarder,
        web_calls,
    }
}

pub fn harness() -> Harness {
    build(test_config(), true, false)
}

pub fn harness_with(edit: impl FnOnce(&mut Config)) -> Harness {
    let mut config = test_config();
    edit(&mut config);
    build(config, true, false)
}

pub fn harness_without_forwarder() -> Harness {
    build(test_config(), false, false)
}

pub fn harness_with_voice(edit: impl FnOnce(&mut Config)) -> Harness {
    let mut config = test_config();
    edit(&mut config);
    build(config, true, true)
}

/// Same as [`harness`] but with no Facebook app configured.
pub fn harness_without_facebook() -> Harness {
    let mut h = harness();
    let state = Arc::get_mut(&mut h.state).unwrap();
    state.facebook = None;
    h
}
