use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;

#[derive(Debug, Clone, Default, Serialize)]
pub struct WebCallRequest {
    pub agent_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retell_llm_dynamic_variables: Option<Value>,
}

/// What the browser needs to join the call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebCall {
    pub access_token: String,
    pub call_id: String,
    pub agent_id: String,
}

/// Creates browser voice calls against a hosted voice agent.
#[async_trait]
pub trait WebCallProvider: Send + Sync {
    async fn create_web_call(&self, req: &WebCallRequest) -> Result<WebCall, ApiError>;
}

/// Retell AI client. Only the web-call endpoint is used.
pub struct RetellClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl RetellClient {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl WebCallProvider for RetellClient {
    async fn create_web_call(&self, req: &WebCallRequest) -> Result<WebCall, ApiError> {
        let resp = self
            .http
            .post(format!("{}/v2/create-web-call", self.base_url))
            .bearer_auth(&self.api_key)
            .json(req)
            .send()
            .await
            .map_err(|e| ApiError::Retell(format!("create-web-call request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Retell(format!("create-web-call returned {status}: {body}")));
        }

        resp.json()
            .await
            .map_err(|e| ApiError::Retell(format!("Failed to parse create-web-call response: {e}")))
    }
}
