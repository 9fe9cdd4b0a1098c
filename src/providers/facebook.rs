use async_trait::async_trait;
use serde::Deserialize;

use super::traits::{LeadAdsProvider, ManagedPage, TokenSet};
use crate::error::ApiError;

/// Facebook Login + Graph API client for Lead Ads page connections.
///
/// Quirks:
/// - Scopes are comma-separated in the dialog URL.
/// - Code exchange is a GET with query parameters, not a form POST.
/// - Meta tokens have no refresh token; long-lived user tokens last ~60 days
///   and page tokens derived from them do not expire.
/// - `subscribed_apps` can answer 200 with `{"success": false}`.
pub struct FacebookProvider {
    app_id: String,
    app_secret: String,
    graph_url: String,
    version: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct MetaTokenResponse {
    access_token: String,
    token_type: Option<String>,
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    #[serde(default)]
    data: Vec<ManagedPage>,
}

#[derive(Debug, Deserialize)]
struct SuccessResponse {
    #[serde(default)]
    success: bool,
}

impl FacebookProvider {
    pub fn new(app_id: String, app_secret: String, graph_url: String, version: String) -> Self {
        Self {
            app_id,
            app_secret,
            graph_url,
            version,
            http: reqwest::Client::new(),
        }
    }

    fn graph(&self, path: &str) -> String {
        format!("{}/{}/{}", self.graph_url, self.version, path)
    }

    async fn token_request(&self, params: &[(&str, &str)], what: &str) -> Result<TokenSet, ApiError> {
        let resp = self
            .http
            .get(self.graph("oauth/access_token"))
            .query(params)
            .send()
            .await
            .map_err(|e| ApiError::Graph(format!("{what} request failed: {e}")))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Graph(format!("{what} failed: {body}")));
        }

        let token: MetaTokenResponse = resp
            .json()
            .await
            .map_err(|e| ApiError::Graph(format!("Failed to parse {what} response: {e}")))?;

        Ok(TokenSet {
            access_token: token.access_token,
            token_type: token.token_type.unwrap_or_else(|| "bearer".into()),
            expires_in: token.expires_in,
        })
    }
}

#[async_trait]
impl LeadAdsProvider for FacebookProvider {
    fn auth_url(&self, scopes: &[&str], state: &str, redirect_uri: &str) -> String {
        let scope_str = scopes.join(",");
        format!(
            "https://www.facebook.com/{version}/dialog/oauth?\
             client_id={client_id}\
             &redirect_uri={redirect_uri}\
             &scope={scope}\
             &state={state}\
             &response_type=code",
            version = self.version,
            client_id = urlencoding(&self.app_id),
            redirect_uri = urlencoding(redirect_uri),
            scope = urlencoding(&scope_str),
            state = urlencoding(state),
        )
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenSet, ApiError> {
        self.token_request(
            &[
                ("client_id", self.app_id.as_str()),
                ("client_secret", self.app_secret.as_str()),
                ("redirect_uri", redirect_uri),
                ("code", code),
            ],
            "Token exchange",
        )
        .await
    }

    async fn long_lived_token(&self, short_token: &str) -> Result<TokenSet, ApiError> {
        self.token_request(
            &[
                ("grant_type", "fb_exchange_token"),
                ("client_id", self.app_id.as_str()),
                ("client_secret", self.app_secret.as_str()),
                ("fb_exchange_token", short_token),
            ],
            "Long-lived token exchange",
        )
        .await
    }

    async fn list_pages(&self, user_token: &str) -> Result<Vec<ManagedPage>, ApiError> {
        let resp = self
            .http
            .get(self.graph("me/accounts"))
            .query(&[("fields", "id,name,access_token"), ("access_token", user_token)])
            .send()
            .await
            .map_err(|e| ApiError::Graph(format!("Page list request failed: {e}")))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Graph(format!("Page list failed: {body}")));
        }

        let accounts: AccountsResponse = resp
            .json()
            .await
            .map_err(|e| ApiError::Graph(format!("Failed to parse page list: {e}")))?;

        Ok(accounts.data)
    }

    async fn subscribe_page(
        &self,
        page_id: &str,
        page_token: &str,
        fields: &[&str],
    ) -> Result<(), ApiError> {
        let fields = fields.join(",");
        let resp = self
            .http
            .post(self.graph(&format!("{page_id}/subscribed_apps")))
            .form(&[
                ("subscribed_fields", fields.as_str()),
                ("access_token", page_token),
            ])
            .send()
            .await
            .map_err(|e| ApiError::Graph(format!("Subscribe request failed: {e}")))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Graph(format!("Subscribe failed for page {page_id}: {body}")));
        }

        let result: SuccessResponse = resp
            .json()
            .await
            .map_err(|e| ApiError::Graph(format!("Failed to parse subscribe response: {e}")))?;

        if !result.success {
            return Err(ApiError::Graph(format!(
                "Subscribe for page {page_id} returned success=false"
            )));
        }

        Ok(())
    }
}

fn urlencoding(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}
