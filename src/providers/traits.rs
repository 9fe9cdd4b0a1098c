use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// A token returned from the Graph API after code exchange or upgrade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: Option<u64>,
}

/// A Facebook Page the connecting user manages, with its page access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedPage {
    pub id: String,
    pub name: String,
    pub access_token: String,
}

/// Everything the Lead Ads connect flow needs from the Graph API.
///
/// The callback drives these in order: `exchange_code`, `long_lived_token`,
/// `list_pages`, `subscribe_page`.
#[async_trait]
pub trait LeadAdsProvider: Send + Sync {
    /// Build the authorization dialog URL the browser is sent to.
    fn auth_url(&self, scopes: &[&str], state: &str, redirect_uri: &str) -> String;

    /// Exchange an authorization code for a short-lived user token.
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenSet, ApiError>;

    /// Upgrade a short-lived user token to a long-lived one (about 60 days).
    /// Page tokens listed with a long-lived user token do not expire.
    async fn long_lived_token(&self, short_token: &str) -> Result<TokenSet, ApiError>;

    /// List the pages the user manages.
    async fn list_pages(&self, user_token: &str) -> Result<Vec<ManagedPage>, ApiError>;

    /// Subscribe the app to webhook `fields` on a page.
    async fn subscribe_page(
        &self,
        page_id: &str,
        page_token: &str,
        fields: &[&str],
    ) -> Result<(), ApiError>;
}
