pub mod api;
pub mod config;
pub mod crypto;
pub mod error;
pub mod providers;
pub mod store;
pub mod voice;
pub mod webhooks;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use error::ApiError;

use std::sync::Arc;

use crypto::CryptoEngine;
use providers::LeadAdsProvider;
use store::PageStore;
use voice::{RetellClient, WebCallProvider};
use webhooks::{HttpForwarder, LeadForwarder};

/// Shared application state passed to all API handlers.
///
/// Optional pieces are `None` when their credentials are not configured; the
/// routes that need them answer with an error instead.
pub struct AppState {
    pub config: Config,
    pub crypto: CryptoEngine,
    pub facebook: Option<Arc<dyn LeadAdsProvider>>,
    pub store: Arc<dyn PageStore>,
    pub forwarder: Option<Arc<dyn LeadForwarder>>,
    pub web_calls: Option<Arc<dyn WebCallProvider>>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Wire the production clients from configuration.
    pub fn from_config(config: Config, store: Arc<dyn PageStore>) -> Result<Self, ApiError> {
        let state_key = CryptoEngine::state_key(
            config.state_secret.as_deref(),
            config.fb_app_secret.as_deref(),
        )?;
        let crypto = CryptoEngine::new(&state_key, config.token_encryption_key.as_deref())?;

        let facebook = providers::facebook_from_config(&config)
            .map(|p| Arc::new(p) as Arc<dyn LeadAdsProvider>);

        let forwarder = config
            .n8n_webhook_url
            .clone()
            .map(|url| Arc::new(HttpForwarder::new(url)) as Arc<dyn LeadForwarder>);

        let web_calls = config.retell_api_key.clone().map(|key| {
            Arc::new(RetellClient::new(key, config.retell_api_url.clone())) as Arc<dyn WebCallProvider>
        });

        Ok(Self {
            config,
            crypto,
            facebook,
            store,
            forwarder,
            web_calls,
        })
    }
}
