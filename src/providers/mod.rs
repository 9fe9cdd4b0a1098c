mod facebook;
mod traits;

pub use facebook::FacebookProvider;
pub use traits::{LeadAdsProvider, ManagedPage, TokenSet};

use crate::config::Config;

/// Permissions requested from the connecting user.
pub const LEAD_ADS_SCOPES: &[&str] = &[
    "pages_show_list",
    "pages_read_engagement",
    "pages_manage_metadata",
    "pages_manage_ads",
    "leads_retrieval",
    "business_management",
];

/// Page webhook fields the app subscribes to.
pub const LEAD_ADS_FIELDS: &[&str] = &["leadgen"];

/// Build the Facebook provider if app credentials are configured.
pub fn facebook_from_config(config: &Config) -> Option<FacebookProvider> {
    match (&config.fb_app_id, &config.fb_app_secret) {
        (Some(id), Some(secret)) => Some(FacebookProvider::new(
            id.clone(),
            secret.clone(),
            config.fb_graph_url.clone(),
            config.fb_graph_version.clone(),
        )),
        _ => None,
    }
}
