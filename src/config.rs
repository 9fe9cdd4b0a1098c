use anyhow::{bail, Context, Result};

/// Where page connections are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Direct PostgreSQL connection (the Supabase database or any other).
    Postgres { url: String },
    /// Supabase PostgREST API, authenticated with a project key.
    Supabase { url: String, key: String },
}

/// Application configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Server ──────────────────────────────────────────────────────────
    pub host: String,
    pub port: u16,
    /// Public origin of the app. OAuth redirects and the dashboard live here.
    pub app_url: String,
    /// Dashboard path the OAuth callback redirects to (with `?fb=<status>`).
    pub redirect_path: String,
    pub default_workspace_id: String,

    // ── Facebook ────────────────────────────────────────────────────────
    pub fb_app_id: Option<String>,
    pub fb_app_secret: Option<String>,
    pub fb_graph_url: String,
    pub fb_graph_version: String,
    pub fb_webhook_verify_token: Option<String>,
    /// Reject webhook deliveries without `X-Hub-Signature-256`.
    pub fb_require_signature: bool,

    // ── Crypto ──────────────────────────────────────────────────────────
    /// Base64 HMAC key for OAuth state signing.
    pub state_secret: Option<String>,
    /// Base64 32-byte AES-256-GCM key for page tokens at rest.
    pub token_encryption_key: Option<String>,

    // ── Downstream ──────────────────────────────────────────────────────
    pub n8n_webhook_url: Option<String>,
    pub store: StoreBackend,

    // ── Retell ──────────────────────────────────────────────────────────
    pub retell_api_key: Option<String>,
    pub retell_agent_id: Option<String>,
    pub retell_api_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let first = |keys: &[&str]| keys.iter().find_map(|k| get(*k));

        let store = if let Some(url) = get("DATABASE_URL") {
            StoreBackend::Postgres { url }
        } else {
            let url = first(&["SUPABASE_URL", "VITE_SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"]);
            let key = first(&[
                "SUPABASE_SERVICE_ROLE_KEY",
                "SUPABASE_SERVICE_KEY",
                "SUPABASE_ANON_KEY",
                "VITE_SUPABASE_ANON_KEY",
            ]);
            match (url, key) {
                (Some(url), Some(key)) => StoreBackend::Supabase {
                    url: url.trim_end_matches('/').to_string(),
                    key,
                },
                _ => bail!("DATABASE_URL or SUPABASE_URL + SUPABASE_SERVICE_ROLE_KEY is required"),
            }
        };

        let fb_require_signature = match get("FB_REQUIRE_SIGNATURE").as_deref() {
            None => false,
            Some("1") | Some("true") | Some("yes") => true,
            Some("0") | Some("false") | Some("no") => false,
            Some(other) => bail!("Invalid FB_REQUIRE_SIGNATURE: {other}"),
        };

        Ok(Config {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: get("PORT")
                .unwrap_or_else(|| "3000".into())
                .parse()
                .context("Invalid PORT")?,
            app_url: get("APP_URL")
                .context("APP_URL is required (public origin of the app)")?
                .trim_end_matches('/')
                .to_string(),
            redirect_path: get("FB_REDIRECT_PATH").unwrap_or_else(|| "/dashboard/settings".into()),
            default_workspace_id: get("DEFAULT_WORKSPACE_ID").unwrap_or_else(|| "default".into()),

            fb_app_id: get("FB_APP_ID"),
            fb_app_secret: get("FB_APP_SECRET"),
            fb_graph_url: get("FB_GRAPH_URL")
                .unwrap_or_else(|| "https://graph.facebook.com".into())
                .trim_end_matches('/')
                .to_string(),
            fb_graph_version: get("FB_GRAPH_VERSION").unwrap_or_else(|| "v21.0".into()),
            fb_webhook_verify_token: get("FB_WEBHOOK_VERIFY_TOKEN"),
            fb_require_signature,

            state_secret: get("STATE_SECRET"),
            token_encryption_key: get("TOKEN_ENCRYPTION_KEY"),

            n8n_webhook_url: get("N8N_WEBHOOK_URL"),
            store,

            retell_api_key: get("RETELL_API_KEY"),
            retell_agent_id: get("RETELL_AGENT_ID"),
            retell_api_url: get("RETELL_API_URL")
                .unwrap_or_else(|| "https://api.retellai.com".into())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    /// The OAuth redirect URI registered with the Facebook app.
    pub fn callback_url(&self) -> String {
        format!("{}/api/auth/facebook/callback", self.app_url)
    }

    /// Dashboard URL carrying the outcome of a connect attempt.
    pub fn dashboard_redirect(&self, status: &str) -> String {
        let sep = if self.redirect_path.contains('?') { '&' } else { '?' };
        format!("{}{}{}fb={}", self.app_url, self.redirect_path, sep, status)
    }
}
