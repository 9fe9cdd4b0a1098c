//! Page-connection store.
//!
//! One record per (workspace_id, page_id), insert-or-update. Two backends:
//! a direct PostgreSQL connection, or the Supabase REST API when only the
//! project URL and key are available.

pub mod db;
pub mod supabase;

pub use db::PgPageStore;
pub use supabase::SupabasePageStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{Config, StoreBackend};
use crate::error::ApiError;

/// Table holding page connections in both backends.
pub const PAGE_CONNECTIONS_TABLE: &str = "facebook_page_connections";

#[derive(Debug, Clone, Serialize)]
pub struct PageConnectionUpsert {
    pub workspace_id: String,
    pub page_id: String,
    pub page_name: String,
    /// Already sealed by the crypto engine.
    pub access_token: String,
}

/// Connection metadata, never carrying the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConnectionInfo {
    pub id: String,
    pub workspace_id: String,
    pub page_id: String,
    pub page_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait PageStore: Send + Sync {
    /// Prepare the schema, where the backend can.
    async fn migrate(&self) -> Result<(), ApiError> {
        Ok(())
    }

    /// Insert or update the connection keyed on (workspace_id, page_id).
    /// Returns the connection id.
    async fn upsert_page_connection(&self, conn: &PageConnectionUpsert) -> Result<String, ApiError>;

    /// The stored (possibly sealed) page token.
    async fn get_page_token(
        &self,
        workspace_id: &str,
        page_id: &str,
    ) -> Result<Option<String>, ApiError>;

    async fn list_page_connections(
        &self,
        workspace_id: &str,
    ) -> Result<Vec<PageConnectionInfo>, ApiError>;
}

/// Connect the backend selected by configuration.
pub async fn connect(config: &Config) -> Result<Arc<dyn PageStore>, ApiError> {
    match &config.store {
        StoreBackend::Postgres { url } => {
            let store = PgPageStore::new(url).await?;
            tracing::info!("Using PostgreSQL page store");
            Ok(Arc::new(store))
        }
        StoreBackend::Supabase { url, key } => {
            tracing::info!("Using Supabase REST page store at {url}");
            Ok(Arc::new(SupabasePageStore::new(url.clone(), key.clone())))
        }
    }
}
