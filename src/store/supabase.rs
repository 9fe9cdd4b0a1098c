//! Supabase REST (PostgREST) page-connection store.
//!
//! Used when the deployment only has the Supabase project URL and key, as the
//! serverless functions did. The table schema is managed in Supabase.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::{PageConnectionInfo, PageConnectionUpsert, PageStore, PAGE_CONNECTIONS_TABLE};
use crate::error::ApiError;

const INFO_COLUMNS: &str = "id,workspace_id,page_id,page_name,created_at,updated_at";

pub struct SupabasePageStore {
    base_url: String,
    key: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TokenRow {
    access_token: String,
}

impl SupabasePageStore {
    pub fn new(base_url: String, key: String) -> Self {
        Self {
            base_url,
            key,
            http: reqwest::Client::new(),
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, PAGE_CONNECTIONS_TABLE)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.key).bearer_auth(&self.key)
    }

    async fn read_rows<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
        what: &str,
    ) -> Result<Vec<T>, ApiError> {
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Database(format!("Supabase {what} failed ({status}): {body}")));
        }

        resp.json()
            .await
            .map_err(|e| ApiError::Database(format!("Failed to parse Supabase {what} response: {e}")))
    }
}

#[async_trait]
impl PageStore for SupabasePageStore {
    async fn upsert_page_connection(&self, conn: &PageConnectionUpsert) -> Result<String, ApiError> {
        let body = json!({
            "workspace_id": conn.workspace_id,
            "page_id": conn.page_id,
            "page_name": conn.page_name,
            "access_token": conn.access_token,
            "updated_at": Utc::now(),
        });

        let resp = self
            .authed(self.http.post(self.table_url()))
            .query(&[("on_conflict", "workspace_id,page_id"), ("select", INFO_COLUMNS)])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Database(format!("Supabase upsert request failed: {e}")))?;

        let rows: Vec<PageConnectionInfo> = Self::read_rows(resp, "upsert").await?;
        rows.into_iter()
            .next()
            .map(|row| row.id)
            .ok_or_else(|| ApiError::Database("Supabase upsert returned no row".into()))
    }

    async fn get_page_token(
        &self,
        workspace_id: &str,
        page_id: &str,
    ) -> Result<Option<String>, ApiError> {
        let workspace_filter = format!("eq.{workspace_id}");
        let page_filter = format!("eq.{page_id}");

        let resp = self
            .authed(self.http.get(self.table_url()))
            .query(&[
                ("select", "access_token"),
                ("workspace_id", workspace_filter.as_str()),
                ("page_id", page_filter.as_str()),
                ("limit", "1"),
            ])
            .send()
            .await
            .map_err(|e| ApiError::Database(format!("Supabase select request failed: {e}")))?;

        let rows: Vec<TokenRow> = Self::read_rows(resp, "select").await?;
        Ok(rows.into_iter().next().map(|r| r.access_token))
    }

    async fn list_page_connections(
        &self,
        workspace_id: &str,
    ) -> Result<Vec<PageConnectionInfo>, ApiError> {
        let workspace_filter = format!("eq.{workspace_id}");

        let resp = self
            .authed(self.http.get(self.table_url()))
            .query(&[
                ("select", INFO_COLUMNS),
                ("workspace_id", workspace_filter.as_str()),
                ("order", "updated_at.desc"),
            ])
            .send()
            .await
            .map_err(|e| ApiError::Database(format!("Supabase list request failed: {e}")))?;

        Self::read_rows(resp, "list").await
    }
}
