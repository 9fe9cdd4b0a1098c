//! PostgreSQL-backed page-connection store.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::{PageConnectionInfo, PageConnectionUpsert, PageStore, PAGE_CONNECTIONS_TABLE};
use crate::error::ApiError;

pub struct PgPageStore {
    pool: PgPool,
}

impl PgPageStore {
    pub async fn new(db_url: &str) -> Result<Self, ApiError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
            .map_err(|e| ApiError::Database(format!("Failed to connect to PostgreSQL: {e}")))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl PageStore for PgPageStore {
    async fn migrate(&self) -> Result<(), ApiError> {
        // Safe against an existing Supabase-managed table: only creates when missing.
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {PAGE_CONNECTIONS_TABLE} (
                id              UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                workspace_id    TEXT NOT NULL,
                page_id         TEXT NOT NULL,
                page_name       TEXT NOT NULL DEFAULT '',
                access_token    TEXT NOT NULL,
                created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE(workspace_id, page_id)
            )
            "#
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{PAGE_CONNECTIONS_TABLE}_workspace ON {PAGE_CONNECTIONS_TABLE}(workspace_id, updated_at DESC)"
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_page_connection(&self, conn: &PageConnectionUpsert) -> Result<String, ApiError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO {PAGE_CONNECTIONS_TABLE} (workspace_id, page_id, page_name, access_token)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (workspace_id, page_id)
            DO UPDATE SET
                page_name = EXCLUDED.page_name,
                access_token = EXCLUDED.access_token,
                updated_at = NOW()
            RETURNING id::text
            "#
        ))
        .bind(&conn.workspace_id)
        .bind(&conn.page_id)
        .bind(&conn.page_name)
        .bind(&conn.access_token)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get(0))
    }

    async fn get_page_token(
        &self,
        workspace_id: &str,
        page_id: &str,
    ) -> Result<Option<String>, ApiError> {
        let row = sqlx::query(&format!(
            "SELECT access_token FROM {PAGE_CONNECTIONS_TABLE} WHERE workspace_id = $1 AND page_id = $2"
        ))
        .bind(workspace_id)
        .bind(page_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.get(0)))
    }

    async fn list_page_connections(
        &self,
        workspace_id: &str,
    ) -> Result<Vec<PageConnectionInfo>, ApiError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT id::text, workspace_id, page_id, page_name, created_at, updated_at
            FROM {PAGE_CONNECTIONS_TABLE}
            WHERE workspace_id = $1
            ORDER BY updated_at DESC
            "#
        ))
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| PageConnectionInfo {
                id: row.get(0),
                workspace_id: row.get(1),
                page_id: row.get(2),
                page_name: row.get(3),
                created_at: row.get(4),
                updated_at: row.get(5),
            })
            .collect())
    }
}
