use async_trait::async_trait;
use sqlx::PgPool;

use super::{single_status, RequestStore};
use crate::errors::StoreError;
use crate::models::{AccessCode, AccessRequest, RequestStatus};

#[derive(Clone)]
pub struct PgRequestStore {
    pool: PgPool,
}

impl PgRequestStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl RequestStore for PgRequestStore {
    async fn insert(&self, request: &AccessRequest) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO access_requests (code, status, created_at) VALUES ($1, $2, $3)")
            .bind(request.code.as_str())
            .bind(request.status.as_str())
            .bind(request.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("access_requests insert failed: {:?}", e);
                e
            })?;
        Ok(())
    }

    async fn fetch_status(&self, code: &AccessCode) -> Result<Option<RequestStatus>, StoreError> {
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT status FROM access_requests WHERE code = $1")
                .bind(code.as_str())
                .fetch_all(&self.pool)
                .await?;

        single_status(code, rows.into_iter().map(RequestStatus::from).collect())
    }
}
