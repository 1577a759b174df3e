use async_trait::async_trait;

use crate::application::repos::{CacheMaintenanceRepo, RepoError};

use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl CacheMaintenanceRepo for PostgresRepositories {
    async fn purge_responses(&self) -> Result<u64, RepoError> {
        sqlx::query("DELETE FROM api_cache")
            .execute(self.pool())
            .await
            .map(|result| result.rows_affected())
            .map_err(map_sqlx_error)
    }

    async fn purge_analyses(&self) -> Result<u64, RepoError> {
        sqlx::query("DELETE FROM session_analysis")
            .execute(self.pool())
            .await
            .map(|result| result.rows_affected())
            .map_err(map_sqlx_error)
    }

    async fn ping(&self) -> Result<(), RepoError> {
        self.health_check().await.map_err(map_sqlx_error)
    }
}
