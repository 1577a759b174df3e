use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use time::OffsetDateTime;

use crate::application::repos::{InsertOutcome, RepoError, ResponseCacheRepo};
use crate::domain::entities::CacheEntry;
use crate::domain::fingerprint::Fingerprint;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, sqlx::FromRow)]
struct ApiCacheRow {
    hash: String,
    response: Json<Value>,
    created_at: Option<OffsetDateTime>,
}

impl TryFrom<ApiCacheRow> for CacheEntry {
    type Error = RepoError;

    fn try_from(row: ApiCacheRow) -> Result<Self, Self::Error> {
        let fingerprint = Fingerprint::parse(&row.hash).map_err(|err| RepoError::Integrity {
            message: err.to_string(),
        })?;
        Ok(CacheEntry {
            fingerprint,
            response: row.response.0,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl ResponseCacheRepo for PostgresRepositories {
    async fn find_response(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<CacheEntry>, RepoError> {
        let row = sqlx::query_as::<_, ApiCacheRow>(
            r#"
            SELECT hash, response, created_at
            FROM api_cache
            WHERE hash = $1
            "#,
        )
        .bind(fingerprint.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(CacheEntry::try_from).transpose()
    }

    async fn insert_response(
        &self,
        fingerprint: &Fingerprint,
        response: &Value,
    ) -> Result<InsertOutcome, RepoError> {
        let result = sqlx::query(
            r#"
            INSERT INTO api_cache (hash, response)
            VALUES ($1, $2)
            ON CONFLICT (hash) DO NOTHING
            "#,
        )
        .bind(fingerprint.as_str())
        .bind(Json(response))
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(if result.rows_affected() == 0 {
            InsertOutcome::AlreadyPresent
        } else {
            InsertOutcome::Inserted
        })
    }
}
