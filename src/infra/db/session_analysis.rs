use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use time::OffsetDateTime;

use crate::application::repos::{AnalysisCacheRepo, InsertOutcome, RepoError};
use crate::domain::entities::{AnalysisEntry, SessionId};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, sqlx::FromRow)]
struct SessionAnalysisRow {
    session_id: String,
    analysis: Json<Value>,
    created_at: Option<OffsetDateTime>,
}

impl TryFrom<SessionAnalysisRow> for AnalysisEntry {
    type Error = RepoError;

    fn try_from(row: SessionAnalysisRow) -> Result<Self, Self::Error> {
        let session_id = SessionId::parse(&row.session_id).map_err(|err| RepoError::Integrity {
            message: err.to_string(),
        })?;
        Ok(AnalysisEntry {
            session_id,
            analysis: row.analysis.0,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl AnalysisCacheRepo for PostgresRepositories {
    async fn find_analysis(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<AnalysisEntry>, RepoError> {
        let row = sqlx::query_as::<_, SessionAnalysisRow>(
            r#"
            SELECT session_id, analysis, created_at
            FROM session_analysis
            WHERE session_id = $1
            "#,
        )
        .bind(session_id.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(AnalysisEntry::try_from).transpose()
    }

    async fn insert_analysis(
        &self,
        session_id: &SessionId,
        analysis: &Value,
    ) -> Result<InsertOutcome, RepoError> {
        let result = sqlx::query(
            r#"
            INSERT INTO session_analysis (session_id, analysis)
            VALUES ($1, $2)
            ON CONFLICT (session_id) DO NOTHING
            "#,
        )
        .bind(session_id.as_str())
        .bind(Json(analysis))
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(if result.rows_affected() == 0 {
            InsertOutcome::AlreadyPresent
        } else {
            InsertOutcome::Inserted
        })
    }

    async fn delete_analysis(&self, session_id: &SessionId) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM session_analysis WHERE session_id = $1")
            .bind(session_id.as_str())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}
