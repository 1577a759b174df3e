use crate::application::repos::RepoError;

/// Translate a driver failure into the storage port's error vocabulary.
pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::Duplicate {
            constraint: db.constraint().unwrap_or("unknown").to_string(),
        },
        sqlx::Error::Database(db) if db.message().contains("invalid input syntax") => {
            RepoError::InvalidInput {
                message: db.message().to_string(),
            }
        }
        sqlx::Error::Database(db) if db.message().contains("canceling statement") => {
            RepoError::Timeout
        }
        sqlx::Error::ColumnDecode { index, source } => RepoError::Integrity {
            message: format!("column {index} could not be decoded: {source}"),
        },
        other => RepoError::from_persistence(other),
    }
}
