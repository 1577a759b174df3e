//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::entities::{AnalysisEntry, CacheEntry, SessionId};
use crate::domain::fingerprint::Fingerprint;

#[derive(Debug, Clone, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Result of an insert-if-absent write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A row already existed for the key and was left untouched.
    AlreadyPresent,
}

/// Storage port for the `api_cache` table.
///
/// Rows are write-once: the only mutation is insert-if-absent.
#[async_trait]
pub trait ResponseCacheRepo: Send + Sync {
    async fn find_response(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<CacheEntry>, RepoError>;

    async fn insert_response(
        &self,
        fingerprint: &Fingerprint,
        response: &Value,
    ) -> Result<InsertOutcome, RepoError>;
}

/// Storage port for the `session_analysis` table.
#[async_trait]
pub trait AnalysisCacheRepo: Send + Sync {
    async fn find_analysis(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<AnalysisEntry>, RepoError>;

    async fn insert_analysis(
        &self,
        session_id: &SessionId,
        analysis: &Value,
    ) -> Result<InsertOutcome, RepoError>;

    /// Remove one analysis so the next request recomputes it.
    async fn delete_analysis(&self, session_id: &SessionId) -> Result<bool, RepoError>;
}

/// Operator-side maintenance over both tables.
#[async_trait]
pub trait CacheMaintenanceRepo: Send + Sync {
    async fn purge_responses(&self) -> Result<u64, RepoError>;

    async fn purge_analyses(&self) -> Result<u64, RepoError>;

    async fn ping(&self) -> Result<(), RepoError>;
}

/// Every storage port at once, for wiring a single backend.
pub trait CacheStore: ResponseCacheRepo + AnalysisCacheRepo + CacheMaintenanceRepo {}

impl<T> CacheStore for T where T: ResponseCacheRepo + AnalysisCacheRepo + CacheMaintenanceRepo {}
