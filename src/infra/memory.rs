//! Process-local cache store for development and tests.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use time::OffsetDateTime;

use crate::application::repos::{
    AnalysisCacheRepo, CacheMaintenanceRepo, InsertOutcome, RepoError, ResponseCacheRepo,
};
use crate::domain::entities::{AnalysisEntry, CacheEntry, SessionId};
use crate::domain::fingerprint::Fingerprint;

/// Same insert-if-absent semantics as the Postgres tables, without durability.
#[derive(Clone, Default)]
pub struct InMemoryCacheStore {
    responses: Arc<DashMap<Fingerprint, CacheEntry>>,
    analyses: Arc<DashMap<SessionId, AnalysisEntry>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn response_count(&self) -> usize {
        self.responses.len()
    }

    pub fn analysis_count(&self) -> usize {
        self.analyses.len()
    }
}

#[async_trait]
impl ResponseCacheRepo for InMemoryCacheStore {
    async fn find_response(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<CacheEntry>, RepoError> {
        Ok(self
            .responses
            .get(fingerprint)
            .map(|entry| entry.value().clone()))
    }

    async fn insert_response(
        &self,
        fingerprint: &Fingerprint,
        response: &Value,
    ) -> Result<InsertOutcome, RepoError> {
        match self.responses.entry(fingerprint.clone()) {
            Entry::Occupied(_) => Ok(InsertOutcome::AlreadyPresent),
            Entry::Vacant(slot) => {
                slot.insert(CacheEntry {
                    fingerprint: fingerprint.clone(),
                    response: response.clone(),
                    created_at: Some(OffsetDateTime::now_utc()),
                });
                Ok(InsertOutcome::Inserted)
            }
        }
    }
}

#[async_trait]
impl AnalysisCacheRepo for InMemoryCacheStore {
    async fn find_analysis(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<AnalysisEntry>, RepoError> {
        Ok(self
            .analyses
            .get(session_id)
            .map(|entry| entry.value().clone()))
    }

    async fn insert_analysis(
        &self,
        session_id: &SessionId,
        analysis: &Value,
    ) -> Result<InsertOutcome, RepoError> {
        match self.analyses.entry(session_id.clone()) {
            Entry::Occupied(_) => Ok(InsertOutcome::AlreadyPresent),
            Entry::Vacant(slot) => {
                slot.insert(AnalysisEntry {
                    session_id: session_id.clone(),
                    analysis: analysis.clone(),
                    created_at: Some(OffsetDateTime::now_utc()),
                });
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    async fn delete_analysis(&self, session_id: &SessionId) -> Result<bool, RepoError> {
        Ok(self.analyses.remove(session_id).is_some())
    }
}

#[async_trait]
impl CacheMaintenanceRepo for InMemoryCacheStore {
    async fn purge_responses(&self) -> Result<u64, RepoError> {
        let count = self.responses.len() as u64;
        self.responses.clear();
        Ok(count)
    }

    async fn purge_analyses(&self) -> Result<u64, RepoError> {
        let count = self.analyses.len() as u64;
        self.analyses.clear();
        Ok(count)
    }

    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}
