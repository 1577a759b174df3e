//! Per-session cache of computed analyses.

use std::future::Future;
use std::sync::Arc;

use metrics::counter;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::error::ProxyError;
use super::flight::{Role, SingleFlight};
use super::repos::{AnalysisCacheRepo, InsertOutcome, RepoError};
use super::response_cache::METRIC_STORAGE_ERROR;
use crate::domain::entities::{CacheOrigin, SessionId};
use crate::domain::fingerprint::AuthScope;

pub const METRIC_ANALYSIS_HIT: &str = "sessionlens_analysis_cache_hit_total";
pub const METRIC_ANALYSIS_MISS: &str = "sessionlens_analysis_cache_miss_total";
pub const METRIC_ANALYSIS_COALESCED: &str = "sessionlens_analysis_cache_coalesced_total";

const SOURCE: &str = "application::analysis_cache";

#[derive(Debug, Clone)]
pub struct Computed {
    pub document: Value,
    pub origin: CacheOrigin,
}

pub struct AnalysisCacheService {
    store: Arc<dyn AnalysisCacheRepo>,
    /// Keyed by caller scope as well, so callers with different
    /// credentials never share one computation's outcome.
    flights: SingleFlight<(SessionId, AuthScope), Value, ProxyError>,
}

impl AnalysisCacheService {
    pub fn new(store: Arc<dyn AnalysisCacheRepo>) -> Self {
        Self {
            store,
            flights: SingleFlight::new(),
        }
    }

    /// Serve the stored analysis, or run `compute` and store its result.
    ///
    /// `compute` is not invoked on a hit. A failed computation stores nothing.
    /// Concurrent misses coalesce only within the same `scope`; the stored
    /// row is keyed by the session alone.
    pub async fn get_or_compute<F, Fut>(
        &self,
        session_id: &SessionId,
        scope: &AuthScope,
        compute: F,
    ) -> Result<Computed, ProxyError>
    where
        F: FnOnce(SessionId) -> Fut,
        Fut: Future<Output = Result<Value, ProxyError>> + Send + 'static,
    {
        match self.store.find_analysis(session_id).await {
            Ok(Some(entry)) => {
                counter!(METRIC_ANALYSIS_HIT).increment(1);
                debug!(target = SOURCE, session_id = %session_id, "analysis cache hit");
                return Ok(Computed {
                    document: entry.analysis,
                    origin: CacheOrigin::Cache,
                });
            }
            Ok(None) => {}
            Err(err) => {
                counter!(METRIC_STORAGE_ERROR, "op" => "read", "table" => "session_analysis")
                    .increment(1);
                warn!(
                    target = SOURCE,
                    session_id = %session_id,
                    error = %err,
                    "analysis cache read failed; treating as miss"
                );
            }
        }

        counter!(METRIC_ANALYSIS_MISS).increment(1);

        let store = Arc::clone(&self.store);
        let key = session_id.clone();
        let (result, role) = self
            .flights
            .run((session_id.clone(), scope.clone()), move || {
                let computation = compute(key.clone());
                async move {
                    let document = computation.await?;
                    store_analysis(store.as_ref(), &key, &document).await;
                    Ok(document)
                }
            })
            .await;

        if role == Role::Follower {
            counter!(METRIC_ANALYSIS_COALESCED).increment(1);
            debug!(
                target = SOURCE,
                session_id = %session_id,
                "joined in-flight analysis"
            );
        }

        result.map(|document| Computed {
            document,
            origin: CacheOrigin::Upstream,
        })
    }

    /// Drop the stored analysis so the next request recomputes it.
    pub async fn delete(&self, session_id: &SessionId) -> Result<bool, RepoError> {
        let deleted = self.store.delete_analysis(session_id).await?;
        info!(
            target = SOURCE,
            session_id = %session_id,
            deleted,
            "analysis invalidated"
        );
        Ok(deleted)
    }
}

async fn store_analysis(
    store: &dyn AnalysisCacheRepo,
    session_id: &SessionId,
    document: &Value,
) {
    match store.insert_analysis(session_id, document).await {
        Ok(InsertOutcome::Inserted) => {
            debug!(target = SOURCE, session_id = %session_id, "stored analysis");
        }
        Ok(InsertOutcome::AlreadyPresent) => {
            debug!(
                target = SOURCE,
                session_id = %session_id,
                "analysis already stored; kept existing row"
            );
        }
        Err(err) => {
            counter!(METRIC_STORAGE_ERROR, "op" => "write", "table" => "session_analysis")
                .increment(1);
            warn!(
                target = SOURCE,
                session_id = %session_id,
                error = %err,
                "analysis cache write failed; serving uncached analysis"
            );
        }
    }
}
