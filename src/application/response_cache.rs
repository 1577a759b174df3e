//! Read-through cache of upstream GraphQL responses.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use serde_json::Value;
use sessionlens_api_types::GraphqlRequest;
use tracing::{debug, info, warn};

use super::flight::{Role, SingleFlight};
use super::repos::{InsertOutcome, ResponseCacheRepo};
use super::upstream::{GraphqlUpstream, UpstreamError, graphql_errors};
use crate::domain::entities::{BearerToken, CacheOrigin};
use crate::domain::fingerprint::{AuthScope, Fingerprint, ScopeMode};

pub const METRIC_RESPONSE_HIT: &str = "sessionlens_response_cache_hit_total";
pub const METRIC_RESPONSE_MISS: &str = "sessionlens_response_cache_miss_total";
pub const METRIC_RESPONSE_COALESCED: &str = "sessionlens_response_cache_coalesced_total";
pub const METRIC_STORAGE_ERROR: &str = "sessionlens_cache_storage_error_total";
pub const METRIC_UPSTREAM_MS: &str = "sessionlens_upstream_request_ms";

const SOURCE: &str = "application::response_cache";

/// A document served by the response cache.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub document: Value,
    pub origin: CacheOrigin,
    pub fingerprint: Fingerprint,
}

pub struct ResponseCacheService {
    store: Arc<dyn ResponseCacheRepo>,
    upstream: Arc<dyn GraphqlUpstream>,
    scope_mode: ScopeMode,
    flights: SingleFlight<Fingerprint, Value, UpstreamError>,
}

impl ResponseCacheService {
    pub fn new(
        store: Arc<dyn ResponseCacheRepo>,
        upstream: Arc<dyn GraphqlUpstream>,
        scope_mode: ScopeMode,
    ) -> Self {
        Self {
            store,
            upstream,
            scope_mode,
            flights: SingleFlight::new(),
        }
    }

    /// Caller scope under the configured scoping mode.
    pub fn scope(&self, token: &BearerToken) -> AuthScope {
        AuthScope::resolve(self.scope_mode, token)
    }

    pub fn fingerprint(&self, request: &GraphqlRequest, token: &BearerToken) -> Fingerprint {
        Fingerprint::compute(
            &request.query,
            request.variables.as_ref(),
            &self.scope(token),
        )
    }

    /// Serve from storage when present, otherwise fetch upstream and store.
    ///
    /// A document carrying a GraphQL `errors` array is returned as received
    /// but never stored.
    pub async fn get_or_fetch(
        &self,
        request: &GraphqlRequest,
        token: &BearerToken,
    ) -> Result<Fetched, UpstreamError> {
        let fingerprint = self.fingerprint(request, token);

        match self.store.find_response(&fingerprint).await {
            Ok(Some(entry)) => {
                counter!(METRIC_RESPONSE_HIT).increment(1);
                debug!(
                    target = SOURCE,
                    fingerprint = fingerprint.short(),
                    "response cache hit"
                );
                return Ok(Fetched {
                    document: entry.response,
                    origin: CacheOrigin::Cache,
                    fingerprint,
                });
            }
            Ok(None) => {}
            Err(err) => {
                counter!(METRIC_STORAGE_ERROR, "op" => "read", "table" => "api_cache")
                    .increment(1);
                warn!(
                    target = SOURCE,
                    fingerprint = fingerprint.short(),
                    error = %err,
                    "response cache read failed; treating as miss"
                );
            }
        }

        counter!(METRIC_RESPONSE_MISS).increment(1);
        self.fetch_through(fingerprint, request, token).await
    }

    /// Skip the storage read and go upstream. The write stays
    /// insert-if-absent, so an existing row is never replaced.
    pub async fn refresh(
        &self,
        request: &GraphqlRequest,
        token: &BearerToken,
    ) -> Result<Fetched, UpstreamError> {
        let fingerprint = self.fingerprint(request, token);
        info!(
            target = SOURCE,
            fingerprint = fingerprint.short(),
            "forced refresh requested"
        );
        counter!(METRIC_RESPONSE_MISS, "reason" => "refresh").increment(1);
        self.fetch_through(fingerprint, request, token).await
    }

    async fn fetch_through(
        &self,
        fingerprint: Fingerprint,
        request: &GraphqlRequest,
        token: &BearerToken,
    ) -> Result<Fetched, UpstreamError> {
        let store = Arc::clone(&self.store);
        let upstream = Arc::clone(&self.upstream);
        let request = request.clone();
        let token = token.clone();
        let key = fingerprint.clone();

        let (result, role) = self
            .flights
            .run(fingerprint.clone(), move || async move {
                let document = fetch_upstream(upstream.as_ref(), &request, &token).await?;
                match graphql_errors(&document) {
                    None => store_response(store.as_ref(), &key, &document).await,
                    Some(messages) => debug!(
                        target = SOURCE,
                        fingerprint = key.short(),
                        errors = messages.len(),
                        "response carries GraphQL errors; not stored"
                    ),
                }
                Ok(document)
            })
            .await;

        if role == Role::Follower {
            counter!(METRIC_RESPONSE_COALESCED).increment(1);
            debug!(
                target = SOURCE,
                fingerprint = fingerprint.short(),
                "joined in-flight upstream fetch"
            );
        }

        result.map(|document| Fetched {
            document,
            origin: CacheOrigin::Upstream,
            fingerprint,
        })
    }
}

async fn fetch_upstream(
    upstream: &dyn GraphqlUpstream,
    request: &GraphqlRequest,
    token: &BearerToken,
) -> Result<Value, UpstreamError> {
    let started_at = Instant::now();
    let result = upstream.execute(request, token).await;
    let outcome = if result.is_ok() { "ok" } else { "error" };
    histogram!(METRIC_UPSTREAM_MS, "outcome" => outcome)
        .record(started_at.elapsed().as_secs_f64() * 1000.0);

    if let Err(err) = &result {
        warn!(
            target = SOURCE,
            error = %err,
            body = err.body_excerpt().unwrap_or_default(),
            "upstream request failed"
        );
    }
    result
}

async fn store_response(
    store: &dyn ResponseCacheRepo,
    fingerprint: &Fingerprint,
    document: &Value,
) {
    match store.insert_response(fingerprint, document).await {
        Ok(InsertOutcome::Inserted) => {
            debug!(
                target = SOURCE,
                fingerprint = fingerprint.short(),
                "stored upstream response"
            );
        }
        Ok(InsertOutcome::AlreadyPresent) => {
            debug!(
                target = SOURCE,
                fingerprint = fingerprint.short(),
                "response already stored; kept existing row"
            );
        }
        Err(err) => {
            counter!(METRIC_STORAGE_ERROR, "op" => "write", "table" => "api_cache").increment(1);
            warn!(
                target = SOURCE,
                fingerprint = fingerprint.short(),
                error = %err,
                "response cache write failed; serving uncached response"
            );
        }
    }
}
