//! Composition point in front of both caches.
//!
//! Validates the inbound fields, then hands off to the response cache for
//! raw queries and to the analysis cache for session analyses. The analysis
//! computation gathers its dialogs through the response cache.

use std::sync::Arc;

use serde_json::Value;
use sessionlens_api_types::GraphqlRequest;

use super::analysis_cache::{AnalysisCacheService, Computed};
use super::analyzer::SessionAnalyzer;
use super::error::ProxyError;
use super::response_cache::{Fetched, ResponseCacheService};
use super::upstream::{UpstreamError, graphql_errors};
use crate::domain::dialogs::{SessionDialogs, dialogs_query};
use crate::domain::entities::{BearerToken, SessionId};

pub struct ProxyService {
    responses: Arc<ResponseCacheService>,
    analyses: Arc<AnalysisCacheService>,
    analyzer: Option<Arc<dyn SessionAnalyzer>>,
}

impl ProxyService {
    pub fn new(
        responses: Arc<ResponseCacheService>,
        analyses: Arc<AnalysisCacheService>,
        analyzer: Option<Arc<dyn SessionAnalyzer>>,
    ) -> Self {
        Self {
            responses,
            analyses,
            analyzer,
        }
    }

    /// Serve a raw GraphQL query through the response cache.
    pub async fn query(
        &self,
        request: GraphqlRequest,
        authorization: Option<&str>,
        force_refresh: bool,
    ) -> Result<Fetched, ProxyError> {
        let request = validate_query(request)?;
        let token = BearerToken::from_header(authorization)?;

        let fetched = if force_refresh {
            self.responses.refresh(&request, &token).await?
        } else {
            self.responses.get_or_fetch(&request, &token).await?
        };
        Ok(fetched)
    }

    /// Serve the analysis of one session, computing it on first request.
    pub async fn analyze(
        &self,
        session_id: Option<&str>,
        authorization: Option<&str>,
    ) -> Result<Computed, ProxyError> {
        let session_id = SessionId::parse(session_id.unwrap_or_default())?;
        let token = BearerToken::from_header(authorization)?;

        let scope = self.responses.scope(&token);
        let responses = Arc::clone(&self.responses);
        let analyzer = self.analyzer.clone();
        self.analyses
            .get_or_compute(&session_id, &scope, move |session_id| {
                compute_analysis(responses, analyzer, session_id, token)
            })
            .await
    }

    /// Drop one stored analysis. Requires a credential like every other route.
    pub async fn delete_analysis(
        &self,
        session_id: &str,
        authorization: Option<&str>,
    ) -> Result<bool, ProxyError> {
        let session_id = SessionId::parse(session_id)?;
        BearerToken::from_header(authorization)?;
        Ok(self.analyses.delete(&session_id).await?)
    }
}

async fn compute_analysis(
    responses: Arc<ResponseCacheService>,
    analyzer: Option<Arc<dyn SessionAnalyzer>>,
    session_id: SessionId,
    token: BearerToken,
) -> Result<Value, ProxyError> {
    let analyzer = analyzer.ok_or(ProxyError::AnalysisUnavailable)?;

    let fetched = responses
        .get_or_fetch(&dialogs_query(&session_id), &token)
        .await?;
    if let Some(messages) = graphql_errors(&fetched.document) {
        return Err(UpstreamError::Graphql { messages }.into());
    }
    let dialogs = SessionDialogs::from_payload(session_id, &fetched.document)
        .map_err(|err| UpstreamError::malformed(err.to_string()))?;
    if dialogs.is_empty() {
        return Err(ProxyError::EmptySession {
            session_id: dialogs.session_id,
        });
    }

    Ok(analyzer.analyze(&dialogs).await?)
}

fn validate_query(mut request: GraphqlRequest) -> Result<GraphqlRequest, ProxyError> {
    if request.query.trim().is_empty() {
        return Err(ProxyError::validation("query is required"));
    }
    match request.variables {
        None | Some(Value::Null) => request.variables = None,
        Some(Value::Object(_)) => {}
        Some(_) => return Err(ProxyError::validation("variables must be a JSON object")),
    }
    Ok(request)
}
