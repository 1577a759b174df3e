//! Wire types shared by the sessionlens proxy and its command-line client.
//!
//! The proxy accepts these bodies from the browser UI and forwards
//! [`GraphqlRequest`] verbatim to the upstream API; the CLI sends the same
//! shape directly to the upstream endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Header the UI sets to skip the response-cache read for one request.
pub const FORCE_REFRESH_HEADER: &str = "x-force-refresh";

/// Header the proxy sets on cacheable responses (`HIT` or `MISS`).
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// A GraphQL operation as posted to `/query` and to the upstream endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
}

impl GraphqlRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: None,
        }
    }

    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }
}

/// Body of `POST /analyze`.
///
/// The UI posts the whole session object it already has; only `id` is read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub id: Option<String>,
}

/// One entry of a GraphQL-style `errors` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlErrorMessage {
    pub message: String,
}

/// Error body for `/query`, shaped like a GraphQL response so the UI's
/// existing error rendering keeps working.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlErrorBody {
    pub errors: Vec<GraphqlErrorMessage>,
}

impl GraphqlErrorBody {
    pub fn single(message: impl Into<String>) -> Self {
        Self {
            errors: vec![GraphqlErrorMessage {
                message: message.into(),
            }],
        }
    }
}

/// Error body for `/analyze` routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

/// Result of `DELETE /analyze/{session_id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisDeleted {
    pub deleted: bool,
}

/// Rows removed by a cache purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeSummary {
    pub responses: u64,
    pub analyses: u64,
}
