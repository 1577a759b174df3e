//! Port for the remote GraphQL API.

use async_trait::async_trait;
use serde_json::Value;
use sessionlens_api_types::GraphqlRequest;
use thiserror::Error;

use super::flight::FlightAborted;
use crate::domain::entities::BearerToken;

const BODY_EXCERPT_CHARS: usize = 200;

/// Failure of one upstream call. Messages never include the caller's token.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {message}")]
    Transport { message: String },
    #[error("upstream responded with status {status}")]
    Status { status: u16, body: String },
    #[error("upstream returned a malformed payload: {message}")]
    Malformed { message: String },
    #[error("upstream reported GraphQL errors: {}", messages.join("; "))]
    Graphql { messages: Vec<String> },
}

impl UpstreamError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Leading part of a non-success response body, for diagnostics.
    pub fn body_excerpt(&self) -> Option<&str> {
        match self {
            UpstreamError::Status { body, .. } if !body.is_empty() => {
                let end = body
                    .char_indices()
                    .nth(BODY_EXCERPT_CHARS)
                    .map_or(body.len(), |(index, _)| index);
                Some(&body[..end])
            }
            _ => None,
        }
    }

    /// Status worth echoing to the caller unchanged (credential problems).
    pub fn passthrough_status(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } if matches!(status, 401 | 403) => Some(*status),
            _ => None,
        }
    }
}

impl From<FlightAborted> for UpstreamError {
    fn from(err: FlightAborted) -> Self {
        Self::transport(err.to_string())
    }
}

#[async_trait]
pub trait GraphqlUpstream: Send + Sync {
    /// Execute `request` with the caller's credential and return the JSON
    /// document from a successful response.
    async fn execute(
        &self,
        request: &GraphqlRequest,
        token: &BearerToken,
    ) -> Result<Value, UpstreamError>;
}

/// Messages of a non-empty top-level `errors` array, if present.
pub fn graphql_errors(document: &Value) -> Option<Vec<String>> {
    let errors = document.get("errors")?.as_array()?;
    if errors.is_empty() {
        return None;
    }
    Some(
        errors
            .iter()
            .map(|error| match error.get("message").and_then(Value::as_str) {
                Some(message) => message.to_string(),
                None => error.to_string(),
            })
            .collect(),
    )
}
