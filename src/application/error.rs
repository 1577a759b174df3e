use std::error::Error as StdError;

use axum::{http::StatusCode, response::Response};
use thiserror::Error;

use crate::{
    application::{
        analyzer::AnalysisError, flight::FlightAborted, repos::RepoError,
        upstream::UpstreamError,
    },
    domain::{entities::SessionId, error::DomainError},
    infra::error::InfraError,
};

/// Diagnostic attached to error responses for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Failures surfaced by the proxy to its callers.
#[derive(Debug, Clone, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error("session analysis is not configured")]
    AnalysisUnavailable,
    #[error("No dialogs found in session")]
    EmptySession { session_id: SessionId },
    #[error("cache storage failed: {0}")]
    Storage(#[from] RepoError),
    #[error(transparent)]
    Interrupted(#[from] FlightAborted),
}

impl ProxyError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(DomainError::validation(message))
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Storage(#[from] RepoError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
