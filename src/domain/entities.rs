//! Domain entities mirrored from persistent storage.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use super::error::DomainError;
use super::fingerprint::Fingerprint;

const MAX_SESSION_ID_LEN: usize = 256;

/// A row of `api_cache`: an upstream response stored under its fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub response: Value,
    /// Nullable in the table; rows written by this service always carry it.
    pub created_at: Option<OffsetDateTime>,
}

/// A row of `session_analysis`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisEntry {
    pub session_id: SessionId,
    pub analysis: Value,
    pub created_at: Option<OffsetDateTime>,
}

/// Where a served document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOrigin {
    Cache,
    Upstream,
}

impl CacheOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheOrigin::Cache => "cache",
            CacheOrigin::Upstream => "upstream",
        }
    }

    /// Value of the `X-Cache` response header.
    pub fn header_value(self) -> &'static str {
        match self {
            CacheOrigin::Cache => "HIT",
            CacheOrigin::Upstream => "MISS",
        }
    }
}

/// Upstream session identifier supplied by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("session id is required"));
        }
        if trimmed.len() > MAX_SESSION_ID_LEN {
            return Err(DomainError::validation(format!(
                "session id exceeds {MAX_SESSION_ID_LEN} bytes"
            )));
        }
        if trimmed.chars().any(char::is_control) {
            return Err(DomainError::validation(
                "session id contains control characters",
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The caller's `Authorization` header value, forwarded verbatim upstream.
///
/// Never persisted and never printed; `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("authorization token is required"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn from_header(header: Option<&str>) -> Result<Self, DomainError> {
        match header {
            Some(value) => Self::parse(value),
            None => Err(DomainError::validation("authorization token is required")),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}
