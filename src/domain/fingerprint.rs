//! Content fingerprints for upstream GraphQL requests.
//!
//! A fingerprint is the lowercase hex SHA-256 of a canonical JSON envelope:
//!
//! ```text
//! {"query":<trimmed query>,"scope":<auth scope or null>,"variables":<sorted variables>}
//! ```
//!
//! Object keys are sorted recursively before serialization, so the byte form
//! never depends on the order in which the UI assembled its variables.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::entities::BearerToken;
use super::error::DomainError;

const FINGERPRINT_HEX_LEN: usize = 64;

/// How caller identity participates in response fingerprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeMode {
    /// Every distinct token gets its own cache namespace.
    #[default]
    Token,
    /// Responses are shared between callers. Only safe when upstream
    /// results do not depend on who is asking.
    Shared,
}

impl ScopeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ScopeMode::Token => "token",
            ScopeMode::Shared => "shared",
        }
    }
}

impl std::str::FromStr for ScopeMode {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "token" => Ok(ScopeMode::Token),
            "shared" => Ok(ScopeMode::Shared),
            other => Err(DomainError::validation(format!(
                "unknown cache scope `{other}` (expected `token` or `shared`)"
            ))),
        }
    }
}

/// Caller-identity dimension folded into a fingerprint.
///
/// Holds a digest of the token, never the token itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthScope(Option<String>);

impl AuthScope {
    pub fn shared() -> Self {
        Self(None)
    }

    pub fn for_token(token: &BearerToken) -> Self {
        Self(Some(sha256_hex(token.expose().as_bytes())))
    }

    pub fn resolve(mode: ScopeMode, token: &BearerToken) -> Self {
        match mode {
            ScopeMode::Token => Self::for_token(token),
            ScopeMode::Shared => Self::shared(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(query: &str, variables: Option<&Value>, scope: &AuthScope) -> Self {
        let canonical = canonical_request(query, variables, scope);
        Self(sha256_hex(canonical.as_bytes()))
    }

    /// Accept a stored fingerprint, checking its shape.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let valid = raw.len() == FINGERPRINT_HEX_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !valid {
            return Err(DomainError::invariant(format!(
                "`{raw}` is not a {FINGERPRINT_HEX_LEN}-character lowercase hex digest"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The exact string hashed into a fingerprint.
pub fn canonical_request(query: &str, variables: Option<&Value>, scope: &AuthScope) -> String {
    let variables = match variables {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(value) => canonicalize(value),
    };

    let mut envelope = Map::new();
    envelope.insert("query".to_string(), Value::String(query.trim().to_string()));
    envelope.insert(
        "scope".to_string(),
        scope
            .as_str()
            .map_or(Value::Null, |digest| Value::String(digest.to_string())),
    );
    envelope.insert("variables".to_string(), variables);

    Value::Object(envelope).to_string()
}

/// Rebuild a JSON value with every object's keys in lexicographic order.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (key, inner) in entries {
                sorted.insert(key.clone(), canonicalize(inner));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    hex::encode(&digest[..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SCENARIO_QUERY: &str = r#"{sessions(id:"s1"){dialogs}}"#;

    fn token(raw: &str) -> BearerToken {
        BearerToken::parse(raw).expect("token")
    }

    #[test]
    fn shared_scope_fingerprint_is_pinned() {
        let fp = Fingerprint::compute(SCENARIO_QUERY, Some(&json!({})), &AuthScope::shared());
        assert_eq!(
            fp.as_str(),
            "493f9780f2228c62643cc5bdb8922c129e1374f9a2cc81f51b4e966b39e39e57"
        );
    }

    #[test]
    fn token_scope_fingerprint_is_pinned() {
        let scope = AuthScope::for_token(&token("Bearer abc"));
        assert_eq!(
            scope.as_str(),
            Some("c355dce96c1612880d11940ffdd9014d386c253e0c3652a6cd06a7226f7bd2b6")
        );
        let fp = Fingerprint::compute(SCENARIO_QUERY, Some(&json!({})), &scope);
        assert_eq!(
            fp.as_str(),
            "361ce4b5bcf9c4e145b2ae82648b492f9b60df7ccc763d7c0d6977862e710945"
        );
    }

    #[test]
    fn canonical_form_is_compact_and_sorted() {
        let canonical = canonical_request(
            "  query { a } ",
            Some(&json!({ "b": 1, "a": { "z": true, "y": [ { "d": 0, "c": 1 } ] } })),
            &AuthScope::shared(),
        );
        assert_eq!(
            canonical,
            r#"{"query":"query { a }","scope":null,"variables":{"a":{"y":[{"c":1,"d":0}],"z":true},"b":1}}"#
        );
    }

    #[test]
    fn variable_key_order_does_not_matter() {
        let scope = AuthScope::shared();
        let forward: Value =
            serde_json::from_str(r#"{"sid":"s1","page":{"limit":20,"offset":0}}"#).expect("json");
        let reverse: Value =
            serde_json::from_str(r#"{"page":{"offset":0,"limit":20},"sid":"s1"}"#).expect("json");
        assert_eq!(
            Fingerprint::compute("q", Some(&forward), &scope),
            Fingerprint::compute("q", Some(&reverse), &scope)
        );
    }

    #[test]
    fn missing_and_null_variables_equal_empty_object() {
        let scope = AuthScope::shared();
        let empty = Fingerprint::compute("q", Some(&json!({})), &scope);
        assert_eq!(Fingerprint::compute("q", None, &scope), empty);
        assert_eq!(Fingerprint::compute("q", Some(&Value::Null), &scope), empty);
    }

    #[test]
    fn distinct_inputs_give_distinct_fingerprints() {
        let scope = AuthScope::shared();
        let base = Fingerprint::compute("q", Some(&json!({ "limit": 20 })), &scope);
        let corpus = [
            Fingerprint::compute("q2", Some(&json!({ "limit": 20 })), &scope),
            Fingerprint::compute("q", Some(&json!({ "limit": 21 })), &scope),
            Fingerprint::compute("q", Some(&json!({ "limit": "20" })), &scope),
            Fingerprint::compute("q", Some(&json!({ "limit": [20] })), &scope),
            Fingerprint::compute("q", Some(&json!({ "limit": 20, "offset": 0 })), &scope),
            Fingerprint::compute("q", Some(&json!({ "limit": 20 })), &AuthScope::for_token(&token("t1"))),
        ];
        let mut seen = std::collections::HashSet::new();
        seen.insert(base.clone());
        for fp in corpus {
            assert!(seen.insert(fp), "collision in fingerprint corpus");
        }
    }

    #[test]
    fn token_mode_separates_callers_and_shared_mode_does_not() {
        let alice = token("Bearer alice");
        let bob = token("Bearer bob");
        let vars = json!({});

        let a = Fingerprint::compute("q", Some(&vars), &AuthScope::resolve(ScopeMode::Token, &alice));
        let b = Fingerprint::compute("q", Some(&vars), &AuthScope::resolve(ScopeMode::Token, &bob));
        assert_ne!(a, b);

        let a = Fingerprint::compute("q", Some(&vars), &AuthScope::resolve(ScopeMode::Shared, &alice));
        let b = Fingerprint::compute("q", Some(&vars), &AuthScope::resolve(ScopeMode::Shared, &bob));
        assert_eq!(a, b);
    }

    #[test]
    fn scope_never_contains_raw_token() {
        let scope = AuthScope::for_token(&token("Bearer plaintext-secret"));
        let canonical = canonical_request("q", None, &scope);
        assert!(!canonical.contains("plaintext-secret"));
    }

    #[test]
    fn parse_accepts_only_lowercase_hex_digests() {
        let fp = Fingerprint::compute("q", None, &AuthScope::shared());
        assert_eq!(Fingerprint::parse(fp.as_str()).expect("round trip"), fp);
        assert!(Fingerprint::parse("abc").is_err());
        assert!(Fingerprint::parse(&fp.as_str().to_uppercase()).is_err());
        assert_eq!(fp.short().len(), 8);
    }

    #[test]
    fn scope_mode_parses_case_insensitively() {
        assert_eq!("Shared".parse::<ScopeMode>().expect("mode"), ScopeMode::Shared);
        assert_eq!("token".parse::<ScopeMode>().expect("mode"), ScopeMode::Token);
        assert!("tenant".parse::<ScopeMode>().is_err());
    }
}
