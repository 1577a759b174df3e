//! Port for the service that turns a session transcript into an analysis.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::dialogs::SessionDialogs;

#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    #[error("analysis request failed: {message}")]
    Request { message: String },
    #[error("analysis provider responded with status {status}: {message}")]
    Provider { status: u16, message: String },
    #[error("analysis output is not a JSON object: {message}")]
    Unparsable { message: String },
}

impl AnalysisError {
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
        }
    }

    pub fn unparsable(message: impl Into<String>) -> Self {
        Self::Unparsable {
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait SessionAnalyzer: Send + Sync {
    async fn analyze(&self, dialogs: &SessionDialogs) -> Result<Value, AnalysisError>;
}

/// Parse the span from the first `{` to the last `}` of model output.
pub fn extract_json_object(text: &str) -> Result<Value, AnalysisError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let (start, end) = match (start, end) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => return Err(AnalysisError::unparsable("no JSON object in model output")),
    };

    let value: Value = serde_json::from_str(&text[start..=end])
        .map_err(|err| AnalysisError::unparsable(err.to_string()))?;
    if !value.is_object() {
        return Err(AnalysisError::unparsable("top-level value is not an object"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_object_from_fenced_output() {
        let text = "Here you go:\n```json\n{\"summary\": \"ok\", \"nodes\": []}\n```\n";
        assert_eq!(
            extract_json_object(text).expect("object"),
            json!({ "summary": "ok", "nodes": [] })
        );
    }

    #[test]
    fn rejects_output_without_braces() {
        assert!(matches!(
            extract_json_object("I cannot help with that."),
            Err(AnalysisError::Unparsable { .. })
        ));
        assert!(extract_json_object("} backwards {").is_err());
    }

    #[test]
    fn rejects_invalid_json_between_braces() {
        assert!(extract_json_object("{ summary: unquoted }").is_err());
    }
}
