//! Session dialog queries and the transcript handed to the analyzer.

use serde_json::Value;
use sessionlens_api_types::GraphqlRequest;

use super::entities::SessionId;
use super::error::DomainError;

/// Lower bound of the dialog creation window (unix seconds).
pub const DIALOG_WINDOW_START: i64 = 0;
/// Upper bound of the dialog creation window (2100-01-01T00:00:00Z).
pub const DIALOG_WINDOW_END: i64 = 4_102_416_000;
pub const DIALOG_LIMIT: u32 = 100;
/// Answers longer than this are cut before they reach the analyzer prompt.
pub const MAX_ANSWER_CHARS: usize = 2000;

const TRANSCRIPT_SEPARATOR_WIDTH: usize = 40;

/// Build the `QueryDialogs` request for one session.
///
/// The session id is inlined as a JSON string literal, which is also a valid
/// GraphQL string literal.
pub fn dialogs_query(session_id: &SessionId) -> GraphqlRequest {
    let sid = Value::String(session_id.as_str().to_string()).to_string();
    let query = format!(
        "query {{ Result: QueryDialogs(input: {{sid: {sid}, limit: {DIALOG_LIMIT}, offset: 0, \
         showAdmin: true, showDeleted: true, createdAtStart: {DIALOG_WINDOW_START}, \
         createdAtEnd: {DIALOG_WINDOW_END}}}) {{ totalCount list {{ qid uid sid skillId question \
         error createdAt updatedAt deletedAt platform answer }} }} }}"
    );
    GraphqlRequest::new(query).with_variables(Value::Object(Default::default()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialog {
    pub question: String,
    pub answer: String,
}

/// Dialogs extracted from a `QueryDialogs` response payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDialogs {
    pub session_id: SessionId,
    pub dialogs: Vec<Dialog>,
    pub total_count: Option<u64>,
}

impl SessionDialogs {
    pub fn from_payload(session_id: SessionId, payload: &Value) -> Result<Self, DomainError> {
        let result = payload
            .get("data")
            .and_then(|data| data.get("Result"))
            .ok_or_else(|| DomainError::invariant("dialog payload is missing `data.Result`"))?;

        let list = match result.get("list") {
            None | Some(Value::Null) => &[][..],
            Some(Value::Array(items)) => items.as_slice(),
            Some(_) => {
                return Err(DomainError::invariant(
                    "dialog payload `data.Result.list` is not an array",
                ));
            }
        };

        let dialogs = list
            .iter()
            .map(|item| Dialog {
                question: text_field(item, "question"),
                answer: text_field(item, "answer"),
            })
            .collect();

        Ok(Self {
            session_id,
            dialogs,
            total_count: result.get("totalCount").and_then(Value::as_u64),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.dialogs.is_empty()
    }

    /// Plain-text transcript of the session, one block per dialog.
    pub fn render_transcript(&self) -> String {
        let separator = "-".repeat(TRANSCRIPT_SEPARATOR_WIDTH);
        let mut out = String::new();
        for dialog in &self.dialogs {
            out.push_str("User Query:\n");
            out.push_str(&dialog.question);
            out.push_str("\n\nModel Output:\n");
            out.push_str(&truncate_chars(&dialog.answer, MAX_ANSWER_CHARS));
            out.push_str("\n\n");
            out.push_str(&separator);
            out.push_str("\n\n");
        }
        out
    }
}

fn text_field(item: &Value, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(text)) => text.clone(),
        None | Some(Value::Null) => String::new(),
        Some(other) => other.to_string(),
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
