//! Anthropic Messages API adapter for session analysis.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::application::analyzer::{AnalysisError, SessionAnalyzer, extract_json_object};
use crate::config::AnalysisSettings;
use crate::domain::dialogs::SessionDialogs;
use crate::infra::error::InfraError;

const SOURCE: &str = "sessionlens::infra::anthropic";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const PROMPT_HEAD: &str = "\
Analyze the following session content. Return ONLY a valid JSON object, with no \
explanation or markdown outside the JSON.

SESSION CONTENT:
";

const PROMPT_TAIL: &str = r#"
---

## TASK: 3-Part Analysis

### Part 1: Data Source Nodes
Identify `makeXxxNode` factory functions in the code. Ignore helper functions.
Extract params, output schema and usage context.

### Part 2: User Query Analysis
- Topic: classify into stock trading categories (e.g. FUNDAMENTAL_ANALYSIS, TECHNICAL_ANALYSIS).
- Sentiment: POSITIVE, NEGATIVE or NEUTRAL.
- Strategy Potential: is this a valuable trading strategy idea and why (confidence HIGH/MEDIUM/LOW). Write the reasoning in Chinese.

### Part 3: Response Evaluation
- Score: 1-5 overall quality.
- Risk: hallucination risk (LOW/MEDIUM/HIGH).
- Quality Metrics: accuracy, clarity, completeness.

## REQUIRED JSON OUTPUT FORMAT
{
  "nodes": [
    {"name": "makeXxxNode", "purpose": "string", "output_key": "string", "params": ["param1"]}
  ],
  "query_analysis": {
    "topic": "string",
    "sentiment": "POSITIVE|NEGATIVE|NEUTRAL",
    "strategy_potential": {"is_valuable": true, "reasoning": "string", "confidence": "HIGH|MEDIUM|LOW"}
  },
  "response_evaluation": {
    "overall_score": 1,
    "risk_level": "LOW|MEDIUM|HIGH",
    "quality_metrics": {"accuracy": 1, "clarity": 1, "completeness": 1}
  },
  "summary": "one sentence summary of the interaction"
}
"#;

pub fn analysis_prompt(dialogs: &SessionDialogs) -> String {
    let transcript = dialogs.render_transcript();
    let mut prompt = String::with_capacity(PROMPT_HEAD.len() + transcript.len() + PROMPT_TAIL.len());
    prompt.push_str(PROMPT_HEAD);
    prompt.push_str(&transcript);
    prompt.push_str(PROMPT_TAIL);
    prompt
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

pub struct AnthropicAnalyzer {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    messages_url: Url,
    retry_delay: Duration,
}

impl AnthropicAnalyzer {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        base_url: &Url,
    ) -> Result<Self, InfraError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        let messages_url = Url::parse(&format!(
            "{}/messages",
            base_url.as_str().trim_end_matches('/')
        ))
        .map_err(|err| InfraError::configuration(format!("analysis.base_url: {err}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
            messages_url,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    /// `None` when no API key is configured.
    pub fn from_settings(settings: &AnalysisSettings) -> Result<Option<Self>, InfraError> {
        let Some(api_key) = settings.api_key.as_deref() else {
            return Ok(None);
        };
        Self::new(
            api_key,
            settings.model.clone(),
            settings.max_tokens.get(),
            &settings.base_url,
        )
        .map(Some)
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn request_once(&self, prompt: &str) -> Result<Value, AnalysisError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: 0.0,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(self.messages_url.clone())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|err| AnalysisError::request(format!("HTTP request failed: {err}")))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| AnalysisError::request(format!("failed to read response: {err}")))?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            let message = match serde_json::from_str::<ApiErrorBody>(&text) {
                Ok(api_error) => api_error.error.message,
                Err(_) => text,
            };
            return Err(AnalysisError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: MessagesResponse = serde_json::from_slice(&bytes)
            .map_err(|err| AnalysisError::request(format!("failed to parse response: {err}")))?;
        let text = parsed
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| AnalysisError::unparsable("model reply has no text block"))?;

        extract_json_object(&text)
    }
}

/// Transport failures, throttling and server errors are worth another attempt.
fn is_retryable(err: &AnalysisError) -> bool {
    match err {
        AnalysisError::Request { .. } => true,
        AnalysisError::Provider { status, .. } => *status == 429 || *status >= 500,
        AnalysisError::Unparsable { .. } => false,
    }
}

#[async_trait]
impl SessionAnalyzer for AnthropicAnalyzer {
    async fn analyze(&self, dialogs: &SessionDialogs) -> Result<Value, AnalysisError> {
        let prompt = analysis_prompt(dialogs);

        let mut attempt = 1;
        loop {
            match self.request_once(&prompt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < MAX_ATTEMPTS && is_retryable(&err) => {
                    warn!(
                        target = SOURCE,
                        session_id = %dialogs.session_id,
                        attempt,
                        error = %err,
                        "analysis attempt failed; retrying"
                    );
                    tokio::time::sleep(self.retry_delay * attempt).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl fmt::Debug for AnthropicAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicAnalyzer")
            .field("messages_url", &self.messages_url.as_str())
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dialogs::Dialog;
    use crate::domain::entities::SessionId;

    fn session() -> SessionDialogs {
        SessionDialogs {
            session_id: SessionId::parse("s-1").expect("sid"),
            dialogs: vec![Dialog {
                question: "What moved AAPL today?".to_string(),
                answer: "Earnings.".to_string(),
            }],
            total_count: Some(1),
        }
    }

    #[test]
    fn prompt_embeds_transcript_between_instructions() {
        let prompt = analysis_prompt(&session());
        let transcript_at = prompt.find("What moved AAPL today?").expect("question");
        let task_at = prompt.find("## TASK").expect("task heading");
        assert!(prompt.starts_with("Analyze the following session content."));
        assert!(transcript_at < task_at);
        assert!(prompt.contains("\"response_evaluation\""));
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let base = Url::parse("https://api.anthropic.com/v1").expect("url");
        let analyzer =
            AnthropicAnalyzer::new("sk-ant-secret", "claude-haiku-4-5", 4000, &base).expect("build");
        let rendered = format!("{analyzer:?}");
        assert!(!rendered.contains("sk-ant-secret"));
        assert!(rendered.contains("https://api.anthropic.com/v1/messages"));
    }

    #[test]
    fn only_transient_failures_are_retried() {
        assert!(is_retryable(&AnalysisError::request("reset")));
        assert!(is_retryable(&AnalysisError::Provider {
            status: 529,
            message: "overloaded".into()
        }));
        assert!(!is_retryable(&AnalysisError::Provider {
            status: 401,
            message: "bad key".into()
        }));
        assert!(!is_retryable(&AnalysisError::unparsable("prose")));
    }
}
