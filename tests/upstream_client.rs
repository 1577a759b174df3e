use std::time::Duration;

use httpmock::MockServer;
use reqwest::Url;
use serde_json::json;
use sessionlens::application::analyzer::{AnalysisError, SessionAnalyzer};
use sessionlens::application::upstream::{GraphqlUpstream, UpstreamError};
use sessionlens::domain::dialogs::{Dialog, SessionDialogs};
use sessionlens::domain::entities::{BearerToken, SessionId};
use sessionlens::infra::anthropic::AnthropicAnalyzer;
use sessionlens::infra::upstream::ReqwestGraphqlClient;
use sessionlens_api_types::GraphqlRequest;

fn client(server: &MockServer) -> ReqwestGraphqlClient {
    let endpoint = Url::parse(&server.url("/query")).expect("endpoint");
    ReqwestGraphqlClient::new(endpoint, Duration::from_secs(5)).expect("client")
}

fn token() -> BearerToken {
    BearerToken::parse("Bearer upstream-secret").expect("token")
}

#[tokio::test]
async fn posts_query_with_verbatim_authorization() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST")
            .path("/query")
            .header("authorization", "Bearer upstream-secret")
            .json_body(json!({"query": "{ a }", "variables": {}}));
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"data":{"a":1}}"#);
    });

    let document = client(&server)
        .execute(&GraphqlRequest::new("{ a }"), &token())
        .await
        .expect("document");

    mock.assert();
    assert_eq!(document, json!({"data": {"a": 1}}));
}

#[tokio::test]
async fn non_success_status_is_reported_with_body() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("POST").path("/query");
        then.status(403).body("forbidden");
    });

    let err = client(&server)
        .execute(&GraphqlRequest::new("{ a }"), &token())
        .await
        .expect_err("403");

    match err {
        UpstreamError::Status { status, body } => {
            assert_eq!(status, 403);
            assert_eq!(body, "forbidden");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("POST").path("/query");
        then.status(200).body("<html>gateway</html>");
    });

    let err = client(&server)
        .execute(&GraphqlRequest::new("{ a }"), &token())
        .await
        .expect_err("malformed");
    assert!(matches!(err, UpstreamError::Malformed { .. }));
}

#[tokio::test]
async fn transport_errors_never_mention_the_token() {
    // Nothing listens on port 9 of the loopback interface.
    let endpoint = Url::parse("http://127.0.0.1:9/query").expect("endpoint");
    let client = ReqwestGraphqlClient::new(endpoint, Duration::from_secs(2)).expect("client");

    let err = client
        .execute(&GraphqlRequest::new("{ a }"), &token())
        .await
        .expect_err("connection refused");

    assert!(matches!(err, UpstreamError::Transport { .. }));
    assert!(!err.to_string().contains("upstream-secret"));
}

fn session() -> SessionDialogs {
    SessionDialogs {
        session_id: SessionId::parse("s-1").expect("sid"),
        dialogs: vec![Dialog {
            question: "Is NVDA overbought?".into(),
            answer: "RSI is 74.".into(),
        }],
        total_count: Some(1),
    }
}

fn analyzer(server: &MockServer) -> AnthropicAnalyzer {
    let base = Url::parse(&server.url("/v1")).expect("base url");
    AnthropicAnalyzer::new("sk-test", "claude-haiku-4-5", 4000, &base)
        .expect("analyzer")
        .with_retry_delay(Duration::from_millis(1))
}

#[tokio::test]
async fn analyzer_extracts_json_from_text_block() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST")
            .path("/v1/messages")
            .header("x-api-key", "sk-test")
            .header("anthropic-version", "2023-06-01")
            .json_body_includes(r#"{"model":"claude-haiku-4-5","max_tokens":4000,"temperature":0.0}"#);
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "content": [
                    {"type": "text", "text": "Here you go:\n{\"summary\": \"asks about RSI\"}\nDone."}
                ]
            }));
    });

    let analysis = analyzer(&server)
        .analyze(&session())
        .await
        .expect("analysis");

    mock.assert();
    assert_eq!(analysis, json!({"summary": "asks about RSI"}));
}

#[tokio::test]
async fn analyzer_retries_server_errors_then_gives_up() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST").path("/v1/messages");
        then.status(529)
            .header("content-type", "application/json")
            .body(r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#);
    });

    let err = analyzer(&server)
        .analyze(&session())
        .await
        .expect_err("overloaded");

    mock.assert_hits(3);
    match err {
        AnalysisError::Provider { status, message } => {
            assert_eq!(status, 529);
            assert_eq!(message, "Overloaded");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn analyzer_does_not_retry_unparsable_output() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST").path("/v1/messages");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({"content": [{"type": "text", "text": "I cannot help with that."}]}));
    });

    let err = analyzer(&server)
        .analyze(&session())
        .await
        .expect_err("unparsable");

    mock.assert_hits(1);
    assert!(matches!(err, AnalysisError::Unparsable { .. }));
}
