mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;
use sessionlens::application::upstream::UpstreamError;
use sessionlens::domain::entities::{BearerToken, CacheOrigin};
use sessionlens::domain::fingerprint::ScopeMode;
use sessionlens_api_types::GraphqlRequest;

use common::{FakeUpstream, Harness, token};

fn sessions_request() -> GraphqlRequest {
    GraphqlRequest::new(r#"{sessions(id:"s1"){dialogs}}"#).with_variables(json!({}))
}

#[tokio::test]
async fn repeated_query_is_served_from_storage() {
    let document = json!({"data": {"sessions": {"dialogs": []}}});
    let harness = Harness::with_scope(
        FakeUpstream::replying(document.clone()),
        None,
        ScopeMode::Shared,
    );

    let first = harness
        .responses
        .get_or_fetch(&sessions_request(), &token())
        .await
        .expect("first fetch");
    let second = harness
        .responses
        .get_or_fetch(&sessions_request(), &token())
        .await
        .expect("second fetch");

    assert_eq!(first.origin, CacheOrigin::Upstream);
    assert_eq!(second.origin, CacheOrigin::Cache);
    assert_eq!(first.document, document);
    assert_eq!(second.document, document);
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(
        first.fingerprint.as_str(),
        "493f9780f2228c62643cc5bdb8922c129e1374f9a2cc81f51b4e966b39e39e57"
    );
    assert_eq!(harness.upstream.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_misses_share_one_upstream_call_and_one_row() {
    let upstream =
        FakeUpstream::replying(json!({"data": {"ok": true}})).with_delay(Duration::from_millis(50));
    let harness = Harness::new(upstream, None);
    let responses = Arc::clone(&harness.responses);

    let (req_a, tok_a) = (sessions_request(), token());
    let (req_b, tok_b) = (sessions_request(), token());
    let (a, b) = tokio::join!(
        responses.get_or_fetch(&req_a, &tok_a),
        responses.get_or_fetch(&req_b, &tok_b),
    );
    let a = a.expect("first caller");
    let b = b.expect("second caller");

    assert_eq!(a.document, b.document);
    assert_eq!(a.fingerprint, b.fingerprint);
    assert_eq!(harness.upstream.calls(), 1);
    assert_eq!(harness.store.inner.response_count(), 1);
}

#[tokio::test]
async fn stored_row_survives_upstream_outage() {
    let document = json!({"data": {"n": 1}});
    let served = Arc::new(AtomicUsize::new(0));
    let reply = document.clone();
    let counter = Arc::clone(&served);
    let harness = Harness::new(
        FakeUpstream::with(move |_, _| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(reply.clone())
            } else {
                Err(UpstreamError::transport("connection refused"))
            }
        }),
        None,
    );

    let first = harness
        .responses
        .get_or_fetch(&sessions_request(), &token())
        .await
        .expect("warm");
    let second = harness
        .responses
        .get_or_fetch(&sessions_request(), &token())
        .await
        .expect("served from storage while upstream is down");

    assert_eq!(first.origin, CacheOrigin::Upstream);
    assert_eq!(second.origin, CacheOrigin::Cache);
    assert_eq!(second.document, document);
    assert_eq!(harness.upstream.calls(), 1);
}

#[tokio::test]
async fn failed_fetch_stores_nothing() {
    let harness = Harness::new(
        FakeUpstream::failing(UpstreamError::Status {
            status: 500,
            body: "boom".into(),
        }),
        None,
    );

    let err = harness
        .responses
        .get_or_fetch(&sessions_request(), &token())
        .await
        .expect_err("upstream failure");
    assert!(matches!(err, UpstreamError::Status { status: 500, .. }));
    assert_eq!(harness.store.inner.response_count(), 0);

    // Failures are not remembered: the next call retries upstream.
    let _ = harness
        .responses
        .get_or_fetch(&sessions_request(), &token())
        .await;
    assert_eq!(harness.upstream.calls(), 2);
}

#[tokio::test]
async fn graphql_errors_are_returned_unchanged_but_not_cached() {
    let document = json!({
        "data": {"a": 1},
        "errors": [{"message": "b failed", "path": ["b"]}]
    });
    let harness = Harness::new(FakeUpstream::replying(document.clone()), None);

    let first = harness
        .responses
        .get_or_fetch(&sessions_request(), &token())
        .await
        .expect("partial result");
    let second = harness
        .responses
        .get_or_fetch(&sessions_request(), &token())
        .await
        .expect("partial result again");

    assert_eq!(first.document, document);
    assert_eq!(second.origin, CacheOrigin::Upstream);
    assert_eq!(harness.store.inner.response_count(), 0);
    assert_eq!(harness.upstream.calls(), 2);
}

#[tokio::test]
async fn token_scope_separates_callers() {
    let harness = Harness::new(FakeUpstream::replying(json!({"data": 1})), None);
    let other = BearerToken::parse("Bearer someone-else").expect("token");

    let mine = harness
        .responses
        .get_or_fetch(&sessions_request(), &token())
        .await
        .expect("mine");
    let theirs = harness
        .responses
        .get_or_fetch(&sessions_request(), &other)
        .await
        .expect("theirs");

    assert_ne!(mine.fingerprint, theirs.fingerprint);
    assert_eq!(theirs.origin, CacheOrigin::Upstream);
    assert_eq!(harness.upstream.calls(), 2);
    assert_eq!(
        harness.upstream.tokens(),
        vec![common::TOKEN.to_string(), "Bearer someone-else".to_string()]
    );
}

#[tokio::test]
async fn shared_scope_serves_every_caller_from_one_row() {
    let harness = Harness::with_scope(
        FakeUpstream::replying(json!({"data": 1})),
        None,
        ScopeMode::Shared,
    );
    let other = BearerToken::parse("Bearer someone-else").expect("token");

    harness
        .responses
        .get_or_fetch(&sessions_request(), &token())
        .await
        .expect("mine");
    let theirs = harness
        .responses
        .get_or_fetch(&sessions_request(), &other)
        .await
        .expect("theirs");

    assert_eq!(theirs.origin, CacheOrigin::Cache);
    assert_eq!(harness.upstream.calls(), 1);
}

#[tokio::test]
async fn refresh_goes_upstream_but_keeps_the_first_row() {
    let counter = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&counter);
    let harness = Harness::new(
        FakeUpstream::with(move |_, _| {
            let n = seen.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"data": {"version": n}}))
        }),
        None,
    );

    let first = harness
        .responses
        .get_or_fetch(&sessions_request(), &token())
        .await
        .expect("first");
    let refreshed = harness
        .responses
        .refresh(&sessions_request(), &token())
        .await
        .expect("refresh");
    let cached = harness
        .responses
        .get_or_fetch(&sessions_request(), &token())
        .await
        .expect("cached");

    assert_eq!(refreshed.origin, CacheOrigin::Upstream);
    assert_eq!(refreshed.document, json!({"data": {"version": 1}}));
    assert_eq!(cached.document, first.document);
    assert_eq!(harness.upstream.calls(), 2);
}

#[tokio::test]
async fn storage_read_failure_falls_back_to_upstream() {
    let harness = Harness::new(FakeUpstream::replying(json!({"data": 1})), None);
    harness.store.fail_reads(true);

    let fetched = harness
        .responses
        .get_or_fetch(&sessions_request(), &token())
        .await
        .expect("served despite read failure");

    assert_eq!(fetched.origin, CacheOrigin::Upstream);
    assert_eq!(harness.upstream.calls(), 1);
}

#[tokio::test]
async fn storage_write_failure_still_returns_document() {
    let harness = Harness::new(FakeUpstream::replying(json!({"data": 1})), None);
    harness.store.fail_writes(true);

    let fetched = harness
        .responses
        .get_or_fetch(&sessions_request(), &token())
        .await
        .expect("served despite write failure");

    assert_eq!(fetched.document, json!({"data": 1}));
    assert_eq!(harness.store.inner.response_count(), 0);
}
