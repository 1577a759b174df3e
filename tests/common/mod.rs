//! Shared fakes for the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use sessionlens::application::analysis_cache::AnalysisCacheService;
use sessionlens::application::analyzer::{AnalysisError, SessionAnalyzer};
use sessionlens::application::maintenance::MaintenanceService;
use sessionlens::application::proxy::ProxyService;
use sessionlens::application::repos::{
    AnalysisCacheRepo, CacheMaintenanceRepo, InsertOutcome, RepoError, ResponseCacheRepo,
};
use sessionlens::application::response_cache::ResponseCacheService;
use sessionlens::application::upstream::{GraphqlUpstream, UpstreamError};
use sessionlens::domain::dialogs::SessionDialogs;
use sessionlens::domain::entities::{AnalysisEntry, BearerToken, CacheEntry, SessionId};
use sessionlens::domain::fingerprint::{Fingerprint, ScopeMode};
use sessionlens::infra::http::HttpState;
use sessionlens::infra::memory::InMemoryCacheStore;
use sessionlens_api_types::GraphqlRequest;

pub const TOKEN: &str = "Bearer test-token";

pub fn token() -> BearerToken {
    BearerToken::parse(TOKEN).expect("token")
}

type Reply =
    Arc<dyn Fn(&GraphqlRequest, &BearerToken) -> Result<Value, UpstreamError> + Send + Sync>;

/// Upstream double that counts calls and records the credentials it saw.
#[derive(Clone)]
pub struct FakeUpstream {
    calls: Arc<AtomicUsize>,
    tokens: Arc<Mutex<Vec<String>>>,
    delay: Duration,
    reply: Reply,
}

impl FakeUpstream {
    pub fn replying(document: Value) -> Self {
        Self::with(move |_, _| Ok(document.clone()))
    }

    pub fn failing(err: UpstreamError) -> Self {
        Self::with(move |_, _| Err(err.clone()))
    }

    pub fn with<F>(reply: F) -> Self
    where
        F: Fn(&GraphqlRequest, &BearerToken) -> Result<Value, UpstreamError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            tokens: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
            reply: Arc::new(reply),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().expect("tokens lock").clone()
    }
}

#[async_trait]
impl GraphqlUpstream for FakeUpstream {
    async fn execute(
        &self,
        request: &GraphqlRequest,
        token: &BearerToken,
    ) -> Result<Value, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens
            .lock()
            .expect("tokens lock")
            .push(token.expose().to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.reply)(request, token)
    }
}

/// Analyzer double returning a fixed result.
#[derive(Clone)]
pub struct FakeAnalyzer {
    calls: Arc<AtomicUsize>,
    result: Result<Value, AnalysisError>,
    delay: Duration,
}

impl FakeAnalyzer {
    pub fn returning(document: Value) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            result: Ok(document),
            delay: Duration::ZERO,
        }
    }

    pub fn failing(err: AnalysisError) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            result: Err(err),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionAnalyzer for FakeAnalyzer {
    async fn analyze(&self, _dialogs: &SessionDialogs) -> Result<Value, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }
}

/// In-memory store whose reads or writes can be switched to fail.
#[derive(Clone, Default)]
pub struct FlakyStore {
    pub inner: InMemoryCacheStore,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn read_guard(&self) -> Result<(), RepoError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepoError::Timeout);
        }
        Ok(())
    }

    fn write_guard(&self) -> Result<(), RepoError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("connection reset"));
        }
        Ok(())
    }
}

#[async_trait]
impl ResponseCacheRepo for FlakyStore {
    async fn find_response(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<CacheEntry>, RepoError> {
        self.read_guard()?;
        self.inner.find_response(fingerprint).await
    }

    async fn insert_response(
        &self,
        fingerprint: &Fingerprint,
        response: &Value,
    ) -> Result<InsertOutcome, RepoError> {
        self.write_guard()?;
        self.inner.insert_response(fingerprint, response).await
    }
}

#[async_trait]
impl AnalysisCacheRepo for FlakyStore {
    async fn find_analysis(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<AnalysisEntry>, RepoError> {
        self.read_guard()?;
        self.inner.find_analysis(session_id).await
    }

    async fn insert_analysis(
        &self,
        session_id: &SessionId,
        analysis: &Value,
    ) -> Result<InsertOutcome, RepoError> {
        self.write_guard()?;
        self.inner.insert_analysis(session_id, analysis).await
    }

    async fn delete_analysis(&self, session_id: &SessionId) -> Result<bool, RepoError> {
        self.write_guard()?;
        self.inner.delete_analysis(session_id).await
    }
}

#[async_trait]
impl CacheMaintenanceRepo for FlakyStore {
    async fn purge_responses(&self) -> Result<u64, RepoError> {
        self.write_guard()?;
        self.inner.purge_responses().await
    }

    async fn purge_analyses(&self) -> Result<u64, RepoError> {
        self.write_guard()?;
        self.inner.purge_analyses().await
    }

    async fn ping(&self) -> Result<(), RepoError> {
        self.read_guard()?;
        self.inner.ping().await
    }
}

/// A dialogs payload in the upstream's `data.Result.list` shape.
pub fn dialogs_payload(count: usize) -> Value {
    let list: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "qid": format!("q{i}"),
                "question": format!("question {i}"),
                "answer": format!("answer {i}"),
            })
        })
        .collect();
    json!({ "data": { "Result": { "totalCount": count, "list": list } } })
}

/// Every service wired against one store, as the binary does.
pub struct Harness {
    pub store: FlakyStore,
    pub upstream: FakeUpstream,
    pub analyzer: Option<FakeAnalyzer>,
    pub responses: Arc<ResponseCacheService>,
    pub proxy: Arc<ProxyService>,
    pub maintenance: Arc<MaintenanceService>,
}

impl Harness {
    pub fn new(upstream: FakeUpstream, analyzer: Option<FakeAnalyzer>) -> Self {
        Self::with_scope(upstream, analyzer, ScopeMode::Token)
    }

    pub fn with_scope(
        upstream: FakeUpstream,
        analyzer: Option<FakeAnalyzer>,
        scope: ScopeMode,
    ) -> Self {
        let store = FlakyStore::new();
        let shared = Arc::new(store.clone());
        let responses = Arc::new(ResponseCacheService::new(
            shared.clone(),
            Arc::new(upstream.clone()),
            scope,
        ));
        let analyses = Arc::new(AnalysisCacheService::new(shared.clone()));
        let analyzer_port: Option<Arc<dyn SessionAnalyzer>> = analyzer
            .clone()
            .map(|analyzer| Arc::new(analyzer) as Arc<dyn SessionAnalyzer>);
        let proxy = Arc::new(ProxyService::new(
            Arc::clone(&responses),
            analyses,
            analyzer_port,
        ));
        let maintenance = Arc::new(MaintenanceService::new(shared));

        Self {
            store,
            upstream,
            analyzer,
            responses,
            proxy,
            maintenance,
        }
    }

    pub fn http_state(&self) -> HttpState {
        HttpState {
            proxy: Arc::clone(&self.proxy),
            maintenance: Arc::clone(&self.maintenance),
        }
    }
}
