use std::{process, sync::Arc};

use sessionlens::{
    application::{
        analysis_cache::AnalysisCacheService,
        analyzer::SessionAnalyzer,
        error::AppError,
        maintenance::{MaintenanceService, PurgeTargets},
        proxy::ProxyService,
        repos::CacheStore,
        response_cache::ResponseCacheService,
    },
    config::{self, StorageBackend},
    infra::{
        anthropic::AnthropicAnalyzer,
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        memory::InMemoryCacheStore,
        telemetry,
        upstream::ReqwestGraphqlClient,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Purge(args) => run_purge(settings, args).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    match settings.storage.backend {
        StorageBackend::Postgres => {
            let store = Arc::new(init_postgres(&settings).await?);
            serve_http(&settings, store).await
        }
        StorageBackend::Memory => {
            warn!(
                target = "sessionlens::serve",
                "using in-memory cache storage; cached documents are lost on exit"
            );
            serve_http(&settings, Arc::new(InMemoryCacheStore::new())).await
        }
    }
}

async fn serve_http<S>(settings: &config::Settings, store: Arc<S>) -> Result<(), AppError>
where
    S: CacheStore + 'static,
{
    let upstream = ReqwestGraphqlClient::new(
        settings.upstream.endpoint.clone(),
        settings.upstream.timeout,
    )?;
    let analyzer: Option<Arc<dyn SessionAnalyzer>> =
        match AnthropicAnalyzer::from_settings(&settings.analysis)? {
            Some(analyzer) => Some(Arc::new(analyzer)),
            None => {
                warn!(
                    target = "sessionlens::serve",
                    "analysis.api_key is not set; /analyze serves cached analyses only"
                );
                None
            }
        };

    let responses = Arc::new(ResponseCacheService::new(
        store.clone(),
        Arc::new(upstream),
        settings.cache.scope,
    ));
    let analyses = Arc::new(AnalysisCacheService::new(store.clone()));
    let state = HttpState {
        proxy: Arc::new(ProxyService::new(responses, analyses, analyzer)),
        maintenance: Arc::new(MaintenanceService::new(store)),
    };

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "sessionlens::serve",
        addr = %settings.server.addr,
        upstream = %settings.upstream.endpoint,
        backend = settings.storage.backend.as_str(),
        scope = settings.cache.scope.as_str(),
        "Listening"
    );

    axum::serve(listener, http::build_router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!(target = "sessionlens::serve", "Shut down");
    Ok(())
}

async fn run_purge(settings: config::Settings, args: config::PurgeArgs) -> Result<(), AppError> {
    let repositories = init_postgres(&settings).await?;
    let maintenance = MaintenanceService::new(Arc::new(repositories));

    let summary = maintenance
        .purge(PurgeTargets::from_flags(args.responses, args.analyses))
        .await?;

    info!(
        target = "sessionlens::purge",
        responses = summary.responses,
        analyses = summary.analyses,
        "Purge completed"
    );
    Ok(())
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    init_postgres(&settings).await?;
    info!(target = "sessionlens::migrate", "Migrations applied");
    Ok(())
}

async fn init_postgres(settings: &config::Settings) -> Result<PostgresRepositories, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(PostgresRepositories::new(pool))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
    }
}
