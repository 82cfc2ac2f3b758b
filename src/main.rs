use std::{process, sync::Arc, time::Duration};

use tokio::{sync::watch, try_join};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use uuid::Uuid;

use touchline::{
    application::{
        articles::{ArticleCommands, ArticleService},
        error::AppError,
    },
    cache::{
        CacheBackend, CacheClient, CacheConfig, CacheStore, InvalidationMode, MemoryCacheStore,
        RedisCacheStore,
    },
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AdminState, HttpState},
        telemetry,
    },
};

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
        config::Command::Warm(_) => run_warm(settings).await,
        config::Command::Invalidate(args) => run_invalidate(settings, args.id).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let cache_config = CacheConfig::from(&settings.cache);
    let repositories = Arc::new(PostgresRepositories::new(connect_database(&settings).await?));

    PostgresRepositories::run_migrations(repositories.pool())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let store = build_store(&cache_config).await?;
    let purge_handle = spawn_memory_purge(&store, &cache_config);
    let articles = Arc::new(ArticleService::new(
        repositories.clone(),
        CacheClient::new(store.as_store(), cache_config.ttls),
        &cache_config,
    ));
    let commands = Arc::new(ArticleCommands::new(repositories.clone(), articles.clone()));

    if cache_config.warm_on_startup {
        articles.warm_cache().await;
    }

    let http_state = HttpState {
        articles: articles.clone(),
        health: repositories.clone(),
    };
    let admin_state = AdminState {
        commands,
        articles,
        health: repositories,
    };

    let result = serve_http(&settings, http_state, admin_state).await;

    if let Some(handle) = purge_handle {
        handle.abort();
        let _ = handle.await;
    }

    result
}

async fn run_warm(settings: config::Settings) -> Result<(), AppError> {
    settings.cache.require_shared_backend("warm")?;
    let cache_config = CacheConfig::from(&settings.cache);
    let repositories = Arc::new(PostgresRepositories::new(connect_database(&settings).await?));
    let store = build_store(&cache_config).await?;
    let articles = ArticleService::new(
        repositories,
        CacheClient::new(store.as_store(), cache_config.ttls),
        &cache_config,
    );

    let summary = articles.warm_cache().await;
    if summary.failures > 0 {
        warn!(
            target = "touchline::cli",
            failures = summary.failures,
            "cache warm finished with failures"
        );
    }
    Ok(())
}

async fn run_invalidate(settings: config::Settings, id: Option<Uuid>) -> Result<(), AppError> {
    settings.cache.require_shared_backend("invalidate")?;

    // A fresh process has an empty key index, so listings are always located by scanning.
    let mut cache_config = CacheConfig::from(&settings.cache);
    cache_config.invalidation = InvalidationMode::PrefixScan;

    let url = database_url(&settings)?;
    let pool =
        PostgresRepositories::connect_lazy(url, settings.database.max_connections.get())
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    let store = build_store(&cache_config).await?;
    let articles = ArticleService::new(
        Arc::new(PostgresRepositories::new(pool)),
        CacheClient::new(store.as_store(), cache_config.ttls),
        &cache_config,
    );

    articles.invalidate(id).await;
    info!(target = "touchline::cli", id = ?id, "cache invalidated");
    Ok(())
}

fn database_url(settings: &config::Settings) -> Result<&str, AppError> {
    settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)
}

async fn connect_database(settings: &config::Settings) -> Result<sqlx::PgPool, AppError> {
    let url = database_url(settings)?;
    PostgresRepositories::connect(url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))
}

/// Store selected by configuration; the memory variant stays typed so it can be purged.
enum ConfiguredStore {
    Memory(Arc<MemoryCacheStore>),
    Redis(Arc<RedisCacheStore>),
}

impl ConfiguredStore {
    fn as_store(&self) -> Arc<dyn CacheStore> {
        match self {
            ConfiguredStore::Memory(store) => Arc::clone(store) as Arc<dyn CacheStore>,
            ConfiguredStore::Redis(store) => Arc::clone(store) as Arc<dyn CacheStore>,
        }
    }
}

async fn build_store(cache: &CacheConfig) -> Result<ConfiguredStore, AppError> {
    match cache.backend {
        CacheBackend::Memory => {
            if cache.redis_url.is_some() {
                warn!(
                    target = "touchline::cache",
                    "redis_url is set but the memory backend is selected"
                );
            }
            Ok(ConfiguredStore::Memory(Arc::new(MemoryCacheStore::new())))
        }
        CacheBackend::Redis => {
            let url = cache
                .redis_url
                .as_deref()
                .ok_or_else(|| InfraError::configuration("cache.redis_url is not configured"))?;
            let store = RedisCacheStore::connect(url)
                .await
                .map_err(|err| AppError::from(InfraError::cache(err.to_string())))?;
            Ok(ConfiguredStore::Redis(Arc::new(store)))
        }
    }
}

fn spawn_memory_purge(
    store: &ConfiguredStore,
    cache: &CacheConfig,
) -> Option<tokio::task::JoinHandle<()>> {
    let ConfiguredStore::Memory(store) = store else {
        return None;
    };
    let store = store.clone();
    let period = cache.ttls.standard.max(Duration::from_secs(1));

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            interval.tick().await;
            let purged = store.purge_expired();
            if purged > 0 {
                info!(target = "touchline::cache", purged, "purged expired cache entries");
            }
        }
    }))
}

async fn serve_http(
    settings: &config::Settings,
    http_state: HttpState,
    admin_state: AdminState,
) -> Result<(), AppError> {
    let public_router = http::build_router(http_state);
    let admin_router = http::build_admin_router(admin_state);

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        public_addr = %settings.server.public_addr,
        admin_addr = %settings.server.admin_addr,
        "listening"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for shutdown signal");
            return;
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(shutdown_requested(shutdown_rx.clone()));
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(shutdown_requested(shutdown_rx.clone()));

    let grace = settings.server.graceful_shutdown;
    let deadline = async move {
        shutdown_requested(shutdown_rx).await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = async { try_join!(public_server, admin_server) } => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        () = deadline => {
            warn!(
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    Ok(())
}

async fn shutdown_requested(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}
