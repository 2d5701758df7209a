use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use virtual_armory::{
    AppError, AppState, InMemoryRepository, PolicyHandle, PolicySource, PostgresRepository,
    RepositoryState,
    config::{AppConfig, Env},
    create_router, middleware,
};

/// How often idle clients are dropped from the rate limiter.
const LIMITER_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// main
///
/// Loads configuration, sets up logging, storage and the policy, then serves.
/// Any startup failure is logged and ends the process with a non-zero code.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail fast on invalid settings)
    dotenv::dotenv().ok();
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("FATAL: {err}");
            std::process::exit(1);
        }
    };

    // 2. Logging: pretty locally, JSON in production.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "virtual_armory=debug,tower_http=info".into());
    match config.env {
        Env::Local => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init(),
        Env::Production => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    if let Err(err) = run(config).await {
        tracing::error!(error = %err, "FATAL: startup failed");
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    // 3. Storage: Postgres when configured, otherwise in memory (local only).
    let repo: RepositoryState = match &config.db_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
            let repo = PostgresRepository::new(pool);
            repo.migrate().await?;
            tracing::info!("connected to Postgres and applied migrations");
            Arc::new(repo)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory repository");
            Arc::new(InMemoryRepository::new())
        }
    };

    // 4. Seed data, then the policy.
    virtual_armory::bootstrap(&repo, &config).await?;
    let source = match &config.policy_file {
        Some(path) => PolicySource::File(path.clone()),
        None => PolicySource::Repository,
    };
    let policy = PolicyHandle::load(source, repo.clone()).await;

    // 5. Router and server
    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(repo, policy, config);
    middleware::spawn_rate_limiter_pruning(state.limiter.clone(), LIMITER_PRUNE_INTERVAL);
    let app = create_router(state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| AppError::Config(format!("cannot bind {bind_addr}: {e}")))?;
    tracing::info!("Listening on {bind_addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| AppError::Internal(format!("server error: {e}")))
}
