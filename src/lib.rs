use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware::{from_fn, from_fn_with_state},
};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tower_sessions::{
    Expiry, MemoryStore, SessionManagerLayer,
    cookie::{SameSite, time::Duration},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core services.
pub mod auth;
pub mod config;
pub mod error;
pub mod features;
pub mod memory;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod rbac;
pub mod repository;
pub mod session;

// Request handling and rendering.
pub mod forms;
pub mod handlers;
pub mod routes;
pub mod templates;
pub mod views;

use routes::{admin, owner, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use memory::InMemoryRepository;
pub use rbac::{PolicyHandle, PolicySource};
pub use repository::{PostgresRepository, RepositoryState};

/// AppState
///
/// Shared by every request. All fields are cheap clones of shared handles.
#[derive(Clone)]
pub struct AppState {
    /// Storage for accounts, collections, reference data and the policy tables.
    pub repo: RepositoryState,
    /// The live RBAC snapshot.
    pub policy: PolicyHandle,
    pub config: AppConfig,
    /// Error responses counted since startup.
    pub metrics: metrics::ErrorMetrics,
    /// Per-client request limiter.
    pub limiter: Arc<middleware::ClientRateLimiter>,
}

impl AppState {
    pub fn new(repo: RepositoryState, policy: PolicyHandle, config: AppConfig) -> Self {
        let limiter = middleware::build_rate_limiter(config.rate_limit_per_minute);
        Self {
            repo,
            policy,
            config,
            metrics: metrics::ErrorMetrics::new(),
            limiter,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for PolicyHandle {
    fn from_ref(app_state: &AppState) -> PolicyHandle {
        app_state.policy.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the route groups and the request pipeline. From the outside in:
/// CORS, request id and tracing, error accounting, panic recovery, session,
/// CSRF, rate limiting, then the auth context. Route guards run after all of
/// these, inside each group.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_name(session::SESSION_COOKIE)
        .with_secure(state.config.env.is_production())
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(Duration::minutes(
            state.config.session_ttl_minutes,
        )));

    let base_router = Router::new()
        .merge(public::public_routes())
        .merge(owner::owner_routes(state.policy.clone()))
        .nest("/admin", admin::admin_routes(state.policy.clone()))
        .fallback(handlers::public::not_found)
        // Layers below run outermost last.
        .layer(from_fn_with_state(
            state.clone(),
            auth::auth_context_middleware,
        ))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::rate_limit_middleware,
        ))
        .layer(from_fn(middleware::csrf_middleware))
        .layer(session_layer)
        .layer(CatchPanicLayer::custom(middleware::handle_panic))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::error_metrics_middleware,
        ))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for `TraceLayer`: method, uri and the request id, so every log line of
/// one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}

/// bootstrap
///
/// First-start seeding. Installs the default policy when the policy tables are
/// empty and creates the configured administrator account if it is missing.
/// Safe to run on every start.
pub async fn bootstrap(repo: &RepositoryState, config: &AppConfig) -> AppResult<()> {
    if repo.list_policy_rules().await?.is_empty() {
        for rule in rbac::default_policy() {
            repo.add_policy_rule(rule).await?;
        }
        tracing::info!("seeded default policy");
    }

    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(());
    };
    let email = email.trim().to_lowercase();
    let admin = match repo.find_user_by_email(&email).await? {
        Some(user) => user,
        None => {
            let user = repo
                .create_user(models::NewUser {
                    email: email.clone(),
                    name: "Administrator".to_string(),
                    password_hash: auth::hash_password(password)?,
                })
                .await?;
            tracing::info!(email = %email, "created bootstrap administrator");
            user
        }
    };
    repo.assign_role(&admin.id.to_string(), rbac::SUPERUSER_ROLE).await?;
    Ok(())
}
