//! Request-pipeline middleware that is not about identity: CSRF validation,
//! per-client rate limiting, error accounting and panic recovery.

use std::any::Any;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequest, MatchedPath, Request, State},
    http::{HeaderMap, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
    Form,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{AppState, metrics, session, templates};

/// Header accepted in place of the hidden form field (for scripted clients).
pub const CSRF_HEADER: &str = "x-csrf-token";
/// Largest form body the CSRF check will buffer.
const MAX_FORM_BYTES: usize = 64 * 1024;

pub type ClientRateLimiter = DefaultKeyedRateLimiter<String>;

/// Builds the per-client limiter from the configured per-minute quota.
pub fn build_rate_limiter(requests_per_minute: u32) -> Arc<ClientRateLimiter> {
    let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::keyed(quota))
}

// --- CSRF ---

#[derive(Deserialize)]
struct CsrfField {
    csrf_token: Option<String>,
}

fn is_state_changing(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
}

/// csrf_middleware
///
/// State-changing requests must carry the session's token, either in the
/// `x-csrf-token` header or as the `csrf_token` field of a urlencoded form.
/// The form body is buffered for the check and handed on unchanged.
pub async fn csrf_middleware(request: Request, next: Next) -> Response {
    if !is_state_changing(request.method()) {
        return next.run(request).await;
    }

    let Some(session) = request.extensions().get::<Session>().cloned() else {
        return csrf_rejection();
    };
    // No token in the session means no form was ever rendered for it.
    let expected = match session::existing_csrf_token(&session).await {
        Ok(Some(token)) => token,
        Ok(None) => return csrf_rejection(),
        Err(err) => return err.into_response(),
    };

    if let Some(submitted) = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        return if session::tokens_match(&expected, submitted) {
            next.run(request).await
        } else {
            csrf_rejection()
        };
    }

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_FORM_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return templates::error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                "The submitted form is too large.",
            );
        }
    };

    let submitted = form_token(&parts.headers, bytes.clone()).await;
    if !submitted.is_some_and(|token| session::tokens_match(&expected, &token)) {
        tracing::warn!(path = %parts.uri.path(), "csrf token missing or invalid");
        return csrf_rejection();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

async fn form_token(headers: &HeaderMap, bytes: axum::body::Bytes) -> Option<String> {
    let content_type = headers.get(header::CONTENT_TYPE)?.clone();
    let probe = Request::builder()
        .method(Method::POST)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(bytes))
        .ok()?;
    let Form(field) = Form::<CsrfField>::from_request(probe, &()).await.ok()?;
    field.csrf_token
}

fn csrf_rejection() -> Response {
    templates::error_response(
        StatusCode::FORBIDDEN,
        "Your form session has expired. Go back, reload the page and try again.",
    )
}

// --- Rate limiting ---

/// Client key: first `x-forwarded-for` hop, else the socket address.
pub fn client_key(request: &Request) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return forwarded.to_string();
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);
    if state.limiter.check_key(&key).is_err() {
        tracing::warn!(client = %key, path = %request.uri().path(), "rate limit exceeded");
        return templates::error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests. Please slow down and try again in a minute.",
        );
    }
    next.run(request).await
}

// --- Error metrics ---

/// Records every error response against its route template. Requests that
/// matched no route are counted under [`metrics::UNMATCHED_ROUTE`].
pub async fn error_metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let matched = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string());
    let response = next.run(request).await;
    let route = match matched {
        Some(path) if response.extensions().get::<metrics::UnmatchedRoute>().is_none() => path,
        _ => metrics::UNMATCHED_ROUTE.to_string(),
    };
    state.metrics.record(response.status().as_u16(), &route);
    response
}

/// Prunes the limiter and returns how many clients are still tracked.
pub fn prune_rate_limiter(limiter: &ClientRateLimiter) -> usize {
    limiter.retain_recent();
    limiter.shrink_to_fit();
    limiter.len()
}

/// spawn_rate_limiter_pruning
///
/// Drops limiter state for clients idle long enough to look brand new again.
pub fn spawn_rate_limiter_pruning(
    limiter: Arc<ClientRateLimiter>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let tracked = prune_rate_limiter(&limiter);
            tracing::debug!(clients = tracked, "pruned rate limiter state");
        }
    })
}

// --- Panics ---

/// handle_panic
///
/// Response for `CatchPanicLayer`: log the payload, render the generic 500 page.
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    tracing::error!(panic = %detail, "handler panicked");
    templates::error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Something went wrong on our side. Please try again later.",
    )
}
