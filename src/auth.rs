use std::collections::BTreeSet;
use std::convert::Infallible;
use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{Method, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, AppResult},
    rbac,
    session::{self, FlashMessage},
};

/// AuthContext
///
/// The per-request view of "who is calling". Built by `auth_context_middleware`
/// from the session and the policy, then read by guards, handlers and the
/// layout template. Anonymous requests get `authenticated = false` and an
/// empty role set.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    pub authenticated: bool,
    pub user_id: Option<Uuid>,
    pub email: String,
    pub name: String,
    pub roles: BTreeSet<String>,
    /// Derived from `rbac::is_superuser`; never set independently.
    pub is_admin: bool,
    /// The policy lets this caller open the admin dashboard.
    pub admin_access: bool,
    pub csrf_token: String,
    pub current_path: String,
    /// Flash messages drained from the session for this render.
    pub flashes: Vec<FlashMessage>,
}

impl AuthContext {
    pub fn anonymous(current_path: &str) -> Self {
        Self { current_path: current_path.to_string(), ..Self::default() }
    }

    /// The user id, or `Unauthorized` for anonymous callers.
    pub fn require_user(&self) -> AppResult<Uuid> {
        match self.user_id {
            Some(id) if self.authenticated => Ok(id),
            _ => Err(AppError::Unauthorized),
        }
    }
}

/// AuthContext Extractor Implementation
///
/// Reads the context the middleware stored in the request extensions. When the
/// middleware is absent (e.g. a handler under test in isolation) the request is
/// treated as anonymous rather than rejected.
///
/// Handlers that take an `AuthContext` render pages with forms, so this is
/// where a missing CSRF token is minted. Requests that never reach such a
/// handler (health checks, unknown paths) leave the session untouched.
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let mut context = parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .unwrap_or_else(|| AuthContext::anonymous(parts.uri.path()));

        if context.csrf_token.is_empty() {
            if let Some(session) = parts.extensions.get::<Session>().cloned() {
                match session::csrf_token(&session).await {
                    Ok(token) => {
                        context.csrf_token = token;
                        parts.extensions.insert(context.clone());
                    }
                    Err(err) => tracing::warn!(error = %err, "could not create csrf token"),
                }
            }
        }
        Ok(context)
    }
}

/// auth_context_middleware
///
/// Runs on every request. Never rejects: a missing session, an unknown user or
/// a failing repository all produce an anonymous context, and route guards
/// decide what that means.
pub async fn auth_context_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let current_path = request.uri().path().to_string();
    let mut context = AuthContext::anonymous(&current_path);

    // A request without a session cookie has nothing to read.
    if let Some(session) = request
        .extensions()
        .get::<Session>()
        .filter(|session| session.id().is_some())
        .cloned()
    {
        match session::existing_csrf_token(&session).await {
            Ok(token) => context.csrf_token = token.unwrap_or_default(),
            Err(err) => tracing::warn!(error = %err, "could not read csrf token"),
        }

        if let Some(user_id) = session::session_user_id(&session).await {
            match state.repo.get_user(user_id).await {
                Ok(Some(user)) => {
                    let identity = user.id.to_string();
                    let roles = state.policy.get_user_roles(&identity).await;
                    context.admin_access = state
                        .policy
                        .is_authorized(&identity, &roles, rbac::DASHBOARD_RESOURCE, rbac::ACTION_READ)
                        .await;
                    context.authenticated = true;
                    context.user_id = Some(user.id);
                    context.email = user.email;
                    context.name = user.name;
                    context.is_admin = rbac::is_superuser(&roles);
                    context.roles = roles;
                }
                Ok(None) => {
                    tracing::debug!(user = %user_id, "session refers to a deleted user");
                }
                Err(err) => {
                    tracing::error!(error = %err, "user lookup failed; treating request as anonymous");
                }
            }
        }

        // Only page loads consume flashes; a POST that redirects must leave
        // them for the page it redirects to.
        if request.method() == Method::GET {
            match session::take_flashes(&session).await {
                Ok(flashes) => context.flashes = flashes,
                Err(err) => tracing::warn!(error = %err, "could not read flash messages"),
            }
        }
    }

    request.extensions_mut().insert(context);
    next.run(request).await
}

/// require_login
///
/// Route guard for pages that need an account. Anonymous callers are sent to
/// the login page with the original path in `next`.
pub async fn require_login(request: Request, next: Next) -> Response {
    let authenticated = request
        .extensions()
        .get::<AuthContext>()
        .is_some_and(|auth| auth.authenticated);
    if authenticated {
        return next.run(request).await;
    }
    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    Redirect::to(&format!("/login?next={}", urlencoding::encode(&target))).into_response()
}

/// hash_password
///
/// Argon2id with a random salt, returned as a PHC string.
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::PasswordHash(e.to_string()))
}

/// verify_password
///
/// `Ok(false)` on a mismatch; `Err` only when the stored hash is unreadable.
pub fn verify_password(password: &str, stored_hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| AppError::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Checked when the email is unknown, so both login paths cost one Argon2 run.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("no account has this password").ok());

/// verify_login
///
/// Password check for a login attempt. `stored_hash` is `None` when no account
/// matches the email; the password is then verified against a dummy hash and
/// the result discarded.
pub fn verify_login(password: &str, stored_hash: Option<&str>) -> AppResult<bool> {
    match stored_hash {
        Some(hash) => verify_password(password, hash),
        None => {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                let _ = verify_password(password, dummy);
            }
            Ok(false)
        }
    }
}

/// Only same-site absolute paths are accepted as post-login targets.
pub fn safe_redirect_target(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path,
        _ => "/owner",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn unknown_accounts_still_pay_for_a_verification() {
        assert!(!verify_login("correct horse", None).unwrap());
        assert!(DUMMY_HASH.as_deref().is_some_and(|hash| hash.starts_with("$argon2id$")));

        let hash = hash_password("correct horse").unwrap();
        assert!(verify_login("correct horse", Some(&hash)).unwrap());
    }

    #[test]
    fn unreadable_hash_is_an_error() {
        assert!(verify_password("x", "not-a-phc-string").is_err());
    }

    #[test]
    fn anonymous_context_has_no_identity() {
        let ctx = AuthContext::anonymous("/pricing");
        assert!(!ctx.authenticated);
        assert!(!ctx.is_admin);
        assert!(!ctx.admin_access);
        assert!(ctx.roles.is_empty());
        assert!(matches!(ctx.require_user(), Err(AppError::Unauthorized)));
    }

    #[test]
    fn redirect_targets_must_be_local() {
        assert_eq!(safe_redirect_target(Some("/owner/guns")), "/owner/guns");
        assert_eq!(safe_redirect_target(Some("//evil.example")), "/owner");
        assert_eq!(safe_redirect_target(Some("https://evil.example")), "/owner");
        assert_eq!(safe_redirect_target(None), "/owner");
    }
}
