use crate::{AppState, handlers::public};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Landing, authentication, pricing and contact pages. No guard is attached;
/// handlers that behave differently for signed-in users read the
/// `AuthContext` themselves.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // Landing page.
        .route("/", get(public::home))
        // GET /health
        // Liveness probe for load balancers. Returns "ok" without touching storage.
        .route("/health", get(|| async { "ok" }))
        // GET|POST /login
        // Credential form. A successful login rotates the session id and honours `next`.
        .route("/login", get(public::login_page).post(public::login))
        // GET|POST /register
        // Account creation. New accounts receive the configured default role.
        .route("/register", get(public::register_page).post(public::register))
        // POST /logout
        // Clears the session. POST only, so it is covered by the CSRF check.
        .route("/logout", post(public::logout))
        // GET /pricing
        // Plan catalogue plus current promotions when the banner flag allows it.
        .route("/pricing", get(public::pricing))
        // GET|POST /contact
        // Contact form; messages are stored for the admin dashboard count.
        .route("/contact", get(public::contact_page).post(public::contact))
}
