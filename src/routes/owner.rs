use crate::{
    AppState, auth,
    handlers::owner,
    rbac::{PolicyHandle, RequirePermissionLayer},
};
use axum::{
    Router, middleware,
    routing::{get, post},
};

/// Owner Router Module
///
/// Everything under `/owner`. All routes sit behind `require_login`, and every
/// record lookup is scoped to the caller, so another owner's id answers 404.
///
/// The munitions sub-router is further guarded by the `ammunition` resource;
/// the action follows the HTTP method (GET reads, POST writes).
pub fn owner_routes(policy: PolicyHandle) -> Router<AppState> {
    let munitions = Router::new()
        // GET /owner/munitions?page=&per_page=
        // Paginated ammunition list, newest first.
        .route("/", get(owner::list_ammunition).post(owner::create_ammunition))
        .route("/new", get(owner::new_ammunition))
        .route(
            "/{id}",
            get(owner::show_ammunition).post(owner::update_ammunition),
        )
        .route("/{id}/edit", get(owner::edit_ammunition))
        // POST /owner/munitions/{id}/delete
        // Forms cannot send DELETE, so removal is a POST to a dedicated path.
        .route("/{id}/delete", post(owner::delete_ammunition))
        .route_layer(RequirePermissionLayer::new(policy, "ammunition"));

    Router::new()
        // GET /owner
        // Dashboard with counts, recent guns and the optional ammunition panel.
        .route("/owner", get(owner::dashboard))
        // GET|POST /owner/guns
        // List (paginated) and create. Create enforces the plan's gun limit.
        .route("/owner/guns", get(owner::list_guns).post(owner::create_gun))
        .route("/owner/guns/new", get(owner::new_gun))
        // GET|POST /owner/guns/{id}
        // Detail page and update target.
        .route("/owner/guns/{id}", get(owner::show_gun).post(owner::update_gun))
        .route("/owner/guns/{id}/edit", get(owner::edit_gun))
        .route("/owner/guns/{id}/delete", post(owner::delete_gun))
        .nest("/owner/munitions", munitions)
        // GET|POST /owner/profile
        // Display name changes. Email is fixed after registration.
        .route("/owner/profile", get(owner::profile).post(owner::update_profile))
        // GET /owner/subscription
        // Current plan and its gun limit.
        .route("/owner/subscription", get(owner::subscription))
        // POST /owner/subscription/cancel
        // Back to the free tier, effective immediately.
        .route("/owner/subscription/cancel", post(owner::cancel_subscription))
        .route_layer(middleware::from_fn(auth::require_login))
}
