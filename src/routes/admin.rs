use crate::{
    AppState, auth,
    handlers::{admin, permissions, reference},
    models::ReferenceKind,
    rbac::{self, PolicyHandle, RequirePermissionLayer},
};
use axum::{
    Extension, Router, middleware,
    routing::{get, post},
};

/// Admin Router Module
///
/// Nested under `/admin`. Each area is its own router guarded by one RBAC
/// resource, so granting a role `promotions` access opens exactly the
/// promotion pages. The superuser role passes every guard while the policy
/// is loaded; a degraded policy closes the whole area.
///
/// `require_login` wraps everything, so anonymous callers are redirected to
/// the login page before any permission check runs.
pub fn admin_routes(policy: PolicyHandle) -> Router<AppState> {
    let guard = |resource: &'static str| RequirePermissionLayer::new(policy.clone(), resource);

    let mut router = Router::new()
        // GET /admin
        // Bare prefix goes to the dashboard.
        .route("/", get(admin::index))
        // GET /admin/dashboard
        // Site-wide counters, policy health and the error total.
        .route(
            "/dashboard",
            get(admin::dashboard).route_layer(guard(rbac::DASHBOARD_RESOURCE)),
        );

    // GET|POST /admin/{manufacturers,calibers,weapon-types,casings}[/...]
    // One generic CRUD router per lookup table. The kind travels as an extension.
    for kind in ReferenceKind::ALL {
        let tables = Router::new()
            .route("/", get(reference::list).post(reference::create))
            .route("/new", get(reference::new))
            .route("/{id}", post(reference::update))
            .route("/{id}/edit", get(reference::edit))
            .route("/{id}/delete", post(reference::delete))
            .route_layer(guard(kind.resource()))
            .layer(Extension(kind));
        router = router.nest(&format!("/{}", kind.slug()), tables);
    }

    let promotions = Router::new()
        .route("/", get(admin::list_promotions).post(admin::create_promotion))
        .route("/new", get(admin::new_promotion))
        .route("/{id}", post(admin::update_promotion))
        .route("/{id}/edit", get(admin::edit_promotion))
        .route("/{id}/delete", post(admin::delete_promotion))
        .route_layer(guard("promotions"));

    let users = Router::new()
        .route("/", get(admin::list_users))
        .route("/{id}", get(admin::show_user))
        // POST /admin/users/{id}/roles
        // Grants a role and reloads the policy.
        .route("/{id}/roles", post(admin::assign_role))
        .route("/{id}/roles/remove", post(admin::remove_role))
        .route_layer(guard("users"));

    let permissions = Router::new()
        .route("/", get(permissions::index))
        .route("/policies", post(permissions::add_policy))
        .route("/policies/delete", post(permissions::delete_policy))
        // POST /admin/permissions/reload
        // Rebuilds the snapshot from its source. The previous one stays on failure.
        .route("/reload", post(permissions::reload))
        .route_layer(guard("permissions"));

    // Feature flags live under the permissions prefix but have their own resource.
    let feature_flags = Router::new()
        .route("/", get(permissions::list_flags).post(permissions::create_flag))
        .route("/new", get(permissions::new_flag))
        .route("/{id}", post(permissions::update_flag))
        .route("/{id}/edit", get(permissions::edit_flag))
        .route("/{id}/toggle", post(permissions::toggle_flag))
        .route("/{id}/delete", post(permissions::delete_flag))
        .route_layer(guard("feature_flags"));

    router
        .nest("/promotions", promotions)
        .nest("/users", users)
        .nest("/permissions/feature-flags", feature_flags)
        .nest("/permissions", permissions)
        // GET /admin/error-metrics
        // Error responses counted per status and route since startup.
        .route(
            "/error-metrics",
            get(admin::error_metrics).route_layer(guard("error_metrics")),
        )
        .route_layer(middleware::from_fn(auth::require_login))
}
