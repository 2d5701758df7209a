use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use super::{parse_id, parse_uuid, redirect_with_flash, unprocessable};
use crate::{
    AppState,
    auth::AuthContext,
    error::{AppError, AppResult},
    forms::{FormErrors, PromotionForm, RoleForm},
    pagination::PageQuery,
    rbac,
    session::FlashMessage,
    templates,
    views::{AdminDashboardView, ErrorMetricsView, FormView, ListView, UserDetailView},
};

// GET /admin
pub async fn index() -> Redirect {
    Redirect::to("/admin/dashboard")
}

pub async fn dashboard(State(state): State<AppState>, auth: AuthContext) -> AppResult<Response> {
    let view = AdminDashboardView {
        auth,
        stats: state.repo.admin_stats().await?,
        policy_degraded: state.policy.is_degraded().await,
        error_total: state.metrics.total(),
    };
    Ok(templates::admin::dashboard(&view).into_response())
}

// --- Promotions ---

pub async fn list_promotions(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let pagination = query.paginate(state.repo.count_promotions().await?);
    let promotions = state
        .repo
        .list_promotions(pagination.offset(), pagination.per_page)
        .await?;
    let view = ListView::new(auth, "Promotions", promotions, pagination);
    Ok(templates::admin::promotions_list(&view).into_response())
}

pub async fn new_promotion(auth: AuthContext) -> Response {
    let values = PromotionForm {
        promo_type: "discount".to_string(),
        active: Some("on".to_string()),
        ..PromotionForm::default()
    };
    let view = FormView::new(auth, "New promotion", "/admin/promotions", values);
    templates::admin::promotion_form(&view).into_response()
}

pub async fn create_promotion(
    State(state): State<AppState>,
    auth: AuthContext,
    session: Session,
    Form(form): Form<PromotionForm>,
) -> AppResult<Response> {
    match form.validate() {
        Ok(input) => {
            let promo = state.repo.create_promotion(input).await?;
            tracing::info!(id = promo.id, name = %promo.name, "promotion created");
            redirect_with_flash(
                &session,
                FlashMessage::success(format!("Promotion {} was created.", promo.name)),
                "/admin/promotions",
            )
            .await
        }
        Err(errors) => {
            let view = FormView::new(auth, "New promotion", "/admin/promotions", form)
                .with_errors(errors);
            Ok(unprocessable(templates::admin::promotion_form(&view)))
        }
    }
}

pub async fn edit_promotion(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let promo = state
        .repo
        .get_promotion(parse_id(&id)?)
        .await?
        .ok_or(AppError::NotFound)?;
    let view = FormView::new(
        auth,
        format!("Edit {}", promo.name),
        format!("/admin/promotions/{}", promo.id),
        PromotionForm::from_promotion(&promo),
    );
    Ok(templates::admin::promotion_form(&view).into_response())
}

pub async fn update_promotion(
    State(state): State<AppState>,
    auth: AuthContext,
    session: Session,
    Path(id): Path<String>,
    Form(form): Form<PromotionForm>,
) -> AppResult<Response> {
    let id = parse_id(&id)?;
    let existing = state.repo.get_promotion(id).await?.ok_or(AppError::NotFound)?;
    match form.validate() {
        Ok(input) => {
            let promo = state
                .repo
                .update_promotion(id, input)
                .await?
                .ok_or(AppError::NotFound)?;
            redirect_with_flash(
                &session,
                FlashMessage::success(format!("Promotion {} was updated.", promo.name)),
                "/admin/promotions",
            )
            .await
        }
        Err(errors) => {
            let view = FormView::new(
                auth,
                format!("Edit {}", existing.name),
                format!("/admin/promotions/{id}"),
                form,
            )
            .with_errors(errors);
            Ok(unprocessable(templates::admin::promotion_form(&view)))
        }
    }
}

pub async fn delete_promotion(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> AppResult<Response> {
    if !state.repo.delete_promotion(parse_id(&id)?).await? {
        return Err(AppError::NotFound);
    }
    redirect_with_flash(&session, FlashMessage::success("Promotion deleted."), "/admin/promotions")
        .await
}

// --- Users ---

pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let pagination = query.paginate(state.repo.count_users().await?);
    let users = state
        .repo
        .list_users(pagination.offset(), pagination.per_page)
        .await?;
    let view = ListView::new(auth, "Users", users, pagination);
    Ok(templates::admin::users_list(&view).into_response())
}

async fn user_detail_view(
    state: &AppState,
    auth: AuthContext,
    id: &str,
    errors: FormErrors,
) -> AppResult<UserDetailView> {
    let user = state.repo.get_user(parse_uuid(id)?).await?.ok_or(AppError::NotFound)?;
    let roles = state
        .policy
        .get_user_roles(&user.id.to_string())
        .await
        .into_iter()
        .collect();
    Ok(UserDetailView { auth, user, roles, errors })
}

pub async fn show_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let view = user_detail_view(&state, auth, &id, FormErrors::new()).await?;
    Ok(templates::admin::user_detail(&view).into_response())
}

/// assign_role
///
/// Writes the assignment to the policy store and reloads so the change is
/// visible on the next request.
pub async fn assign_role(
    State(state): State<AppState>,
    auth: AuthContext,
    session: Session,
    Path(id): Path<String>,
    Form(form): Form<RoleForm>,
) -> AppResult<Response> {
    let user = state.repo.get_user(parse_uuid(&id)?).await?.ok_or(AppError::NotFound)?;
    let back = format!("/admin/users/{}", user.id);
    if !state.policy.is_editable() {
        return redirect_with_flash(
            &session,
            FlashMessage::error("Role assignments are read-only while the policy comes from a file."),
            &back,
        )
        .await;
    }

    let role = match form.validate() {
        Ok(role) => role,
        Err(errors) => {
            let view = user_detail_view(&state, auth, &id, errors).await?;
            return Ok(unprocessable(templates::admin::user_detail(&view)));
        }
    };
    if !rbac::may_manage_role(&auth.roles, &role) {
        tracing::warn!(user = %user.id, role = %role, by = ?auth.user_id, "superuser grant refused");
        return Err(AppError::Forbidden);
    }

    let added = state.repo.assign_role(&user.id.to_string(), &role).await?;
    state.policy.reload_policy().await?;
    tracing::info!(user = %user.id, role = %role, by = ?auth.user_id, "role assigned");
    let message = if added {
        FlashMessage::success(format!("{} now holds the {role} role.", user.email))
    } else {
        FlashMessage::info(format!("{} already holds the {role} role.", user.email))
    };
    redirect_with_flash(&session, message, &back).await
}

pub async fn remove_role(
    State(state): State<AppState>,
    auth: AuthContext,
    session: Session,
    Path(id): Path<String>,
    Form(form): Form<RoleForm>,
) -> AppResult<Response> {
    let user = state.repo.get_user(parse_uuid(&id)?).await?.ok_or(AppError::NotFound)?;
    let back = format!("/admin/users/{}", user.id);
    if !state.policy.is_editable() {
        return redirect_with_flash(
            &session,
            FlashMessage::error("Role assignments are read-only while the policy comes from a file."),
            &back,
        )
        .await;
    }

    let role = form.role.trim();
    if !rbac::may_manage_role(&auth.roles, role) {
        tracing::warn!(user = %user.id, role = %role, by = ?auth.user_id, "superuser revoke refused");
        return Err(AppError::Forbidden);
    }
    if !state.repo.remove_role(&user.id.to_string(), role).await? {
        return redirect_with_flash(
            &session,
            FlashMessage::error(format!("{} does not hold the {role} role.", user.email)),
            &back,
        )
        .await;
    }
    state.policy.reload_policy().await?;
    tracing::info!(user = %user.id, role = %role, by = ?auth.user_id, "role removed");
    redirect_with_flash(
        &session,
        FlashMessage::success(format!("Removed the {role} role from {}.", user.email)),
        &back,
    )
    .await
}

// --- Error metrics ---

pub async fn error_metrics(State(state): State<AppState>, auth: AuthContext) -> Response {
    let view = ErrorMetricsView {
        auth,
        rows: state.metrics.snapshot(),
        total: state.metrics.total(),
    };
    templates::admin::error_metrics(&view).into_response()
}
