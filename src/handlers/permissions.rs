//! Policy administration and feature flags.
//!
//! Rule edits only apply to a repository-backed policy. Every successful
//! edit is followed by a reload so the running snapshot matches the store.

use std::collections::HashMap;

use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use uuid::Uuid;

use super::{parse_id, redirect_with_flash, unprocessable};
use crate::{
    AppState,
    auth::AuthContext,
    error::{AppError, AppResult},
    forms::{FeatureFlagForm, FormErrors, PolicyForm},
    session::FlashMessage,
    templates,
    views::{FeatureFlagsView, FormView, PermissionsView},
};

const PERMISSIONS_PATH: &str = "/admin/permissions";
const FLAGS_PATH: &str = "/admin/permissions/feature-flags";

async fn permissions_view(
    state: &AppState,
    auth: AuthContext,
    errors: FormErrors,
) -> AppResult<PermissionsView> {
    let rules = state.policy.policies().await;
    let assignments = state.policy.role_assignments().await;

    let mut emails = HashMap::new();
    for assignment in &assignments {
        let Ok(id) = Uuid::parse_str(&assignment.user_id) else {
            continue;
        };
        if emails.contains_key(&assignment.user_id) {
            continue;
        }
        if let Some(user) = state.repo.get_user(id).await? {
            emails.insert(assignment.user_id.clone(), user.email);
        }
    }

    Ok(PermissionsView {
        auth,
        rules,
        assignments,
        emails,
        editable: state.policy.is_editable(),
        degraded: state.policy.is_degraded().await,
        errors,
    })
}

// GET /admin/permissions
pub async fn index(State(state): State<AppState>, auth: AuthContext) -> AppResult<Response> {
    let view = permissions_view(&state, auth, FormErrors::new()).await?;
    Ok(templates::admin::permissions(&view).into_response())
}

async fn read_only(session: &Session) -> AppResult<Response> {
    redirect_with_flash(
        session,
        FlashMessage::error("The policy is loaded from a file and cannot be edited here."),
        PERMISSIONS_PATH,
    )
    .await
}

pub async fn add_policy(
    State(state): State<AppState>,
    auth: AuthContext,
    session: Session,
    Form(form): Form<PolicyForm>,
) -> AppResult<Response> {
    if !state.policy.is_editable() {
        return read_only(&session).await;
    }
    let rule = match form.validate() {
        Ok(rule) => rule,
        Err(errors) => {
            let view = permissions_view(&state, auth, errors).await?;
            return Ok(unprocessable(templates::admin::permissions(&view)));
        }
    };

    let added = state.repo.add_policy_rule(rule.clone()).await?;
    state.policy.reload_policy().await?;
    tracing::info!(role = %rule.role, resource = %rule.resource, action = %rule.action, "policy rule added");
    let message = if added {
        FlashMessage::success(format!(
            "{} may now {} {}.",
            rule.role, rule.action, rule.resource
        ))
    } else {
        FlashMessage::info("That rule already exists.")
    };
    redirect_with_flash(&session, message, PERMISSIONS_PATH).await
}

pub async fn delete_policy(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<PolicyForm>,
) -> AppResult<Response> {
    if !state.policy.is_editable() {
        return read_only(&session).await;
    }
    let Ok(rule) = form.validate() else {
        return Err(AppError::NotFound);
    };
    if !state.repo.remove_policy_rule(&rule).await? {
        return Err(AppError::NotFound);
    }
    state.policy.reload_policy().await?;
    tracing::info!(role = %rule.role, resource = %rule.resource, action = %rule.action, "policy rule removed");
    redirect_with_flash(&session, FlashMessage::success("Rule removed."), PERMISSIONS_PATH).await
}

/// reload
///
/// A failed reload keeps the previous snapshot and reports the error as a
/// flash instead of an error page.
pub async fn reload(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    let message = match state.policy.reload_policy().await {
        Ok(()) => FlashMessage::success("Policy reloaded."),
        Err(err) => {
            tracing::error!(error = %err, "manual policy reload failed");
            FlashMessage::error("The policy could not be reloaded. The previous rules are still in effect.")
        }
    };
    redirect_with_flash(&session, message, PERMISSIONS_PATH).await
}

// --- Feature flags ---

// GET /admin/permissions/feature-flags
pub async fn list_flags(State(state): State<AppState>, auth: AuthContext) -> AppResult<Response> {
    let flags = state.repo.list_feature_flags().await?;
    Ok(templates::admin::feature_flags(&FeatureFlagsView { auth, flags }).into_response())
}

pub async fn new_flag(auth: AuthContext) -> Response {
    let view = FormView::new(auth, "New feature flag", FLAGS_PATH, FeatureFlagForm::default());
    templates::admin::feature_flag_form(&view, false).into_response()
}

/// create_flag
///
/// New flags are always stored disabled, whatever the form carried.
pub async fn create_flag(
    State(state): State<AppState>,
    auth: AuthContext,
    session: Session,
    Form(form): Form<FeatureFlagForm>,
) -> AppResult<Response> {
    let errors = match form.validate() {
        Ok(mut input) => {
            input.enabled = false;
            match state.repo.create_feature_flag(input).await {
                Ok(flag) => {
                    tracing::info!(flag = %flag.name, roles = ?flag.roles, "feature flag created");
                    return redirect_with_flash(
                        &session,
                        FlashMessage::success(format!("Flag {} was created disabled.", flag.name)),
                        FLAGS_PATH,
                    )
                    .await;
                }
                Err(AppError::Conflict(message)) => {
                    let mut errors = FormErrors::new();
                    errors.add("name", message);
                    errors
                }
                Err(err) => return Err(err),
            }
        }
        Err(errors) => errors,
    };
    let view = FormView::new(auth, "New feature flag", FLAGS_PATH, form).with_errors(errors);
    Ok(unprocessable(templates::admin::feature_flag_form(&view, false)))
}

pub async fn edit_flag(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let flag = state
        .repo
        .get_feature_flag(parse_id(&id)?)
        .await?
        .ok_or(AppError::NotFound)?;
    let view = FormView::new(
        auth,
        format!("Edit {}", flag.name),
        format!("{FLAGS_PATH}/{}", flag.id),
        FeatureFlagForm::from_flag(&flag),
    );
    Ok(templates::admin::feature_flag_form(&view, true).into_response())
}

pub async fn update_flag(
    State(state): State<AppState>,
    auth: AuthContext,
    session: Session,
    Path(id): Path<String>,
    Form(form): Form<FeatureFlagForm>,
) -> AppResult<Response> {
    let id = parse_id(&id)?;
    let existing = state.repo.get_feature_flag(id).await?.ok_or(AppError::NotFound)?;
    let errors = match form.validate() {
        Ok(input) => match state.repo.update_feature_flag(id, input).await {
            Ok(Some(flag)) => {
                tracing::info!(flag = %flag.name, enabled = flag.enabled, "feature flag updated");
                return redirect_with_flash(
                    &session,
                    FlashMessage::success(format!("Flag {} was updated.", flag.name)),
                    FLAGS_PATH,
                )
                .await;
            }
            Ok(None) => return Err(AppError::NotFound),
            Err(AppError::Conflict(message)) => {
                let mut errors = FormErrors::new();
                errors.add("name", message);
                errors
            }
            Err(err) => return Err(err),
        },
        Err(errors) => errors,
    };
    let view = FormView::new(
        auth,
        format!("Edit {}", existing.name),
        format!("{FLAGS_PATH}/{id}"),
        form,
    )
    .with_errors(errors);
    Ok(unprocessable(templates::admin::feature_flag_form(&view, true)))
}

pub async fn toggle_flag(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = parse_id(&id)?;
    let flag = state.repo.get_feature_flag(id).await?.ok_or(AppError::NotFound)?;
    let flag = state
        .repo
        .set_feature_flag_enabled(id, !flag.enabled)
        .await?
        .ok_or(AppError::NotFound)?;
    tracing::info!(flag = %flag.name, enabled = flag.enabled, "feature flag toggled");
    let state_word = if flag.enabled { "enabled" } else { "disabled" };
    redirect_with_flash(
        &session,
        FlashMessage::success(format!("Flag {} is now {state_word}.", flag.name)),
        FLAGS_PATH,
    )
    .await
}

pub async fn delete_flag(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> AppResult<Response> {
    if !state.repo.delete_feature_flag(parse_id(&id)?).await? {
        return Err(AppError::NotFound);
    }
    redirect_with_flash(&session, FlashMessage::success("Flag deleted."), FLAGS_PATH).await
}
