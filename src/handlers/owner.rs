use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use super::{check_references, parse_uuid, redirect_with_flash, reference_options, unprocessable};
use crate::{
    AppState,
    auth::AuthContext,
    error::{AppError, AppResult},
    features::{self, FeatureGate},
    forms::{AmmunitionForm, FormErrors, GunForm, ProfileForm},
    models::{ReferenceKind, plan_for},
    pagination::PageQuery,
    rbac::ACTION_READ,
    session::FlashMessage,
    templates,
    views::{
        AmmunitionDetailView, DashboardView, FormView, GunDetailView, ListView, ProfileView,
        SubscriptionView,
    },
};

const RECENT_LIMIT: i64 = 5;

/// dashboard
///
/// Collection counts and recent guns. The ammunition panel needs both the
/// `ammo_dashboard` flag and read access to ammunition.
pub async fn dashboard(State(state): State<AppState>, auth: AuthContext) -> AppResult<Response> {
    let owner = auth.require_user()?;
    let user = state.repo.get_user(owner).await?.ok_or(AppError::Unauthorized)?;

    let gun_count = state.repo.count_guns(owner).await?;
    let ammunition_count = state.repo.count_ammunition(owner).await?;
    let recent_guns = state.repo.list_guns(owner, 0, RECENT_LIMIT).await?;

    let gate = FeatureGate::load(&state.repo).await?;
    let show_ammo = gate.can_access_feature(&auth.roles, features::AMMO_DASHBOARD)
        && state
            .policy
            .is_authorized(&owner.to_string(), &auth.roles, "ammunition", ACTION_READ)
            .await;
    let ammunition_panel = if show_ammo {
        Some(state.repo.list_ammunition(owner, 0, RECENT_LIMIT).await?)
    } else {
        None
    };

    let view = DashboardView {
        auth,
        gun_count,
        ammunition_count,
        recent_guns,
        ammunition_panel,
        plan: plan_for(&user.subscription_tier),
    };
    Ok(templates::owner::dashboard(&view).into_response())
}

// --- Guns ---

// GET /owner/guns
pub async fn list_guns(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let owner = auth.require_user()?;
    let pagination = query.paginate(state.repo.count_guns(owner).await?);
    let guns = state
        .repo
        .list_guns(owner, pagination.offset(), pagination.per_page)
        .await?;
    let options = reference_options(&state.repo).await?;
    let view = ListView::new(auth, "Your guns", guns, pagination);
    Ok(templates::owner::guns_list(&view, &options).into_response())
}

pub async fn new_gun(State(state): State<AppState>, auth: AuthContext) -> AppResult<Response> {
    let options = reference_options(&state.repo).await?;
    let view = FormView::new(auth, "Add gun", "/owner/guns", GunForm::default());
    Ok(templates::owner::gun_form(&view, &options).into_response())
}

/// create_gun
///
/// Also enforces the gun limit of the caller's plan.
pub async fn create_gun(
    State(state): State<AppState>,
    auth: AuthContext,
    session: Session,
    Form(form): Form<GunForm>,
) -> AppResult<Response> {
    let owner = auth.require_user()?;
    let mut errors = FormErrors::new();
    let input = match form.validate() {
        Ok(input) => Some(input),
        Err(found) => {
            errors.merge(found);
            None
        }
    };
    if let Some(input) = &input {
        errors.merge(gun_reference_errors(&state, input).await?);
    }

    let user = state.repo.get_user(owner).await?.ok_or(AppError::Unauthorized)?;
    if let Some(limit) = plan_for(&user.subscription_tier).gun_limit {
        if state.repo.count_guns(owner).await? >= i64::from(limit) {
            errors.add(
                "name",
                format!("Your plan allows up to {limit} guns. Upgrade to add more."),
            );
        }
    }

    match input {
        Some(input) if errors.is_empty() => {
            let gun = state.repo.create_gun(owner, input).await?;
            tracing::info!(owner = %owner, gun = %gun.id, "gun added");
            redirect_with_flash(
                &session,
                FlashMessage::success(format!("{} was added.", gun.name)),
                &format!("/owner/guns/{}", gun.id),
            )
            .await
        }
        _ => {
            let options = reference_options(&state.repo).await?;
            let view = FormView::new(auth, "Add gun", "/owner/guns", form).with_errors(errors);
            Ok(unprocessable(templates::owner::gun_form(&view, &options)))
        }
    }
}

async fn gun_reference_errors(
    state: &AppState,
    input: &crate::models::GunInput,
) -> AppResult<FormErrors> {
    check_references(
        &state.repo,
        &[
            ("manufacturer_id", ReferenceKind::Manufacturer, input.manufacturer_id),
            ("caliber_id", ReferenceKind::Caliber, input.caliber_id),
            ("weapon_type_id", ReferenceKind::WeaponType, input.weapon_type_id),
        ],
    )
    .await
}

pub async fn show_gun(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let owner = auth.require_user()?;
    let gun = state
        .repo
        .get_gun(owner, parse_uuid(&id)?)
        .await?
        .ok_or(AppError::NotFound)?;
    let options = reference_options(&state.repo).await?;
    Ok(templates::owner::gun_detail(&GunDetailView { auth, gun, options }).into_response())
}

pub async fn edit_gun(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let owner = auth.require_user()?;
    let gun = state
        .repo
        .get_gun(owner, parse_uuid(&id)?)
        .await?
        .ok_or(AppError::NotFound)?;
    let options = reference_options(&state.repo).await?;
    let action = format!("/owner/guns/{}", gun.id);
    let view = FormView::new(auth, format!("Edit {}", gun.name), action, GunForm::from_gun(&gun));
    Ok(templates::owner::gun_form(&view, &options).into_response())
}

pub async fn update_gun(
    State(state): State<AppState>,
    auth: AuthContext,
    session: Session,
    Path(id): Path<String>,
    Form(form): Form<GunForm>,
) -> AppResult<Response> {
    let owner = auth.require_user()?;
    let id = parse_uuid(&id)?;
    let existing = state.repo.get_gun(owner, id).await?.ok_or(AppError::NotFound)?;

    let (input, errors) = match form.validate() {
        Ok(input) => {
            let errors = gun_reference_errors(&state, &input).await?;
            (Some(input), errors)
        }
        Err(errors) => (None, errors),
    };

    match input {
        Some(input) if errors.is_empty() => {
            let gun = state
                .repo
                .update_gun(owner, id, input)
                .await?
                .ok_or(AppError::NotFound)?;
            redirect_with_flash(
                &session,
                FlashMessage::success(format!("{} was updated.", gun.name)),
                &format!("/owner/guns/{}", gun.id),
            )
            .await
        }
        _ => {
            let options = reference_options(&state.repo).await?;
            let action = format!("/owner/guns/{id}");
            let view = FormView::new(auth, format!("Edit {}", existing.name), action, form)
                .with_errors(errors);
            Ok(unprocessable(templates::owner::gun_form(&view, &options)))
        }
    }
}

pub async fn delete_gun(
    State(state): State<AppState>,
    auth: AuthContext,
    session: Session,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let owner = auth.require_user()?;
    if !state.repo.delete_gun(owner, parse_uuid(&id)?).await? {
        return Err(AppError::NotFound);
    }
    redirect_with_flash(&session, FlashMessage::success("Gun deleted."), "/owner/guns").await
}

// --- Ammunition ---

// GET /owner/munitions
pub async fn list_ammunition(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let owner = auth.require_user()?;
    let pagination = query.paginate(state.repo.count_ammunition(owner).await?);
    let items = state
        .repo
        .list_ammunition(owner, pagination.offset(), pagination.per_page)
        .await?;
    let options = reference_options(&state.repo).await?;
    let view = ListView::new(auth, "Your ammunition", items, pagination);
    Ok(templates::owner::ammunition_list(&view, &options).into_response())
}

pub async fn new_ammunition(State(state): State<AppState>, auth: AuthContext) -> AppResult<Response> {
    let options = reference_options(&state.repo).await?;
    let values = AmmunitionForm { quantity: "0".to_string(), ..AmmunitionForm::default() };
    let view = FormView::new(auth, "Add ammunition", "/owner/munitions", values);
    Ok(templates::owner::ammunition_form(&view, &options).into_response())
}

async fn ammunition_reference_errors(
    state: &AppState,
    input: &crate::models::AmmunitionInput,
) -> AppResult<FormErrors> {
    check_references(
        &state.repo,
        &[
            ("manufacturer_id", ReferenceKind::Manufacturer, input.manufacturer_id),
            ("caliber_id", ReferenceKind::Caliber, input.caliber_id),
            ("casing_id", ReferenceKind::Casing, input.casing_id),
        ],
    )
    .await
}

pub async fn create_ammunition(
    State(state): State<AppState>,
    auth: AuthContext,
    session: Session,
    Form(form): Form<AmmunitionForm>,
) -> AppResult<Response> {
    let owner = auth.require_user()?;
    let (input, errors) = match form.validate() {
        Ok(input) => {
            let errors = ammunition_reference_errors(&state, &input).await?;
            (Some(input), errors)
        }
        Err(errors) => (None, errors),
    };

    match input {
        Some(input) if errors.is_empty() => {
            let ammo = state.repo.create_ammunition(owner, input).await?;
            tracing::info!(owner = %owner, ammunition = %ammo.id, "ammunition added");
            redirect_with_flash(
                &session,
                FlashMessage::success(format!("{} was added.", ammo.name)),
                &format!("/owner/munitions/{}", ammo.id),
            )
            .await
        }
        _ => {
            let options = reference_options(&state.repo).await?;
            let view = FormView::new(auth, "Add ammunition", "/owner/munitions", form)
                .with_errors(errors);
            Ok(unprocessable(templates::owner::ammunition_form(&view, &options)))
        }
    }
}

pub async fn show_ammunition(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let owner = auth.require_user()?;
    let ammunition = state
        .repo
        .get_ammunition(owner, parse_uuid(&id)?)
        .await?
        .ok_or(AppError::NotFound)?;
    let options = reference_options(&state.repo).await?;
    let view = AmmunitionDetailView { auth, ammunition, options };
    Ok(templates::owner::ammunition_detail(&view).into_response())
}

pub async fn edit_ammunition(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let owner = auth.require_user()?;
    let ammo = state
        .repo
        .get_ammunition(owner, parse_uuid(&id)?)
        .await?
        .ok_or(AppError::NotFound)?;
    let options = reference_options(&state.repo).await?;
    let action = format!("/owner/munitions/{}", ammo.id);
    let view = FormView::new(
        auth,
        format!("Edit {}", ammo.name),
        action,
        AmmunitionForm::from_ammunition(&ammo),
    );
    Ok(templates::owner::ammunition_form(&view, &options).into_response())
}

pub async fn update_ammunition(
    State(state): State<AppState>,
    auth: AuthContext,
    session: Session,
    Path(id): Path<String>,
    Form(form): Form<AmmunitionForm>,
) -> AppResult<Response> {
    let owner = auth.require_user()?;
    let id = parse_uuid(&id)?;
    let existing = state
        .repo
        .get_ammunition(owner, id)
        .await?
        .ok_or(AppError::NotFound)?;

    let (input, errors) = match form.validate() {
        Ok(input) => {
            let errors = ammunition_reference_errors(&state, &input).await?;
            (Some(input), errors)
        }
        Err(errors) => (None, errors),
    };

    match input {
        Some(input) if errors.is_empty() => {
            let ammo = state
                .repo
                .update_ammunition(owner, id, input)
                .await?
                .ok_or(AppError::NotFound)?;
            redirect_with_flash(
                &session,
                FlashMessage::success(format!("{} was updated.", ammo.name)),
                &format!("/owner/munitions/{}", ammo.id),
            )
            .await
        }
        _ => {
            let options = reference_options(&state.repo).await?;
            let action = format!("/owner/munitions/{id}");
            let view = FormView::new(auth, format!("Edit {}", existing.name), action, form)
                .with_errors(errors);
            Ok(unprocessable(templates::owner::ammunition_form(&view, &options)))
        }
    }
}

pub async fn delete_ammunition(
    State(state): State<AppState>,
    auth: AuthContext,
    session: Session,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let owner = auth.require_user()?;
    if !state.repo.delete_ammunition(owner, parse_uuid(&id)?).await? {
        return Err(AppError::NotFound);
    }
    redirect_with_flash(&session, FlashMessage::success("Ammunition deleted."), "/owner/munitions")
        .await
}

// --- Account ---

pub async fn profile(State(state): State<AppState>, auth: AuthContext) -> AppResult<Response> {
    let owner = auth.require_user()?;
    let user = state.repo.get_user(owner).await?.ok_or(AppError::Unauthorized)?;
    let view = ProfileView {
        roles: auth.roles.iter().cloned().collect(),
        name_value: user.name.clone(),
        auth,
        user,
        errors: FormErrors::new(),
    };
    Ok(templates::owner::profile(&view).into_response())
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    session: Session,
    Form(form): Form<ProfileForm>,
) -> AppResult<Response> {
    let owner = auth.require_user()?;
    match form.validate() {
        Ok(name) => {
            state
                .repo
                .update_user_name(owner, &name)
                .await?
                .ok_or(AppError::Unauthorized)?;
            redirect_with_flash(&session, FlashMessage::success("Profile updated."), "/owner/profile")
                .await
        }
        Err(errors) => {
            let user = state.repo.get_user(owner).await?.ok_or(AppError::Unauthorized)?;
            let view = ProfileView {
                roles: auth.roles.iter().cloned().collect(),
                auth,
                user,
                errors,
                name_value: form.name,
            };
            Ok(unprocessable(templates::owner::profile(&view)))
        }
    }
}

pub async fn subscription(State(state): State<AppState>, auth: AuthContext) -> AppResult<Response> {
    let owner = auth.require_user()?;
    let user = state.repo.get_user(owner).await?.ok_or(AppError::Unauthorized)?;
    let view = SubscriptionView { plan: plan_for(&user.subscription_tier), auth, user };
    Ok(templates::owner::subscription(&view).into_response())
}

/// cancel_subscription
///
/// Drops the account back to the free tier immediately.
pub async fn cancel_subscription(
    State(state): State<AppState>,
    auth: AuthContext,
    session: Session,
) -> AppResult<Response> {
    let owner = auth.require_user()?;
    let user = state.repo.get_user(owner).await?.ok_or(AppError::Unauthorized)?;
    if user.subscription_tier == "free" {
        return redirect_with_flash(
            &session,
            FlashMessage::info("You are already on the free plan."),
            "/owner/subscription",
        )
        .await;
    }
    state.repo.set_subscription(owner, "free", None).await?;
    tracing::info!(user = %owner, previous = %user.subscription_tier, "subscription cancelled");
    redirect_with_flash(
        &session,
        FlashMessage::success("Your subscription has been cancelled."),
        "/owner/subscription",
    )
    .await
}
