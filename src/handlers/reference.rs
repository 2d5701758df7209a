//! Admin CRUD for the four lookup tables.
//!
//! One set of handlers serves every [`ReferenceKind`]; the router mounts it
//! once per kind and passes the kind in as an extension.

use axum::{
    Extension, Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use super::{parse_id, redirect_with_flash, unprocessable};
use crate::{
    AppState,
    auth::AuthContext,
    error::{AppError, AppResult},
    forms::{FormErrors, ReferenceForm},
    models::ReferenceKind,
    pagination::PageQuery,
    session::FlashMessage,
    templates,
    views::{FormView, ListView},
};

fn base_path(kind: ReferenceKind) -> String {
    format!("/admin/{}", kind.slug())
}

pub async fn list(
    State(state): State<AppState>,
    Extension(kind): Extension<ReferenceKind>,
    auth: AuthContext,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let pagination = query.paginate(state.repo.count_reference(kind).await?);
    let items = state
        .repo
        .list_reference(kind, pagination.offset(), pagination.per_page)
        .await?;
    let view = ListView::new(auth, kind.plural_label(), items, pagination);
    Ok(templates::admin::reference_list(kind, &view).into_response())
}

pub async fn new(Extension(kind): Extension<ReferenceKind>, auth: AuthContext) -> Response {
    let title = format!("Add {}", kind.singular_label().to_lowercase());
    let view = FormView::new(auth, title, base_path(kind), ReferenceForm::default());
    templates::admin::reference_form(kind, &view).into_response()
}

/// create
///
/// A duplicate name within the same kind comes back as a field error.
pub async fn create(
    State(state): State<AppState>,
    Extension(kind): Extension<ReferenceKind>,
    auth: AuthContext,
    session: Session,
    Form(form): Form<ReferenceForm>,
) -> AppResult<Response> {
    let title = format!("Add {}", kind.singular_label().to_lowercase());
    let errors = match form.validate() {
        Ok(input) => match state.repo.create_reference(kind, input).await {
            Ok(item) => {
                tracing::info!(kind = kind.as_str(), id = item.id, name = %item.name, "reference item created");
                return redirect_with_flash(
                    &session,
                    FlashMessage::success(format!("{} was added.", item.name)),
                    &base_path(kind),
                )
                .await;
            }
            Err(AppError::Conflict(message)) => conflict_errors(message),
            Err(err) => return Err(err),
        },
        Err(errors) => errors,
    };
    let view = FormView::new(auth, title, base_path(kind), form).with_errors(errors);
    Ok(unprocessable(templates::admin::reference_form(kind, &view)))
}

fn conflict_errors(message: String) -> FormErrors {
    let mut errors = FormErrors::new();
    errors.add("name", message);
    errors
}

pub async fn edit(
    State(state): State<AppState>,
    Extension(kind): Extension<ReferenceKind>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let item = state
        .repo
        .get_reference(kind, parse_id(&id)?)
        .await?
        .ok_or(AppError::NotFound)?;
    let action = format!("{}/{}", base_path(kind), item.id);
    let view = FormView::new(
        auth,
        format!("Edit {}", item.name),
        action,
        ReferenceForm::from_item(&item),
    );
    Ok(templates::admin::reference_form(kind, &view).into_response())
}

pub async fn update(
    State(state): State<AppState>,
    Extension(kind): Extension<ReferenceKind>,
    auth: AuthContext,
    session: Session,
    Path(id): Path<String>,
    Form(form): Form<ReferenceForm>,
) -> AppResult<Response> {
    let id = parse_id(&id)?;
    let existing = state
        .repo
        .get_reference(kind, id)
        .await?
        .ok_or(AppError::NotFound)?;

    let errors = match form.validate() {
        Ok(input) => match state.repo.update_reference(kind, id, input).await {
            Ok(Some(item)) => {
                return redirect_with_flash(
                    &session,
                    FlashMessage::success(format!("{} was updated.", item.name)),
                    &base_path(kind),
                )
                .await;
            }
            Ok(None) => return Err(AppError::NotFound),
            Err(AppError::Conflict(message)) => conflict_errors(message),
            Err(err) => return Err(err),
        },
        Err(errors) => errors,
    };
    let action = format!("{}/{id}", base_path(kind));
    let view = FormView::new(auth, format!("Edit {}", existing.name), action, form)
        .with_errors(errors);
    Ok(unprocessable(templates::admin::reference_form(kind, &view)))
}

/// delete
///
/// Guns and ammunition that pointed at the item keep their record with the
/// reference cleared.
pub async fn delete(
    State(state): State<AppState>,
    Extension(kind): Extension<ReferenceKind>,
    session: Session,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = parse_id(&id)?;
    if !state.repo.delete_reference(kind, id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(kind = kind.as_str(), id, "reference item deleted");
    redirect_with_flash(
        &session,
        FlashMessage::success(format!("{} deleted.", kind.singular_label())),
        &base_path(kind),
    )
    .await
}
