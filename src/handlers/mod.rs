//! Request handlers.
//!
//! Handlers validate input, call the repository, and choose a template.
//! Validation failures re-render the same form with `422 Unprocessable Entity`;
//! successful mutations queue a flash message and answer `303 See Other`.

pub mod admin;
pub mod owner;
pub mod permissions;
pub mod public;
pub mod reference;

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    forms::FormErrors,
    models::ReferenceKind,
    repository::RepositoryState,
    session::{self, FlashMessage},
    views::ReferenceOptions,
};

/// Queues `message` and redirects to `to` with 303.
pub(crate) async fn redirect_with_flash(
    session: &Session,
    message: FlashMessage,
    to: &str,
) -> AppResult<Response> {
    session::push_flash(session, message).await?;
    Ok(Redirect::to(to).into_response())
}

/// A re-rendered form after failed validation.
pub(crate) fn unprocessable(page: Html<String>) -> Response {
    (StatusCode::UNPROCESSABLE_ENTITY, page).into_response()
}

/// Path ids that do not parse are treated as missing records.
pub(crate) fn parse_uuid(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound)
}

pub(crate) fn parse_id(raw: &str) -> AppResult<i64> {
    raw.parse::<i64>().map_err(|_| AppError::NotFound)
}

/// Loads every reference table for the collection forms.
pub(crate) async fn reference_options(repo: &RepositoryState) -> AppResult<ReferenceOptions> {
    Ok(ReferenceOptions {
        manufacturers: repo.all_reference(ReferenceKind::Manufacturer).await?,
        calibers: repo.all_reference(ReferenceKind::Caliber).await?,
        weapon_types: repo.all_reference(ReferenceKind::WeaponType).await?,
        casings: repo.all_reference(ReferenceKind::Casing).await?,
    })
}

/// check_references
///
/// Confirms every chosen reference id still exists. Returns one error per
/// dangling field.
pub(crate) async fn check_references(
    repo: &RepositoryState,
    refs: &[(&str, ReferenceKind, Option<i64>)],
) -> AppResult<FormErrors> {
    let mut errors = FormErrors::new();
    for (field, kind, id) in refs {
        if let Some(id) = id {
            if repo.get_reference(*kind, *id).await?.is_none() {
                errors.add(
                    field,
                    format!("The selected {} no longer exists.", kind.singular_label().to_lowercase()),
                );
            }
        }
    }
    Ok(errors)
}
