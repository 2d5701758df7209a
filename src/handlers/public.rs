use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;

use super::{redirect_with_flash, unprocessable};
use crate::{
    AppState,
    auth::{self, AuthContext},
    error::{AppError, AppResult},
    features::{self, FeatureGate},
    forms::{ContactForm, FormErrors, LoginForm, RegisterForm},
    metrics,
    models::{NewUser, PLANS},
    session::{self, FlashMessage},
    templates,
    views::{FormView, PageView, PricingView},
};

/// Upper bound on promotions considered for the pricing banner.
const PROMOTION_SCAN_LIMIT: i64 = 100;

// GET /
pub async fn home(auth: AuthContext) -> Response {
    templates::public::home(&PageView { auth }).into_response()
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

/// login_page
///
/// Signed-in users skip straight to their dashboard.
pub async fn login_page(auth: AuthContext, Query(query): Query<LoginQuery>) -> Response {
    if auth.authenticated {
        return Redirect::to("/owner").into_response();
    }
    let values = LoginForm { next: query.next, ..LoginForm::default() };
    templates::public::login(&FormView::new(auth, "Log in", "/login", values)).into_response()
}

/// login
///
/// Unknown email and wrong password produce the same message.
pub async fn login(
    State(state): State<AppState>,
    auth: AuthContext,
    session: Session,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let email = form.email.trim().to_lowercase();
    let user = state.repo.find_user_by_email(&email).await?;

    let verified = auth::verify_login(
        &form.password,
        user.as_ref().map(|user| user.password_hash.as_str()),
    )?;
    let Some(user) = user.filter(|_| verified) else {
        tracing::info!(email = %email, "login rejected");
        let mut errors = FormErrors::new();
        errors.add("email", "Invalid email or password.");
        let values = LoginForm { password: String::new(), ..form };
        let view = FormView::new(auth, "Log in", "/login", values).with_errors(errors);
        return Ok(unprocessable(templates::public::login(&view)));
    };

    session::login_session(&session, user.id).await?;
    tracing::info!(user = %user.id, "user logged in");
    let target = auth::safe_redirect_target(form.next.as_deref()).to_string();
    redirect_with_flash(&session, FlashMessage::success(format!("Welcome back, {}.", user.name)), &target).await
}

pub async fn register_page(auth: AuthContext) -> Response {
    if auth.authenticated {
        return Redirect::to("/owner").into_response();
    }
    templates::public::register(&FormView::new(auth, "Register", "/register", RegisterForm::default()))
        .into_response()
}

/// register
///
/// Creates the account, grants the configured default role and signs the
/// new user in.
pub async fn register(
    State(state): State<AppState>,
    auth: AuthContext,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> AppResult<Response> {
    let rerender = |auth: AuthContext, form: RegisterForm, errors: FormErrors| {
        let values = RegisterForm {
            password: String::new(),
            password_confirmation: String::new(),
            ..form
        };
        let view = FormView::new(auth, "Register", "/register", values).with_errors(errors);
        unprocessable(templates::public::register(&view))
    };

    let (name, email) = match form.validate() {
        Ok(valid) => valid,
        Err(errors) => return Ok(rerender(auth, form, errors)),
    };

    let new_user = NewUser {
        email,
        name,
        password_hash: auth::hash_password(&form.password)?,
    };
    let user = match state.repo.create_user(new_user).await {
        Ok(user) => user,
        Err(AppError::Conflict(message)) => {
            let mut errors = FormErrors::new();
            errors.add("email", message);
            return Ok(rerender(auth, form, errors));
        }
        Err(err) => return Err(err),
    };

    state
        .repo
        .assign_role(&user.id.to_string(), &state.config.default_role)
        .await?;
    if let Err(err) = state.policy.reload_policy().await {
        tracing::warn!(error = %err, "policy reload after registration failed");
    }

    session::login_session(&session, user.id).await?;
    tracing::info!(user = %user.id, role = %state.config.default_role, "user registered");
    redirect_with_flash(&session, FlashMessage::success("Your account has been created."), "/owner").await
}

// POST /logout
pub async fn logout(auth: AuthContext, session: Session) -> AppResult<Response> {
    session::logout_session(&session).await?;
    if let Some(user_id) = auth.user_id {
        tracing::info!(user = %user_id, "user logged out");
    }
    redirect_with_flash(&session, FlashMessage::info("You have been logged out."), "/").await
}

/// pricing
///
/// Plans are always listed; promotions only when the banner flag is open to
/// this caller.
pub async fn pricing(State(state): State<AppState>, auth: AuthContext) -> AppResult<Response> {
    let gate = FeatureGate::load(&state.repo).await?;
    let promotions = if gate.can_access_feature(&auth.roles, features::PROMOTIONS_BANNER) {
        let today = Utc::now().date_naive();
        state
            .repo
            .list_promotions(0, PROMOTION_SCAN_LIMIT)
            .await?
            .into_iter()
            .filter(|promo| promo.is_current(today))
            .collect()
    } else {
        Vec::new()
    };
    let view = PricingView { auth, plans: PLANS.to_vec(), promotions };
    Ok(templates::public::pricing(&view).into_response())
}

pub async fn contact_page(auth: AuthContext) -> Response {
    let values = ContactForm {
        name: auth.name.clone(),
        email: auth.email.clone(),
        ..ContactForm::default()
    };
    templates::public::contact(&FormView::new(auth, "Contact us", "/contact", values)).into_response()
}

pub async fn contact(
    State(state): State<AppState>,
    auth: AuthContext,
    session: Session,
    Form(form): Form<ContactForm>,
) -> AppResult<Response> {
    let input = match form.validate() {
        Ok(input) => input,
        Err(errors) => {
            let view = FormView::new(auth, "Contact us", "/contact", form).with_errors(errors);
            return Ok(unprocessable(templates::public::contact(&view)));
        }
    };
    state.repo.create_contact_message(input).await?;
    redirect_with_flash(
        &session,
        FlashMessage::success("Thanks for your message. We will get back to you soon."),
        "/contact",
    )
    .await
}

/// Fallback for every unmapped path.
pub async fn not_found() -> Response {
    let mut response = AppError::NotFound.into_response();
    response.extensions_mut().insert(metrics::UnmatchedRoute);
    response
}
