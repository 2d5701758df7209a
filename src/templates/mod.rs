//! Server-side HTML, built with `maud`.
//!
//! `layout` wraps every page: navigation driven by the `AuthContext`, the
//! pending flash messages and the CSRF meta tag. Shared form and listing
//! components live here; page bodies live in the per-area modules.

pub mod admin;
pub mod owner;
pub mod public;

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use maud::{DOCTYPE, Markup, html};

use crate::auth::AuthContext;
use crate::forms::FormErrors;
use crate::models::ReferenceItem;
use crate::pagination::Pagination;

/// Turns finished markup into an axum response body.
pub fn render(markup: Markup) -> Html<String> {
    Html(markup.into_string())
}

/// layout
///
/// The page shell. Flash messages in `auth` are rendered once here.
pub fn layout(auth: &AuthContext, title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                @if !auth.csrf_token.is_empty() {
                    meta name="csrf-token" content=(auth.csrf_token);
                }
                title { (title) " | The Virtual Armory" }
            }
            body {
                (navigation(auth))
                main.container {
                    @for flash in &auth.flashes {
                        div class={ "flash flash-" (flash.kind.as_str()) } role="status" { (flash.text) }
                    }
                    (content)
                }
                footer { p { "The Virtual Armory" } }
            }
        }
    }
}

fn navigation(auth: &AuthContext) -> Markup {
    let link = |href: &str, label: &str| {
        let active = auth.current_path == href
            || (href != "/" && auth.current_path.starts_with(&format!("{href}/")));
        html! { a href=(href) class=[active.then_some("active")] { (label) } }
    };
    html! {
        nav.main-nav {
            (link("/", "Home"))
            (link("/pricing", "Pricing"))
            (link("/contact", "Contact"))
            @if auth.authenticated {
                (link("/owner", "Dashboard"))
                (link("/owner/guns", "Guns"))
                (link("/owner/munitions", "Munitions"))
                (link("/owner/profile", "Profile"))
                @if auth.admin_access {
                    (link("/admin/dashboard", "Admin"))
                }
                form.inline method="post" action="/logout" {
                    (csrf_field(&auth.csrf_token))
                    button type="submit" { "Log out (" (auth.email) ")" }
                }
            } @else {
                (link("/login", "Log in"))
                (link("/register", "Register"))
            }
        }
    }
}

// --- Components ---

pub fn csrf_field(token: &str) -> Markup {
    html! { input type="hidden" name="csrf_token" value=(token); }
}

/// Summary box listing every error; empty markup when there are none.
pub fn form_errors(errors: &FormErrors) -> Markup {
    html! {
        @if !errors.is_empty() {
            div.form-errors role="alert" {
                p { "Please correct the following:" }
                ul {
                    @for (_, message) in errors.iter() {
                        li { (message) }
                    }
                }
            }
        }
    }
}

fn field_error(errors: &FormErrors, field: &str) -> Markup {
    html! {
        @if let Some(message) = errors.get(field) {
            span.field-error { (message) }
        }
    }
}

pub fn text_field(label: &str, name: &str, value: &str, input_type: &str, errors: &FormErrors) -> Markup {
    html! {
        label for=(name) { (label) }
        input type=(input_type) id=(name) name=(name) value=(value)
            aria-invalid=[errors.get(name).map(|_| "true")];
        (field_error(errors, name))
    }
}

pub fn textarea_field(label: &str, name: &str, value: &str, errors: &FormErrors) -> Markup {
    html! {
        label for=(name) { (label) }
        textarea id=(name) name=(name) rows="4" { (value) }
        (field_error(errors, name))
    }
}

pub fn checkbox_field(label: &str, name: &str, checked: bool) -> Markup {
    html! {
        label {
            input type="checkbox" name=(name) value="on" checked[checked];
            " " (label)
        }
    }
}

/// Dropdown over reference items; `selected` is the raw submitted value.
pub fn reference_select(
    label: &str,
    name: &str,
    options: &[ReferenceItem],
    selected: &str,
    errors: &FormErrors,
) -> Markup {
    html! {
        label for=(name) { (label) }
        select id=(name) name=(name) {
            option value="" { "(none)" }
            @for item in options {
                @let value = item.id.to_string();
                option value=(value) selected[value == selected] { (item.name) }
            }
        }
        (field_error(errors, name))
    }
}

/// A one-button form posting to `action`, e.g. delete or toggle.
pub fn action_button(action: &str, label: &str, csrf_token: &str, confirm: bool) -> Markup {
    html! {
        form.inline method="post" action=(action) {
            (csrf_field(csrf_token))
            @if confirm {
                button type="submit" class="danger" onclick="return confirm('Are you sure?')" { (label) }
            } @else {
                button type="submit" { (label) }
            }
        }
    }
}

/// pagination_nav
///
/// Summary line plus prev/next and the page window. `base_path` must not
/// carry a query string.
pub fn pagination_nav(p: &Pagination, base_path: &str) -> Markup {
    let href = |page: i64| format!("{base_path}?page={page}&per_page={}", p.per_page);
    html! {
        div.pagination {
            @if p.total_items == 0 {
                p.summary { "No entries yet." }
            } @else {
                p.summary {
                    "Showing " (p.showing_from) " to " (p.showing_to) " of " (p.total_items)
                }
            }
            @if p.total_pages > 1 {
                nav aria-label="Pagination" {
                    @if p.has_prev {
                        a rel="prev" href=(href(p.prev_page)) { "« Previous" }
                    }
                    @for page in &p.pages {
                        @if *page == p.current_page {
                            span.current aria-current="page" { (page) }
                        } @else {
                            a href=(href(*page)) { (page) }
                        }
                    }
                    @if p.has_next {
                        a rel="next" href=(href(p.next_page)) { "Next »" }
                    }
                }
            }
        }
    }
}

// --- Errors ---

/// error_page
///
/// Standalone page for error responses. Rendered without an `AuthContext`,
/// since errors can be produced before the auth middleware has run.
pub fn error_page(status: StatusCode, message: &str) -> Html<String> {
    let heading = match status {
        StatusCode::NOT_FOUND => "Page not found",
        StatusCode::FORBIDDEN => "Access denied",
        StatusCode::TOO_MANY_REQUESTS => "Slow down",
        StatusCode::CONFLICT => "Conflict",
        s if s.is_server_error() => "Server error",
        _ => "Request error",
    };
    let auth = AuthContext::anonymous("");
    render(layout(
        &auth,
        heading,
        html! {
            section.error-page {
                h1 { (status.as_u16()) ": " (heading) }
                p { (message) }
                p { a href="/" { "Back to the home page" } }
            }
        },
    ))
}

pub fn error_response(status: StatusCode, message: &str) -> Response {
    (status, error_page(status, message)).into_response()
}
