use axum::response::Html;
use maud::html;

use super::{
    action_button, checkbox_field, csrf_field, form_errors, layout, pagination_nav, render,
    text_field, textarea_field,
};
use crate::forms::{FeatureFlagForm, PromotionForm, ReferenceForm};
use crate::models::{Promotion, ReferenceItem, ReferenceKind, User};
use crate::views::{
    AdminDashboardView, ErrorMetricsView, FeatureFlagsView, FormView, ListView, PermissionsView,
    UserDetailView,
};

pub fn dashboard(view: &AdminDashboardView) -> Html<String> {
    let stats = &view.stats;
    render(layout(
        &view.auth,
        "Admin dashboard",
        html! {
            h1 { "Administration" }
            @if view.policy_degraded {
                div.flash.flash-error role="alert" {
                    "The access policy failed to load. Permission-guarded pages are unavailable until it is reloaded."
                }
            }
            section.stats {
                div.stat { span.value { (stats.users) } " users" }
                div.stat { span.value { (stats.guns) } " guns" }
                div.stat { span.value { (stats.ammunition) } " ammunition entries" }
                div.stat { span.value { (stats.promotions) } " promotions" }
                div.stat { span.value { (stats.feature_flags) } " feature flags" }
                div.stat { span.value { (stats.contact_messages) } " contact messages" }
                div.stat { span.value { (view.error_total) } " error responses" }
            }
            nav.admin-nav {
                ul {
                    @for kind in ReferenceKind::ALL {
                        li { a href={ "/admin/" (kind.slug()) } { (kind.plural_label()) } }
                    }
                    li { a href="/admin/promotions" { "Promotions" } }
                    li { a href="/admin/users" { "Users" } }
                    li { a href="/admin/permissions" { "Permissions" } }
                    li { a href="/admin/permissions/feature-flags" { "Feature flags" } }
                    li { a href="/admin/error-metrics" { "Error metrics" } }
                }
            }
        },
    ))
}

// --- Reference data ---

pub fn reference_list(kind: ReferenceKind, view: &ListView<ReferenceItem>) -> Html<String> {
    let auth = &view.auth;
    let base = format!("/admin/{}", kind.slug());
    render(layout(
        auth,
        &view.title,
        html! {
            h1 { (view.title) }
            p { a.button href={ (base) "/new" } { "Add " (kind.singular_label().to_lowercase()) } }
            table {
                thead { tr { th { "Name" } th { (kind.detail_label()) } th {} } }
                tbody {
                    @for item in &view.items {
                        tr {
                            td { (item.name) }
                            td { (item.detail.as_deref().unwrap_or("-")) }
                            td {
                                a href={ (base) "/" (item.id) "/edit" } { "Edit" }
                                (action_button(&format!("{base}/{}/delete", item.id), "Delete", &auth.csrf_token, true))
                            }
                        }
                    }
                }
            }
            (pagination_nav(&view.pagination, &base))
        },
    ))
}

pub fn reference_form(kind: ReferenceKind, view: &FormView<ReferenceForm>) -> Html<String> {
    let errors = &view.errors;
    render(layout(
        &view.auth,
        &view.title,
        html! {
            h1 { (view.title) }
            (form_errors(errors))
            form method="post" action=(view.action) {
                (csrf_field(&view.auth.csrf_token))
                (text_field("Name", "name", &view.values.name, "text", errors))
                (text_field(kind.detail_label(), "detail", &view.values.detail, "text", errors))
                button type="submit" { "Save" }
            }
            p { a href={ "/admin/" (kind.slug()) } { "Cancel" } }
        },
    ))
}

// --- Promotions ---

pub fn promotions_list(view: &ListView<Promotion>) -> Html<String> {
    let auth = &view.auth;
    render(layout(
        auth,
        &view.title,
        html! {
            h1 { (view.title) }
            p { a.button href="/admin/promotions/new" { "Add promotion" } }
            table {
                thead { tr { th { "Name" } th { "Type" } th { "Offer" } th { "Runs" } th { "Active" } th {} } }
                tbody {
                    @for promo in &view.items {
                        tr {
                            td { (promo.name) }
                            td { (promo.promo_type) }
                            td {
                                @if promo.promo_type == "free_trial" {
                                    (promo.benefit_days) " days"
                                } @else {
                                    (promo.discount_percent) "%"
                                }
                            }
                            td { (promo.starts_on.to_string()) " to " (promo.ends_on.to_string()) }
                            td { @if promo.active { "yes" } @else { "no" } }
                            td {
                                a href={ "/admin/promotions/" (promo.id) "/edit" } { "Edit" }
                                (action_button(&format!("/admin/promotions/{}/delete", promo.id), "Delete", &auth.csrf_token, true))
                            }
                        }
                    }
                }
            }
            (pagination_nav(&view.pagination, "/admin/promotions"))
        },
    ))
}

pub fn promotion_form(view: &FormView<PromotionForm>) -> Html<String> {
    let values = &view.values;
    let errors = &view.errors;
    render(layout(
        &view.auth,
        &view.title,
        html! {
            h1 { (view.title) }
            (form_errors(errors))
            form method="post" action=(view.action) {
                (csrf_field(&view.auth.csrf_token))
                (text_field("Name", "name", &values.name, "text", errors))
                (textarea_field("Description", "description", &values.description, errors))
                label for="promo_type" { "Type" }
                select id="promo_type" name="promo_type" {
                    option value="discount" selected[values.promo_type != "free_trial"] { "Discount" }
                    option value="free_trial" selected[values.promo_type == "free_trial"] { "Free trial" }
                }
                (text_field("Discount (%)", "discount_percent", &values.discount_percent, "number", errors))
                (text_field("Extra days", "benefit_days", &values.benefit_days, "number", errors))
                (text_field("Starts on", "starts_on", &values.starts_on, "date", errors))
                (text_field("Ends on", "ends_on", &values.ends_on, "date", errors))
                (checkbox_field("Active", "active", values.is_active()))
                button type="submit" { "Save" }
            }
            p { a href="/admin/promotions" { "Cancel" } }
        },
    ))
}

// --- Users ---

pub fn users_list(view: &ListView<User>) -> Html<String> {
    render(layout(
        &view.auth,
        &view.title,
        html! {
            h1 { (view.title) }
            table {
                thead { tr { th { "Email" } th { "Name" } th { "Plan" } th { "Joined" } } }
                tbody {
                    @for user in &view.items {
                        tr {
                            td { a href={ "/admin/users/" (user.id.to_string()) } { (user.email) } }
                            td { (user.name) }
                            td { (user.subscription_tier) }
                            td { (user.created_at.format("%Y-%m-%d").to_string()) }
                        }
                    }
                }
            }
            (pagination_nav(&view.pagination, "/admin/users"))
        },
    ))
}

pub fn user_detail(view: &UserDetailView) -> Html<String> {
    let user = &view.user;
    let csrf = &view.auth.csrf_token;
    let base = format!("/admin/users/{}", user.id);
    render(layout(
        &view.auth,
        &user.email,
        html! {
            h1 { (user.email) }
            dl {
                dt { "Name" } dd { (user.name) }
                dt { "Plan" } dd { (user.subscription_tier) }
                dt { "Joined" } dd { (user.created_at.format("%Y-%m-%d").to_string()) }
            }
            h2 { "Roles" }
            @if view.roles.is_empty() {
                p.muted { "No roles assigned." }
            } @else {
                ul {
                    @for role in &view.roles {
                        li {
                            (role) " "
                            form.inline method="post" action={ (base) "/roles/remove" } {
                                (csrf_field(csrf))
                                input type="hidden" name="role" value=(role);
                                button type="submit" class="danger" { "Remove" }
                            }
                        }
                    }
                }
            }
            (form_errors(&view.errors))
            form method="post" action={ (base) "/roles" } {
                (csrf_field(csrf))
                (text_field("Assign role", "role", "", "text", &view.errors))
                button type="submit" { "Assign" }
            }
            p { a href="/admin/users" { "Back to users" } }
        },
    ))
}

// --- Permissions ---

pub fn permissions(view: &PermissionsView) -> Html<String> {
    let csrf = &view.auth.csrf_token;
    render(layout(
        &view.auth,
        "Permissions",
        html! {
            h1 { "Permissions" }
            @if view.degraded {
                div.flash.flash-error role="alert" {
                    "The access policy is not loaded. All permission checks deny until a reload succeeds."
                }
            }
            (action_button("/admin/permissions/reload", "Reload policy", csrf, false))
            p { a href="/admin/permissions/feature-flags" { "Manage feature flags" } }

            h2 { "Policy rules" }
            table {
                thead { tr { th { "Role" } th { "Resource" } th { "Action" } th {} } }
                tbody {
                    @for rule in &view.rules {
                        tr {
                            td { (rule.role) }
                            td { (rule.resource) }
                            td { (rule.action) }
                            td {
                                @if view.editable {
                                    form.inline method="post" action="/admin/permissions/policies/delete" {
                                        (csrf_field(csrf))
                                        input type="hidden" name="role" value=(rule.role);
                                        input type="hidden" name="resource" value=(rule.resource);
                                        input type="hidden" name="action" value=(rule.action);
                                        button type="submit" class="danger" { "Remove" }
                                    }
                                }
                            }
                        }
                    }
                }
            }
            @if view.editable {
                h3 { "Add rule" }
                (form_errors(&view.errors))
                form method="post" action="/admin/permissions/policies" {
                    (csrf_field(csrf))
                    (text_field("Role", "role", "", "text", &view.errors))
                    (text_field("Resource", "resource", "", "text", &view.errors))
                    (text_field("Action", "action", "", "text", &view.errors))
                    button type="submit" { "Add" }
                }
            } @else {
                p.muted { "The policy is loaded from a file and is read-only here." }
            }

            h2 { "Role assignments" }
            table {
                thead { tr { th { "User" } th { "Role" } } }
                tbody {
                    @for assignment in &view.assignments {
                        tr {
                            td {
                                @match view.emails.get(&assignment.user_id) {
                                    Some(email) => {
                                        a href={ "/admin/users/" (assignment.user_id) } { (email) }
                                    }
                                    None => { (assignment.user_id) }
                                }
                            }
                            td { (assignment.role) }
                        }
                    }
                }
            }
        },
    ))
}

// --- Feature flags ---

pub fn feature_flags(view: &FeatureFlagsView) -> Html<String> {
    let csrf = &view.auth.csrf_token;
    render(layout(
        &view.auth,
        "Feature flags",
        html! {
            h1 { "Feature flags" }
            p { a.button href="/admin/permissions/feature-flags/new" { "New flag" } }
            table {
                thead { tr { th { "Name" } th { "Description" } th { "Roles" } th { "Enabled" } th {} } }
                tbody {
                    @for flag in &view.flags {
                        @let base = format!("/admin/permissions/feature-flags/{}", flag.id);
                        tr {
                            td { code { (flag.name) } }
                            td { (flag.description) }
                            td {
                                @if flag.roles.is_empty() { "everyone" } @else { (flag.roles.join(", ")) }
                            }
                            td { @if flag.enabled { "on" } @else { "off" } }
                            td {
                                a href={ (base) "/edit" } { "Edit" }
                                (action_button(&format!("{base}/toggle"), if flag.enabled { "Disable" } else { "Enable" }, csrf, false))
                                (action_button(&format!("{base}/delete"), "Delete", csrf, true))
                            }
                        }
                    }
                }
            }
        },
    ))
}

pub fn feature_flag_form(view: &FormView<FeatureFlagForm>, editing: bool) -> Html<String> {
    let values = &view.values;
    let errors = &view.errors;
    render(layout(
        &view.auth,
        &view.title,
        html! {
            h1 { (view.title) }
            (form_errors(errors))
            form method="post" action=(view.action) {
                (csrf_field(&view.auth.csrf_token))
                (text_field("Name", "name", &values.name, "text", errors))
                (textarea_field("Description", "description", &values.description, errors))
                (text_field("Roles (comma separated, empty for everyone)", "roles", &values.roles, "text", errors))
                @if editing {
                    (checkbox_field("Enabled", "enabled", values.is_enabled()))
                } @else {
                    p.muted { "New flags start disabled." }
                }
                button type="submit" { "Save" }
            }
            p { a href="/admin/permissions/feature-flags" { "Cancel" } }
        },
    ))
}

// --- Error metrics ---

pub fn error_metrics(view: &ErrorMetricsView) -> Html<String> {
    render(layout(
        &view.auth,
        "Error metrics",
        html! {
            h1 { "Error metrics" }
            p { (view.total) " error responses since startup." }
            table {
                thead { tr { th { "Status" } th { "Path" } th { "Count" } th { "Last seen" } } }
                tbody {
                    @for row in &view.rows {
                        tr {
                            td { (row.status) }
                            td { code { (row.path) } }
                            td { (row.count) }
                            td { (row.last_seen.format("%Y-%m-%d %H:%M:%S").to_string()) }
                        }
                    }
                }
            }
        },
    ))
}
