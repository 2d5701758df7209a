use axum::response::Html;
use maud::{Markup, html};

use super::{
    action_button, csrf_field, form_errors, layout, pagination_nav, reference_select, render,
    text_field, textarea_field,
};
use crate::forms::{AmmunitionForm, GunForm};
use crate::models::{Ammunition, Gun, ReferenceKind};
use crate::views::{
    AmmunitionDetailView, DashboardView, FormView, GunDetailView, ListView, ProfileView,
    ReferenceOptions, SubscriptionView,
};

fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

pub fn dashboard(view: &DashboardView) -> Html<String> {
    let auth = &view.auth;
    render(layout(
        auth,
        "Dashboard",
        html! {
            h1 { "Welcome, " (auth.name) }
            section.stats {
                div.stat { span.value { (view.gun_count) } " guns" }
                div.stat { span.value { (view.ammunition_count) } " ammunition entries" }
                div.stat { "Plan: " strong { (view.plan.label) } }
            }
            section {
                h2 { "Recently added guns" }
                @if view.recent_guns.is_empty() {
                    p { "Nothing here yet. " a href="/owner/guns/new" { "Add your first gun" } }
                } @else {
                    ul {
                        @for gun in &view.recent_guns {
                            li { a href={ "/owner/guns/" (gun.id.to_string()) } { (gun.name) } }
                        }
                    }
                }
            }
            @if let Some(ammo) = &view.ammunition_panel {
                section.ammo-panel {
                    h2 { "Ammunition on hand" }
                    @let total: i64 = ammo.iter().map(|a| a.quantity).sum();
                    p { (total) " rounds across " (ammo.len()) " entries shown" }
                    ul {
                        @for entry in ammo {
                            li { (entry.name) ": " (entry.quantity) }
                        }
                    }
                }
            }
        },
    ))
}

// --- Guns ---

pub fn guns_list(view: &ListView<Gun>, options: &ReferenceOptions) -> Html<String> {
    let auth = &view.auth;
    render(layout(
        auth,
        &view.title,
        html! {
            h1 { (view.title) }
            p { a.button href="/owner/guns/new" { "Add gun" } }
            table {
                thead { tr { th { "Name" } th { "Manufacturer" } th { "Caliber" } th { "Type" } th {} } }
                tbody {
                    @for gun in &view.items {
                        tr {
                            td { a href={ "/owner/guns/" (gun.id.to_string()) } { (gun.name) } }
                            td { (or_dash(options.name_of(ReferenceKind::Manufacturer, gun.manufacturer_id))) }
                            td { (or_dash(options.name_of(ReferenceKind::Caliber, gun.caliber_id))) }
                            td { (or_dash(options.name_of(ReferenceKind::WeaponType, gun.weapon_type_id))) }
                            td {
                                a href={ "/owner/guns/" (gun.id.to_string()) "/edit" } { "Edit" }
                                (action_button(&format!("/owner/guns/{}/delete", gun.id), "Delete", &auth.csrf_token, true))
                            }
                        }
                    }
                }
            }
            (pagination_nav(&view.pagination, "/owner/guns"))
        },
    ))
}

pub fn gun_detail(view: &GunDetailView) -> Html<String> {
    let gun = &view.gun;
    let options = &view.options;
    render(layout(
        &view.auth,
        &gun.name,
        html! {
            h1 { (gun.name) }
            dl {
                dt { "Serial number" } dd { (or_dash(gun.serial_number.as_deref())) }
                dt { "Manufacturer" } dd { (or_dash(options.name_of(ReferenceKind::Manufacturer, gun.manufacturer_id))) }
                dt { "Caliber" } dd { (or_dash(options.name_of(ReferenceKind::Caliber, gun.caliber_id))) }
                dt { "Type" } dd { (or_dash(options.name_of(ReferenceKind::WeaponType, gun.weapon_type_id))) }
                dt { "Acquired" } dd {
                    @match gun.acquired_on {
                        Some(date) => { (date.to_string()) }
                        None => { "-" }
                    }
                }
                dt { "Notes" } dd { (or_dash(gun.notes.as_deref())) }
            }
            p {
                a href={ "/owner/guns/" (gun.id.to_string()) "/edit" } { "Edit" }
                " "
                a href="/owner/guns" { "Back to list" }
            }
        },
    ))
}

pub fn gun_form(view: &FormView<GunForm>, options: &ReferenceOptions) -> Html<String> {
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
                (text_field("Serial number", "serial_number", &values.serial_number, "text", errors))
                (reference_select("Manufacturer", "manufacturer_id", &options.manufacturers, &values.manufacturer_id, errors))
                (reference_select("Caliber", "caliber_id", &options.calibers, &values.caliber_id, errors))
                (reference_select("Type", "weapon_type_id", &options.weapon_types, &values.weapon_type_id, errors))
                (text_field("Acquired on", "acquired_on", &values.acquired_on, "date", errors))
                (textarea_field("Notes", "notes", &values.notes, errors))
                button type="submit" { "Save" }
            }
            p { a href="/owner/guns" { "Cancel" } }
        },
    ))
}

// --- Ammunition ---

pub fn ammunition_list(view: &ListView<Ammunition>, options: &ReferenceOptions) -> Html<String> {
    let auth = &view.auth;
    render(layout(
        auth,
        &view.title,
        html! {
            h1 { (view.title) }
            p { a.button href="/owner/munitions/new" { "Add ammunition" } }
            table {
                thead { tr { th { "Name" } th { "Caliber" } th { "Casing" } th { "Count" } th {} } }
                tbody {
                    @for ammo in &view.items {
                        tr {
                            td { a href={ "/owner/munitions/" (ammo.id.to_string()) } { (ammo.name) } }
                            td { (or_dash(options.name_of(ReferenceKind::Caliber, ammo.caliber_id))) }
                            td { (or_dash(options.name_of(ReferenceKind::Casing, ammo.casing_id))) }
                            td { (ammo.quantity) }
                            td {
                                a href={ "/owner/munitions/" (ammo.id.to_string()) "/edit" } { "Edit" }
                                (action_button(&format!("/owner/munitions/{}/delete", ammo.id), "Delete", &auth.csrf_token, true))
                            }
                        }
                    }
                }
            }
            (pagination_nav(&view.pagination, "/owner/munitions"))
        },
    ))
}

pub fn ammunition_detail(view: &AmmunitionDetailView) -> Html<String> {
    let ammo = &view.ammunition;
    let options = &view.options;
    render(layout(
        &view.auth,
        &ammo.name,
        html! {
            h1 { (ammo.name) }
            dl {
                dt { "Manufacturer" } dd { (or_dash(options.name_of(ReferenceKind::Manufacturer, ammo.manufacturer_id))) }
                dt { "Caliber" } dd { (or_dash(options.name_of(ReferenceKind::Caliber, ammo.caliber_id))) }
                dt { "Casing" } dd { (or_dash(options.name_of(ReferenceKind::Casing, ammo.casing_id))) }
                dt { "Count" } dd { (ammo.quantity) }
                dt { "Notes" } dd { (or_dash(ammo.notes.as_deref())) }
            }
            p {
                a href={ "/owner/munitions/" (ammo.id.to_string()) "/edit" } { "Edit" }
                " "
                a href="/owner/munitions" { "Back to list" }
            }
        },
    ))
}

pub fn ammunition_form(view: &FormView<AmmunitionForm>, options: &ReferenceOptions) -> Html<String> {
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
                (reference_select("Manufacturer", "manufacturer_id", &options.manufacturers, &values.manufacturer_id, errors))
                (reference_select("Caliber", "caliber_id", &options.calibers, &values.caliber_id, errors))
                (reference_select("Casing", "casing_id", &options.casings, &values.casing_id, errors))
                (text_field("Count", "quantity", &values.quantity, "number", errors))
                (textarea_field("Notes", "notes", &values.notes, errors))
                button type="submit" { "Save" }
            }
            p { a href="/owner/munitions" { "Cancel" } }
        },
    ))
}

// --- Account ---

fn role_badges(roles: &[String]) -> Markup {
    html! {
        @if roles.is_empty() {
            span.muted { "no roles" }
        } @else {
            @for role in roles {
                span.badge { (role) } " "
            }
        }
    }
}

pub fn profile(view: &ProfileView) -> Html<String> {
    let errors = &view.errors;
    render(layout(
        &view.auth,
        "Profile",
        html! {
            h1 { "Your profile" }
            dl {
                dt { "Email" } dd { (view.user.email) }
                dt { "Roles" } dd { (role_badges(&view.roles)) }
                dt { "Member since" } dd { (view.user.created_at.format("%Y-%m-%d").to_string()) }
            }
            (form_errors(errors))
            form method="post" action="/owner/profile" {
                (csrf_field(&view.auth.csrf_token))
                (text_field("Display name", "name", &view.name_value, "text", errors))
                button type="submit" { "Update" }
            }
        },
    ))
}

pub fn subscription(view: &SubscriptionView) -> Html<String> {
    let plan = &view.plan;
    render(layout(
        &view.auth,
        "Subscription",
        html! {
            h1 { "Your subscription" }
            p { "Current plan: " strong { (plan.label) } }
            @if let Some(expires) = view.user.subscription_expires_at {
                p { "Renews or expires on " (expires.format("%Y-%m-%d").to_string()) }
            }
            @if plan.tier == "free" {
                p { "See " a href="/pricing" { "pricing" } " for upgrade options." }
            } @else {
                (action_button("/owner/subscription/cancel", "Cancel subscription", &view.auth.csrf_token, true))
            }
        },
    ))
}
