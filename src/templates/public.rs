use axum::response::Html;
use maud::html;

use super::{csrf_field, form_errors, layout, render, text_field, textarea_field};
use crate::forms::{ContactForm, LoginForm, RegisterForm};
use crate::views::{FormView, PageView, PricingView};

pub fn home(view: &PageView) -> Html<String> {
    let auth = &view.auth;
    render(layout(
        auth,
        "Home",
        html! {
            section.hero {
                h1 { "The Virtual Armory" }
                p { "Keep track of your firearms and ammunition in one place." }
                @if auth.authenticated {
                    p { "Welcome back, " (auth.name) ". " a href="/owner" { "Go to your dashboard" } }
                } @else {
                    p {
                        a.button href="/register" { "Create an account" }
                        " or "
                        a href="/login" { "log in" }
                    }
                }
            }
        },
    ))
}

pub fn login(view: &FormView<LoginForm>) -> Html<String> {
    let auth = &view.auth;
    render(layout(
        auth,
        &view.title,
        html! {
            h1 { (view.title) }
            (form_errors(&view.errors))
            form method="post" action=(view.action) {
                (csrf_field(&auth.csrf_token))
                @if let Some(next) = &view.values.next {
                    input type="hidden" name="next" value=(next);
                }
                (text_field("Email", "email", &view.values.email, "email", &view.errors))
                (text_field("Password", "password", "", "password", &view.errors))
                button type="submit" { "Log in" }
            }
            p { "No account yet? " a href="/register" { "Register" } }
        },
    ))
}

pub fn register(view: &FormView<RegisterForm>) -> Html<String> {
    let auth = &view.auth;
    let values = &view.values;
    render(layout(
        auth,
        &view.title,
        html! {
            h1 { (view.title) }
            (form_errors(&view.errors))
            form method="post" action=(view.action) {
                (csrf_field(&auth.csrf_token))
                (text_field("Name", "name", &values.name, "text", &view.errors))
                (text_field("Email", "email", &values.email, "email", &view.errors))
                (text_field("Password", "password", "", "password", &view.errors))
                (text_field("Confirm password", "password_confirmation", "", "password", &view.errors))
                button type="submit" { "Create account" }
            }
            p { "Already registered? " a href="/login" { "Log in" } }
        },
    ))
}

pub fn pricing(view: &PricingView) -> Html<String> {
    render(layout(
        &view.auth,
        "Pricing",
        html! {
            h1 { "Pricing" }
            @if !view.promotions.is_empty() {
                section.promotions {
                    h2 { "Current promotions" }
                    @for promo in &view.promotions {
                        article.promotion {
                            h3 { (promo.name) }
                            p { (promo.description) }
                            @if promo.promo_type == "free_trial" {
                                p.offer { (promo.benefit_days) " extra days free" }
                            } @else {
                                p.offer { (promo.discount_percent) "% off" }
                            }
                            p.small { "Until " (promo.ends_on.to_string()) }
                        }
                    }
                }
            }
            section.plans {
                @for plan in &view.plans {
                    article.plan {
                        h2 { (plan.label) }
                        p.price {
                            @if plan.monthly_price_cents == 0 {
                                "Free"
                            } @else {
                                "$" (plan.monthly_price_cents / 100) "."
                                (format!("{:02}", plan.monthly_price_cents % 100)) " / month"
                            }
                        }
                        p {
                            @match plan.gun_limit {
                                Some(limit) => { "Up to " (limit) " guns" }
                                None => { "Unlimited guns" }
                            }
                        }
                    }
                }
            }
        },
    ))
}

pub fn contact(view: &FormView<ContactForm>) -> Html<String> {
    let auth = &view.auth;
    let values = &view.values;
    render(layout(
        auth,
        &view.title,
        html! {
            h1 { (view.title) }
            (form_errors(&view.errors))
            form method="post" action=(view.action) {
                (csrf_field(&auth.csrf_token))
                (text_field("Name", "name", &values.name, "text", &view.errors))
                (text_field("Email", "email", &values.email, "email", &view.errors))
                (textarea_field("Message", "message", &values.message, &view.errors))
                button type="submit" { "Send" }
            }
        },
    ))
}
