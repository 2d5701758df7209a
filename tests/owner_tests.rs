mod common;

use axum::http::StatusCode;
use chrono::Utc;
use common::spawn_app;
use virtual_armory::models::{
    FeatureFlagInput, GunInput, PromotionInput, ReferenceInput, ReferenceKind,
};

fn gun(name: &str) -> GunInput {
    GunInput { name: name.to_string(), ..GunInput::default() }
}

#[tokio::test]
async fn owner_creates_views_and_deletes_a_gun() {
    let app = spawn_app().await;
    app.create_user("owner@armory.test", Some("owner")).await;
    let mut browser = app.login_as("owner@armory.test").await;
    browser.get("/owner/guns/new").await;

    let created = browser
        .post_form("/owner/guns", &[("name", "Model 70"), ("serial_number", "G123")])
        .await;
    assert_eq!(created.status, StatusCode::SEE_OTHER);
    let location = created.location.expect("redirect to the new gun");
    assert!(location.starts_with("/owner/guns/"));

    let detail = browser.get(&location).await;
    assert_eq!(detail.status, StatusCode::OK);
    assert!(detail.body.contains("Model 70"));
    assert!(detail.body.contains("G123"));

    let deleted = browser.post_form(&format!("{location}/delete"), &[]).await;
    assert_eq!(deleted.status, StatusCode::SEE_OTHER);
    assert_eq!(browser.get(&location).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn another_owners_gun_is_not_found() {
    let app = spawn_app().await;
    let alice = app.create_user("alice@armory.test", Some("owner")).await;
    app.create_user("bob@armory.test", Some("owner")).await;
    let gun = app.repo.create_gun(alice, gun("Alice's rifle")).await.unwrap();

    let mut bob = app.login_as("bob@armory.test").await;
    let path = format!("/owner/guns/{}", gun.id);
    assert_eq!(bob.get(&path).await.status, StatusCode::NOT_FOUND);
    assert_eq!(bob.get(&format!("{path}/edit")).await.status, StatusCode::NOT_FOUND);
    assert_eq!(
        bob.post_form(&format!("{path}/delete"), &[]).await.status,
        StatusCode::NOT_FOUND
    );
    assert!(app.repo.get_gun(alice, gun.id).await.unwrap().is_some());
}

#[tokio::test]
async fn malformed_ids_are_not_found() {
    let app = spawn_app().await;
    app.create_user("owner@armory.test", Some("owner")).await;
    let mut browser = app.login_as("owner@armory.test").await;
    assert_eq!(browser.get("/owner/guns/not-a-uuid").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_gun_form_is_re_rendered_with_errors() {
    let app = spawn_app().await;
    app.create_user("owner@armory.test", Some("owner")).await;
    let mut browser = app.login_as("owner@armory.test").await;
    browser.get("/owner/guns/new").await;

    let response = browser
        .post_form("/owner/guns", &[("name", ""), ("acquired_on", "yesterday")])
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body.contains("This field is required."));
    assert!(response.body.contains("Use the format YYYY-MM-DD."));
}

#[tokio::test]
async fn dangling_reference_is_a_field_error() {
    let app = spawn_app().await;
    app.create_user("owner@armory.test", Some("owner")).await;
    let mut browser = app.login_as("owner@armory.test").await;
    browser.get("/owner/guns/new").await;

    let response = browser
        .post_form("/owner/guns", &[("name", "Mystery"), ("manufacturer_id", "999")])
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body.contains("The selected manufacturer no longer exists."));
}

#[tokio::test]
async fn free_plan_gun_limit_is_enforced() {
    let app = spawn_app().await;
    let owner = app.create_user("owner@armory.test", Some("owner")).await;
    for n in 0..10 {
        app.repo.create_gun(owner, gun(&format!("Gun {n}"))).await.unwrap();
    }
    let mut browser = app.login_as("owner@armory.test").await;
    browser.get("/owner/guns/new").await;

    let response = browser.post_form("/owner/guns", &[("name", "One too many")]).await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body.contains("Your plan allows up to 10 guns"));
    assert_eq!(app.repo.count_guns(owner).await.unwrap(), 10);
}

#[tokio::test]
async fn gun_list_paginates() {
    let app = spawn_app().await;
    let owner = app.create_user("owner@armory.test", Some("owner")).await;
    for n in 1..=23 {
        app.repo.create_gun(owner, gun(&format!("Gun {n:02}"))).await.unwrap();
    }
    let mut browser = app.login_as("owner@armory.test").await;

    let last = browser.get("/owner/guns?page=3&per_page=10").await;
    assert_eq!(last.status, StatusCode::OK);
    assert!(last.body.contains("Showing 21 to 23 of 23"));
    assert!(last.body.contains("rel=\"prev\""));
    assert!(!last.body.contains("rel=\"next\""));
    // Newest first: the oldest three are on the last page.
    assert!(last.body.contains("Gun 01"));
    assert!(!last.body.contains("Gun 23"));
}

#[tokio::test]
async fn out_of_range_page_number_renders_an_empty_page() {
    let app = spawn_app().await;
    let owner = app.create_user("owner@armory.test", Some("owner")).await;
    for n in 1..=3 {
        app.repo.create_gun(owner, gun(&format!("Gun {n:02}"))).await.unwrap();
    }
    let mut browser = app.login_as("owner@armory.test").await;

    let page = browser.get("/owner/guns?page=9223372036854775807&per_page=10").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(!page.body.contains("Gun 01"));
    assert!(page.body.contains(" to 3 of 3"));
}

#[tokio::test]
async fn munitions_require_the_ammunition_permission() {
    let app = spawn_app().await;
    app.create_user("owner@armory.test", Some("owner")).await;
    app.create_user("roleless@armory.test", None).await;

    let mut owner = app.login_as("owner@armory.test").await;
    assert_eq!(owner.get("/owner/munitions").await.status, StatusCode::OK);

    let mut roleless = app.login_as("roleless@armory.test").await;
    assert_eq!(roleless.get("/owner/guns").await.status, StatusCode::OK);
    assert_eq!(roleless.get("/owner/munitions").await.status, StatusCode::FORBIDDEN);
    roleless.get("/owner").await;
    let response = roleless.post_form("/owner/munitions", &[("name", "9mm FMJ")]).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn ammunition_round_trip_through_the_forms() {
    let app = spawn_app().await;
    let owner = app.create_user("owner@armory.test", Some("owner")).await;
    let caliber = app
        .repo
        .create_reference(
            ReferenceKind::Caliber,
            ReferenceInput { name: "9mm".to_string(), detail: Some("Parabellum".to_string()) },
        )
        .await
        .unwrap();
    let mut browser = app.login_as("owner@armory.test").await;
    browser.get("/owner/munitions/new").await;

    let caliber_id = caliber.id.to_string();
    let created = browser
        .post_form(
            "/owner/munitions",
            &[("name", "Range box"), ("caliber_id", caliber_id.as_str()), ("quantity", "50")],
        )
        .await;
    assert_eq!(created.status, StatusCode::SEE_OTHER);
    let location = created.location.unwrap();

    let detail = browser.get(&location).await;
    assert!(detail.body.contains("Range box"));
    assert!(detail.body.contains("9mm"));

    let updated = browser
        .post_form(&location, &[("name", "Range box"), ("quantity", "-1")])
        .await;
    assert_eq!(updated.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.repo.count_ammunition(owner).await.unwrap(), 1);
}

#[tokio::test]
async fn dashboard_ammunition_panel_follows_its_flag() {
    let app = spawn_app().await;
    let owner = app.create_user("owner@armory.test", Some("owner")).await;
    app.repo
        .create_ammunition(
            owner,
            virtual_armory::models::AmmunitionInput {
                name: "Panel marker".to_string(),
                quantity: 20,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let flag = app
        .repo
        .create_feature_flag(FeatureFlagInput {
            name: "ammo_dashboard".to_string(),
            ..FeatureFlagInput::default()
        })
        .await
        .unwrap();
    let mut browser = app.login_as("owner@armory.test").await;

    let hidden = browser.get("/owner").await;
    assert!(!hidden.body.contains("Panel marker"));

    app.repo.set_feature_flag_enabled(flag.id, true).await.unwrap();
    let shown = browser.get("/owner").await;
    assert!(shown.body.contains("Panel marker"));
}

#[tokio::test]
async fn pricing_shows_promotions_only_with_the_banner_flag() {
    let app = spawn_app().await;
    let today = Utc::now().date_naive();
    app.repo
        .create_promotion(PromotionInput {
            name: "Spring sale".to_string(),
            description: "Save on premium".to_string(),
            promo_type: "discount".to_string(),
            discount_percent: 20,
            benefit_days: 0,
            starts_on: today - chrono::Duration::days(1),
            ends_on: today + chrono::Duration::days(1),
            active: true,
        })
        .await
        .unwrap();
    let flag = app
        .repo
        .create_feature_flag(FeatureFlagInput {
            name: "promotions_banner".to_string(),
            ..FeatureFlagInput::default()
        })
        .await
        .unwrap();

    let mut browser = app.browser();
    let without = browser.get("/pricing").await;
    assert_eq!(without.status, StatusCode::OK);
    assert!(without.body.contains("Premium"));
    assert!(!without.body.contains("Spring sale"));

    app.repo.set_feature_flag_enabled(flag.id, true).await.unwrap();
    let with = browser.get("/pricing").await;
    assert!(with.body.contains("Spring sale"));
}

#[tokio::test]
async fn profile_and_subscription_pages() {
    let app = spawn_app().await;
    let owner = app.create_user("owner@armory.test", Some("owner")).await;
    app.repo.set_subscription(owner, "premium", None).await.unwrap();
    let mut browser = app.login_as("owner@armory.test").await;

    browser.get("/owner/profile").await;
    let renamed = browser.post_form("/owner/profile", &[("name", "Renamed")]).await;
    assert_eq!(renamed.status, StatusCode::SEE_OTHER);
    assert_eq!(app.repo.get_user(owner).await.unwrap().unwrap().name, "Renamed");

    let page = browser.get("/owner/subscription").await;
    assert!(page.body.contains("Premium"));
    let cancelled = browser.post_form("/owner/subscription/cancel", &[]).await;
    assert_eq!(cancelled.status, StatusCode::SEE_OTHER);
    let user = app.repo.get_user(owner).await.unwrap().unwrap();
    assert_eq!(user.subscription_tier, "free");
}

#[tokio::test]
async fn contact_form_stores_the_message() {
    let app = spawn_app().await;
    let mut browser = app.browser();
    browser.get("/contact").await;
    let response = browser
        .post_form(
            "/contact",
            &[("name", "Visitor"), ("email", "visitor@example.com"), ("message", "Hello there")],
        )
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(app.repo.admin_stats().await.unwrap().contact_messages, 1);
}
