mod common;

use axum::http::StatusCode;
use common::{ADMIN_EMAIL, build, spawn_app, test_config};
use virtual_armory::{
    PolicyHandle, PolicySource,
    models::{PolicyRule, ReferenceKind},
};

#[tokio::test]
async fn anonymous_admin_request_redirects_to_login() {
    let app = spawn_app().await;
    let response = app.browser().get("/admin/dashboard").await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert!(response.location.unwrap().starts_with("/login"));
}

#[tokio::test]
async fn admin_prefix_redirects_to_the_dashboard() {
    let app = spawn_app().await;
    let mut admin = app.login_as(ADMIN_EMAIL).await;
    let response = admin.get("/admin").await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/admin/dashboard"));
    assert_eq!(admin.get("/admin/dashboard").await.status, StatusCode::OK);
}

#[tokio::test]
async fn admin_nav_link_follows_the_policy() {
    let app = spawn_app().await;
    app.create_user("owner@armory.test", Some("owner")).await;
    app.create_user("viewer@armory.test", Some("viewer")).await;
    app.create_user("marketing@armory.test", Some("marketing")).await;

    let link = r#"href="/admin/dashboard""#;
    let mut owner = app.login_as("owner@armory.test").await;
    assert!(!owner.get("/owner").await.body.contains(link));
    let mut marketing = app.login_as("marketing@armory.test").await;
    assert!(!marketing.get("/owner").await.body.contains(link));
    let mut viewer = app.login_as("viewer@armory.test").await;
    assert!(viewer.get("/owner").await.body.contains(link));
    let mut admin = app.login_as(ADMIN_EMAIL).await;
    assert!(admin.get("/owner").await.body.contains(link));
}

#[tokio::test]
async fn viewer_is_forbidden_from_feature_flags() {
    let app = spawn_app().await;
    app.create_user("viewer@armory.test", Some("viewer")).await;
    let mut viewer = app.login_as("viewer@armory.test").await;

    // The viewer role grants the dashboard and nothing else.
    assert_eq!(viewer.get("/admin/dashboard").await.status, StatusCode::OK);
    let response = viewer.get("/admin/permissions/feature-flags").await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert!(response.body.contains("403: Access denied"));
}

#[tokio::test]
async fn new_feature_flags_start_disabled() {
    let app = spawn_app().await;
    let mut admin = app.login_as(ADMIN_EMAIL).await;
    admin.get("/admin/permissions/feature-flags/new").await;

    let response = admin
        .post_form(
            "/admin/permissions/feature-flags",
            &[
                ("name", "new_ammo_feature"),
                ("description", "Ammo beta"),
                ("roles", "owner, viewer"),
                ("enabled", "on"),
            ],
        )
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/admin/permissions/feature-flags"));

    let flags = app.repo.list_feature_flags().await.unwrap();
    let flag = flags.iter().find(|f| f.name == "new_ammo_feature").unwrap();
    assert!(!flag.enabled);
    assert_eq!(flag.roles, vec!["owner".to_string(), "viewer".to_string()]);

    let toggled = admin
        .post_form(&format!("/admin/permissions/feature-flags/{}/toggle", flag.id), &[])
        .await;
    assert_eq!(toggled.status, StatusCode::SEE_OTHER);
    assert!(app.repo.get_feature_flag(flag.id).await.unwrap().unwrap().enabled);
}

#[tokio::test]
async fn invalid_flag_name_is_rejected() {
    let app = spawn_app().await;
    let mut admin = app.login_as(ADMIN_EMAIL).await;
    admin.get("/admin/permissions/feature-flags/new").await;
    let response = admin
        .post_form("/admin/permissions/feature-flags", &[("name", "Not Valid!")])
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(app.repo.list_feature_flags().await.unwrap().is_empty());
}

#[tokio::test]
async fn reference_crud_with_unique_names() {
    let app = spawn_app().await;
    let mut admin = app.login_as(ADMIN_EMAIL).await;
    admin.get("/admin/manufacturers/new").await;

    let created = admin
        .post_form("/admin/manufacturers", &[("name", "Colt"), ("detail", "USA")])
        .await;
    assert_eq!(created.status, StatusCode::SEE_OTHER);
    assert_eq!(created.location.as_deref(), Some("/admin/manufacturers"));

    let duplicate = admin.post_form("/admin/manufacturers", &[("name", "Colt")]).await;
    assert_eq!(duplicate.status, StatusCode::UNPROCESSABLE_ENTITY);

    // Same name in another table is fine.
    let other = admin.post_form("/admin/weapon-types", &[("name", "Colt")]).await;
    assert_eq!(other.status, StatusCode::SEE_OTHER);

    let items = app.repo.all_reference(ReferenceKind::Manufacturer).await.unwrap();
    assert_eq!(items.len(), 1);
    let list = admin.get("/admin/manufacturers").await;
    assert!(list.body.contains("Colt"));
    assert!(list.body.contains("USA"));

    let deleted = admin
        .post_form(&format!("/admin/manufacturers/{}/delete", items[0].id), &[])
        .await;
    assert_eq!(deleted.status, StatusCode::SEE_OTHER);
    assert!(app.repo.all_reference(ReferenceKind::Manufacturer).await.unwrap().is_empty());
}

#[tokio::test]
async fn promotion_dates_are_validated() {
    let app = spawn_app().await;
    let mut admin = app.login_as(ADMIN_EMAIL).await;
    admin.get("/admin/promotions/new").await;

    let response = admin
        .post_form(
            "/admin/promotions",
            &[
                ("name", "Backwards"),
                ("promo_type", "discount"),
                ("discount_percent", "10"),
                ("starts_on", "2026-05-10"),
                ("ends_on", "2026-05-01"),
            ],
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body.contains("End date must not be before the start date."));

    let ok = admin
        .post_form(
            "/admin/promotions",
            &[
                ("name", "Summer"),
                ("promo_type", "free_trial"),
                ("benefit_days", "14"),
                ("starts_on", "2026-06-01"),
                ("ends_on", "2026-08-31"),
                ("active", "on"),
            ],
        )
        .await;
    assert_eq!(ok.status, StatusCode::SEE_OTHER);
    assert_eq!(app.repo.count_promotions().await.unwrap(), 1);
}

#[tokio::test]
async fn policy_changes_apply_without_relogin() {
    let app = spawn_app().await;
    let viewer = app.create_user("viewer@armory.test", Some("viewer")).await;
    let mut viewer_browser = app.login_as("viewer@armory.test").await;
    assert_eq!(viewer_browser.get("/admin/promotions").await.status, StatusCode::FORBIDDEN);

    let mut admin = app.login_as(ADMIN_EMAIL).await;
    admin.get("/admin/permissions").await;
    let added = admin
        .post_form(
            "/admin/permissions/policies",
            &[("role", "marketing"), ("resource", "promotions"), ("action", "read")],
        )
        .await;
    assert_eq!(added.status, StatusCode::SEE_OTHER);

    let assigned = admin
        .post_form(&format!("/admin/users/{viewer}/roles"), &[("role", "marketing")])
        .await;
    assert_eq!(assigned.status, StatusCode::SEE_OTHER);

    assert_eq!(viewer_browser.get("/admin/promotions").await.status, StatusCode::OK);
    // Read access does not extend to writes.
    let write = viewer_browser
        .post_form("/admin/promotions", &[("name", "Sneaky")])
        .await;
    assert_eq!(write.status, StatusCode::FORBIDDEN);

    let removed = admin
        .post_form(&format!("/admin/users/{viewer}/roles/remove"), &[("role", "marketing")])
        .await;
    assert_eq!(removed.status, StatusCode::SEE_OTHER);
    assert_eq!(viewer_browser.get("/admin/promotions").await.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn scoped_user_managers_cannot_touch_the_superuser_role() {
    let app = spawn_app().await;
    for action in ["read", "write"] {
        app.repo
            .add_policy_rule(PolicyRule::new("user_manager", "users", action))
            .await
            .unwrap();
    }
    let manager = app.create_user("manager@armory.test", Some("user_manager")).await;
    let owner = app.create_user("owner@armory.test", Some("owner")).await;
    let admin_id = app.repo.find_user_by_email(ADMIN_EMAIL).await.unwrap().unwrap().id;
    let mut browser = app.login_as("manager@armory.test").await;

    let self_grant = browser
        .post_form(&format!("/admin/users/{manager}/roles"), &[("role", "admin")])
        .await;
    assert_eq!(self_grant.status, StatusCode::FORBIDDEN);
    assert!(!app.policy.get_user_roles(&manager.to_string()).await.contains("admin"));

    let revoke = browser
        .post_form(&format!("/admin/users/{admin_id}/roles/remove"), &[("role", "admin")])
        .await;
    assert_eq!(revoke.status, StatusCode::FORBIDDEN);
    assert!(app.policy.get_user_roles(&admin_id.to_string()).await.contains("admin"));

    let ordinary = browser
        .post_form(&format!("/admin/users/{owner}/roles"), &[("role", "viewer")])
        .await;
    assert_eq!(ordinary.status, StatusCode::SEE_OTHER);
    assert!(app.policy.get_user_roles(&owner.to_string()).await.contains("viewer"));
}

#[tokio::test]
async fn degraded_policy_denies_even_the_superuser() {
    let seeded = spawn_app().await;
    let degraded = PolicyHandle::degraded(PolicySource::Repository, seeded.repo.clone());
    let app = build(seeded.repo.clone(), degraded, test_config());

    let mut admin = app.login_as(ADMIN_EMAIL).await;
    // Public and login-only pages keep working.
    assert_eq!(admin.get("/").await.status, StatusCode::OK);
    assert_eq!(admin.get("/owner/guns").await.status, StatusCode::OK);
    assert_eq!(admin.get("/admin/dashboard").await.status, StatusCode::FORBIDDEN);

    app.policy.reload_policy().await.unwrap();
    assert_eq!(admin.get("/admin/dashboard").await.status, StatusCode::OK);
}

#[tokio::test]
async fn file_policy_is_read_only_in_the_ui() {
    let seeded = spawn_app().await;
    let admin_user = seeded
        .repo
        .find_user_by_email(ADMIN_EMAIL)
        .await
        .unwrap()
        .unwrap();
    let dir = std::env::temp_dir().join(format!("armory-policy-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("policy.csv");
    std::fs::write(
        &path,
        format!("p, owner, ammunition, read\ng, {}, admin\n", admin_user.id),
    )
    .unwrap();

    let policy = PolicyHandle::load(PolicySource::File(path), seeded.repo.clone()).await;
    let app = build(seeded.repo.clone(), policy, test_config());
    let mut admin = app.login_as(ADMIN_EMAIL).await;

    let page = admin.get("/admin/permissions").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("read-only"));

    let response = admin
        .post_form(
            "/admin/permissions/policies",
            &[("role", "viewer"), ("resource", "users"), ("action", "read")],
        )
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(app.policy.policies().await.len(), 1);
    std::fs::remove_dir_all(dir).ok();
}

#[tokio::test]
async fn error_metrics_record_failures() {
    let app = spawn_app().await;
    let mut admin = app.login_as(ADMIN_EMAIL).await;
    admin.get("/definitely-missing").await;
    admin.get("/scan/wp-login.php").await;
    admin.get("/scan/.env").await;

    let page = admin.get("/admin/error-metrics").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("(unmatched)"));
    assert!(!page.body.contains("/definitely-missing"));
    assert!(!page.body.contains("wp-login"));

    let rows = app.metrics.snapshot();
    let unmatched: Vec<_> = rows.iter().filter(|row| row.status == 404).collect();
    assert_eq!(unmatched.len(), 1);
    assert_eq!(unmatched[0].count, 3);
}

#[tokio::test]
async fn users_list_and_detail() {
    let app = spawn_app().await;
    let owner = app.create_user("owner@armory.test", Some("owner")).await;
    let mut admin = app.login_as(ADMIN_EMAIL).await;

    let list = admin.get("/admin/users").await;
    assert!(list.body.contains("owner@armory.test"));
    assert!(list.body.contains(ADMIN_EMAIL));

    let detail = admin.get(&format!("/admin/users/{owner}")).await;
    assert_eq!(detail.status, StatusCode::OK);
    assert!(detail.body.contains("owner@armory.test"));
    assert_eq!(admin.get(&format!("/admin/users/{}", uuid::Uuid::new_v4())).await.status, StatusCode::NOT_FOUND);
}
