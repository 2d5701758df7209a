//! End-to-end tests over a real socket with a cookie-keeping HTTP client.

mod common;

use std::net::SocketAddr;

use reqwest::{StatusCode, redirect::Policy};
use tokio::net::TcpListener;

pub struct TestServer {
    pub address: String,
    pub app: common::TestApp,
}

async fn spawn_server() -> TestServer {
    let app = common::spawn_app().await;
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{port}");

    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });

    TestServer { address, app }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(Policy::none())
        .build()
        .unwrap()
}

fn csrf_from(body: &str) -> String {
    let marker = r#"name="csrf-token" content=""#;
    let start = body.find(marker).expect("page carries a csrf token") + marker.len();
    let end = body[start..].find('"').unwrap();
    body[start..start + end].to_string()
}

#[tokio::test]
async fn health_and_request_id() {
    let server = spawn_server().await;
    let response = client()
        .get(format!("{}/health", server.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn login_over_http_reaches_the_admin_area() {
    let server = spawn_server().await;
    let client = client();

    let page = client
        .get(format!("{}/login", server.address))
        .send()
        .await
        .unwrap();
    let session_cookie = page
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(session_cookie.starts_with("armory_session="));
    assert!(session_cookie.contains("HttpOnly"));
    let token = csrf_from(&page.text().await.unwrap());

    let login = client
        .post(format!("{}/login", server.address))
        .form(&[
            ("email", common::ADMIN_EMAIL),
            ("password", common::PASSWORD),
            ("csrf_token", token.as_str()),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(login.status(), StatusCode::SEE_OTHER);

    let dashboard = client
        .get(format!("{}/admin/dashboard", server.address))
        .send()
        .await
        .unwrap();
    assert_eq!(dashboard.status(), StatusCode::OK);
    assert!(dashboard.text().await.unwrap().contains("Administration"));
    assert!(server.app.policy.is_editable());
}
