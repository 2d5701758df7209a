//! Shared harness for the router tests: an in-memory application and a tiny
//! cookie-carrying client that drives it with `oneshot`.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use tower::util::ServiceExt;
use uuid::Uuid;
use virtual_armory::{
    AppConfig, AppState, InMemoryRepository, PolicyHandle, PolicySource, RepositoryState,
    auth::hash_password, bootstrap, create_router, metrics::ErrorMetrics, models::NewUser,
};

pub const ADMIN_EMAIL: &str = "admin@armory.test";
pub const PASSWORD: &str = "correct horse battery";

pub struct TestApp {
    pub router: Router,
    pub repo: RepositoryState,
    pub policy: PolicyHandle,
    pub metrics: ErrorMetrics,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        admin_email: Some(ADMIN_EMAIL.to_string()),
        admin_password: Some(PASSWORD.to_string()),
        ..AppConfig::default()
    }
}

/// A seeded application: default policy plus the bootstrap administrator.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

pub async fn spawn_app_with(config: AppConfig) -> TestApp {
    let repo: RepositoryState = Arc::new(InMemoryRepository::new());
    bootstrap(&repo, &config).await.expect("bootstrap failed");
    let policy = PolicyHandle::load(PolicySource::Repository, repo.clone()).await;
    build(repo, policy, config)
}

pub fn build(repo: RepositoryState, policy: PolicyHandle, config: AppConfig) -> TestApp {
    let state = AppState::new(repo.clone(), policy.clone(), config);
    let metrics = state.metrics.clone();
    let router = create_router(state);
    TestApp { router, repo, policy, metrics }
}

impl TestApp {
    /// Creates an account directly in storage, optionally with a role.
    pub async fn create_user(&self, email: &str, role: Option<&str>) -> Uuid {
        let user = self
            .repo
            .create_user(NewUser {
                email: email.to_string(),
                name: email.split('@').next().unwrap_or("user").to_string(),
                password_hash: hash_password(PASSWORD).unwrap(),
            })
            .await
            .unwrap();
        if let Some(role) = role {
            self.repo.assign_role(&user.id.to_string(), role).await.unwrap();
            self.policy.reload_policy().await.unwrap();
        }
        user.id
    }

    pub fn browser(&self) -> Browser {
        Browser { router: self.router.clone(), cookie: None, csrf: String::new() }
    }

    /// A browser already logged in as `email`.
    pub async fn login_as(&self, email: &str) -> Browser {
        let mut browser = self.browser();
        let response = browser.login(email, PASSWORD).await;
        assert_eq!(response.status, StatusCode::SEE_OTHER, "login failed: {}", response.body);
        browser
    }
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

/// Browser
///
/// Keeps the session cookie and the last CSRF token seen in a page, the way
/// a real browser would between requests.
pub struct Browser {
    router: Router,
    cookie: Option<String>,
    pub csrf: String,
}

impl Browser {
    pub async fn get(&mut self, path: &str) -> TestResponse {
        let request = self.request("GET", path).body(Body::empty()).unwrap();
        self.send(request).await
    }

    /// Posts a urlencoded form. The current CSRF token is added automatically.
    pub async fn post_form(&mut self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        if self.csrf.is_empty() {
            self.get("/").await;
        }
        let csrf = self.csrf.clone();
        let mut all: Vec<(&str, &str)> = fields.to_vec();
        all.push(("csrf_token", csrf.as_str()));
        self.post_raw(path, &all).await
    }

    /// Posts exactly `fields`, without adding a token.
    pub async fn post_raw(&mut self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = fields
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let request = self
            .request("POST", path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    pub async fn login(&mut self, email: &str, password: &str) -> TestResponse {
        self.get("/login").await;
        self.post_form("/login", &[("email", email), ("password", password)]).await
    }

    fn request(&self, method: &str, path: &str) -> axum::http::request::Builder {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder
    }

    async fn send(&mut self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        if let Some(set_cookie) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
        {
            let pair = set_cookie.split(';').next().unwrap_or_default().to_string();
            self.cookie = Some(pair);
        }
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8_lossy(&bytes).to_string();
        if let Some(token) = extract_csrf(&body) {
            self.csrf = token;
        }
        TestResponse { status, location, body }
    }
}

fn extract_csrf(body: &str) -> Option<String> {
    let marker = r#"name="csrf-token" content=""#;
    let start = body.find(marker)? + marker.len();
    let end = body[start..].find('"')?;
    Some(body[start..start + end].to_string())
}
