use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup and
/// shared read-only through `AppState` (pulled into handlers via `FromRef`).
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and cookie security.
    pub env: Env,
    // Postgres connection string. `None` selects the in-memory repository (local only).
    pub db_url: Option<String>,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // Casbin CSV policy file. `None` selects the database-backed policy tables.
    pub policy_file: Option<PathBuf>,
    // Session inactivity expiry.
    pub session_ttl_minutes: i64,
    // Requests allowed per client per minute before a 429 is returned.
    pub rate_limit_per_minute: u32,
    // Role granted to every newly registered account.
    pub default_role: String,
    // Optional bootstrap administrator created at startup if missing.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

/// Env
///
/// Runtime context. `Local` allows running without a database and prints
/// human-readable logs; `Production` demands a database and emits JSON logs.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Env {
    pub fn is_production(self) -> bool {
        self == Env::Production
    }
}

impl Default for AppConfig {
    /// default
    ///
    /// A non-failing configuration for tests: local mode, in-memory storage,
    /// database-backed policy, generous rate limit.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            bind_addr: "127.0.0.1:3000".to_string(),
            policy_file: None,
            session_ttl_minutes: 720,
            rate_limit_per_minute: 10_000,
            default_role: "owner".to_string(),
            admin_email: None,
            admin_password: None,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every setting from the environment. Production refuses to start
    /// without `DATABASE_URL`; numeric settings must parse.
    pub fn load() -> Result<Self, AppError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let db_url = non_empty_var("DATABASE_URL");
        if env.is_production() && db_url.is_none() {
            return Err(AppError::Config(
                "DATABASE_URL must be set in production".to_string(),
            ));
        }

        let admin_email = non_empty_var("ADMIN_EMAIL");
        let admin_password = non_empty_var("ADMIN_PASSWORD");
        if admin_email.is_some() != admin_password.is_some() {
            return Err(AppError::Config(
                "ADMIN_EMAIL and ADMIN_PASSWORD must be set together".to_string(),
            ));
        }

        Ok(Self {
            env,
            db_url,
            bind_addr: non_empty_var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            policy_file: non_empty_var("POLICY_FILE").map(PathBuf::from),
            session_ttl_minutes: parse_var("SESSION_TTL_MINUTES", 720)?,
            rate_limit_per_minute: parse_var("RATE_LIMIT_PER_MINUTE", 120)?,
            default_role: non_empty_var("DEFAULT_ROLE").unwrap_or_else(|| "owner".to_string()),
            admin_email,
            admin_password,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match non_empty_var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw}"))),
        None => Ok(default),
    }
}
