use serial_test::serial;
use std::{env, panic};
use virtual_armory::{AppConfig, config::Env};

const VARS: [&str; 9] = [
    "APP_ENV",
    "DATABASE_URL",
    "BIND_ADDR",
    "POLICY_FILE",
    "SESSION_TTL_MINUTES",
    "RATE_LIMIT_PER_MINUTE",
    "DEFAULT_ROLE",
    "ADMIN_EMAIL",
    "ADMIN_PASSWORD",
];

// --- Setup/Teardown Utilities ---

/// Runs `test` with a clean slate for every config variable, then restores
/// whatever was set before.
fn run_with_env<T, R>(vars: &[(&str, &str)], test: T) -> R
where
    T: FnOnce() -> R + panic::UnwindSafe,
{
    let originals: Vec<(&str, Option<String>)> =
        VARS.iter().map(|&var| (var, env::var(var).ok())).collect();

    unsafe {
        for var in VARS {
            env::remove_var(var);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }
    }

    let result = panic::catch_unwind(test);

    for (key, original) in originals {
        unsafe {
            match original {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
        }
    }

    match result {
        Ok(value) => value,
        Err(e) => panic::resume_unwind(e),
    }
}

// --- Tests ---

#[test]
#[serial]
fn local_defaults_need_no_variables() {
    let config = run_with_env(&[], AppConfig::load).unwrap();
    assert_eq!(config.env, Env::Local);
    assert!(config.db_url.is_none());
    assert!(config.policy_file.is_none());
    assert_eq!(config.bind_addr, "0.0.0.0:3000");
    assert_eq!(config.session_ttl_minutes, 720);
    assert_eq!(config.rate_limit_per_minute, 120);
    assert_eq!(config.default_role, "owner");
}

#[test]
#[serial]
fn production_requires_a_database() {
    let result = run_with_env(&[("APP_ENV", "production")], AppConfig::load);
    assert!(result.is_err());

    let config = run_with_env(
        &[("APP_ENV", "production"), ("DATABASE_URL", "postgres://u:p@db/armory")],
        AppConfig::load,
    )
    .unwrap();
    assert!(config.env.is_production());
}

#[test]
#[serial]
fn numeric_settings_must_parse() {
    let result = run_with_env(&[("RATE_LIMIT_PER_MINUTE", "lots")], AppConfig::load);
    assert!(result.is_err());

    let config = run_with_env(
        &[("RATE_LIMIT_PER_MINUTE", "30"), ("SESSION_TTL_MINUTES", "15")],
        AppConfig::load,
    )
    .unwrap();
    assert_eq!(config.rate_limit_per_minute, 30);
    assert_eq!(config.session_ttl_minutes, 15);
}

#[test]
#[serial]
fn admin_credentials_come_in_pairs() {
    let result = run_with_env(&[("ADMIN_EMAIL", "root@armory.test")], AppConfig::load);
    assert!(result.is_err());

    let config = run_with_env(
        &[("ADMIN_EMAIL", "root@armory.test"), ("ADMIN_PASSWORD", "s3cret-pass")],
        AppConfig::load,
    )
    .unwrap();
    assert_eq!(config.admin_email.as_deref(), Some("root@armory.test"));
    assert_eq!(config.policy_file, None);
}
