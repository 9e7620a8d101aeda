use quiz_poll_bot::config::{Config, DispatchSettings};
use std::env;
use std::sync::Mutex;

// Mutex to ensure config tests run sequentially to avoid environment variable conflicts
static CONFIG_TEST_MUTEX: Mutex<()> = Mutex::new(());

const ALL_VARS: &[&str] = &[
    "TELEGRAM_BOT_TOKEN",
    "TELEGRAM_TOKEN",
    "OWNER_ID",
    "DATABASE_URL",
    "HTTP_PORT",
    "PORT",
    "POLL_DURATION_SECONDS",
    "INTER_POLL_DELAY_SECONDS",
    "DISPATCH_MAX_RETRIES",
    "DISPATCH_RETRY_BACKOFF_MS",
    "BROADCAST_CONCURRENCY",
];

fn clear_env() {
    for key in ALL_VARS {
        env::remove_var(key);
    }
}

#[test]
fn test_config_from_env_with_all_vars() {
    let _guard = CONFIG_TEST_MUTEX.lock().unwrap();
    clear_env();

    env::set_var("TELEGRAM_BOT_TOKEN", "test_token_123");
    env::set_var("OWNER_ID", "424242");
    env::set_var("DATABASE_URL", "sqlite:test.db");
    env::set_var("HTTP_PORT", "8080");
    env::set_var("POLL_DURATION_SECONDS", "30");
    env::set_var("INTER_POLL_DELAY_SECONDS", "5");
    env::set_var("DISPATCH_MAX_RETRIES", "1");
    env::set_var("DISPATCH_RETRY_BACKOFF_MS", "250");
    env::set_var("BROADCAST_CONCURRENCY", "4");

    let config = Config::from_env().unwrap();

    assert_eq!(config.telegram_bot_token, "test_token_123");
    assert_eq!(config.owner_id, Some(424242));
    assert_eq!(config.database_url, "sqlite:test.db");
    assert_eq!(config.http_port, 8080);
    assert_eq!(
        config.dispatch,
        DispatchSettings {
            poll_duration_seconds: 30,
            inter_poll_delay_seconds: 5,
            max_retries: 1,
            retry_backoff_ms: 250,
        }
    );
    assert_eq!(config.broadcast_concurrency, 4);

    clear_env();
}

#[test]
fn test_config_from_env_with_defaults() {
    let _guard = CONFIG_TEST_MUTEX.lock().unwrap();
    clear_env();

    env::set_var("TELEGRAM_BOT_TOKEN", "required_token");

    let config = Config::from_env().unwrap();

    assert_eq!(config.telegram_bot_token, "required_token");
    assert_eq!(config.owner_id, None);
    assert_eq!(config.database_url, "sqlite:./data/quizbot.db");
    assert_eq!(config.http_port, 10000);
    assert_eq!(config.dispatch, DispatchSettings::default());
    assert_eq!(config.broadcast_concurrency, 8);

    clear_env();
}

#[test]
fn test_config_fallback_variable_names() {
    let _guard = CONFIG_TEST_MUTEX.lock().unwrap();
    clear_env();

    env::set_var("TELEGRAM_TOKEN", "legacy_token");
    env::set_var("PORT", "9090");

    let config = Config::from_env().unwrap();
    assert_eq!(config.telegram_bot_token, "legacy_token");
    assert_eq!(config.http_port, 9090);

    clear_env();
}

#[test]
fn test_config_missing_required_token() {
    let _guard = CONFIG_TEST_MUTEX.lock().unwrap();
    clear_env();

    let result = Config::from_env();
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("TELEGRAM_BOT_TOKEN must be set"));
}

#[test]
fn test_config_invalid_values() {
    let _guard = CONFIG_TEST_MUTEX.lock().unwrap();
    clear_env();
    env::set_var("TELEGRAM_BOT_TOKEN", "token");

    env::set_var("HTTP_PORT", "invalid_port");
    assert!(Config::from_env().unwrap_err().to_string().contains("Invalid HTTP_PORT"));
    env::remove_var("HTTP_PORT");

    env::set_var("OWNER_ID", "@alice");
    assert!(Config::from_env().unwrap_err().to_string().contains("Invalid OWNER_ID"));
    env::remove_var("OWNER_ID");

    env::set_var("POLL_DURATION_SECONDS", "3");
    assert!(Config::from_env().unwrap_err().to_string().contains("between 5 and 600"));
    env::set_var("POLL_DURATION_SECONDS", "ten");
    assert!(Config::from_env().unwrap_err().to_string().contains("Invalid POLL_DURATION_SECONDS"));
    env::remove_var("POLL_DURATION_SECONDS");

    env::set_var("BROADCAST_CONCURRENCY", "0");
    assert!(Config::from_env().is_err());

    clear_env();
}
