use anyhow::{anyhow, Result};
use std::env;
use std::time::Duration;

const DEFAULT_DATABASE_URL: &str = "sqlite:./data/quizbot.db";
const DEFAULT_HTTP_PORT: u16 = 10000;

/// Timing and retry policy for a single quiz dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// How long each poll stays open. Telegram accepts 5..=600 seconds.
    pub poll_duration_seconds: u16,
    /// Pause between closing one poll and sending the next one.
    pub inter_poll_delay_seconds: u16,
    /// Retries for a single failed send/stop before the sequence is aborted.
    pub max_retries: u32,
    /// Base of the exponential backoff between retries.
    pub retry_backoff_ms: u64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            poll_duration_seconds: 10,
            inter_poll_delay_seconds: 2,
            max_retries: 3,
            retry_backoff_ms: 500,
        }
    }
}

impl DispatchSettings {
    pub fn poll_window(&self) -> Duration {
        Duration::from_secs(u64::from(self.poll_duration_seconds))
    }

    pub fn inter_poll_delay(&self) -> Duration {
        Duration::from_secs(u64::from(self.inter_poll_delay_seconds))
    }

    /// Backoff before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub owner_id: Option<i64>,
    pub database_url: String,
    pub http_port: u16,
    pub dispatch: DispatchSettings,
    pub broadcast_concurrency: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let token = env::var("TELEGRAM_BOT_TOKEN")
            .or_else(|_| env::var("TELEGRAM_TOKEN"))
            .map_err(|_| anyhow!("TELEGRAM_BOT_TOKEN must be set"))?;

        if token.trim().is_empty() {
            return Err(anyhow!("TELEGRAM_BOT_TOKEN must be set"));
        }

        let owner_id = match non_empty_var("OWNER_ID") {
            Some(raw) => Some(
                raw.trim()
                    .parse()
                    .map_err(|_| anyhow!("Invalid OWNER_ID: expected a numeric Telegram user id"))?,
            ),
            None => None,
        };

        let database_url = Self::database_url_from_env();

        let http_port = match non_empty_var("HTTP_PORT").or_else(|| non_empty_var("PORT")) {
            Some(raw) => raw.trim().parse().map_err(|_| anyhow!("Invalid HTTP_PORT"))?,
            None => DEFAULT_HTTP_PORT,
        };

        let defaults = DispatchSettings::default();
        let dispatch = DispatchSettings {
            poll_duration_seconds: parse_or("POLL_DURATION_SECONDS", defaults.poll_duration_seconds)?,
            inter_poll_delay_seconds: parse_or(
                "INTER_POLL_DELAY_SECONDS",
                defaults.inter_poll_delay_seconds,
            )?,
            max_retries: parse_or("DISPATCH_MAX_RETRIES", defaults.max_retries)?,
            retry_backoff_ms: parse_or("DISPATCH_RETRY_BACKOFF_MS", defaults.retry_backoff_ms)?,
        };

        if !(5..=600).contains(&dispatch.poll_duration_seconds) {
            return Err(anyhow!(
                "POLL_DURATION_SECONDS must be between 5 and 600, got {}",
                dispatch.poll_duration_seconds
            ));
        }

        let broadcast_concurrency: usize = parse_or("BROADCAST_CONCURRENCY", 8)?;
        if broadcast_concurrency == 0 {
            return Err(anyhow!("BROADCAST_CONCURRENCY must be at least 1"));
        }

        Ok(Config {
            telegram_bot_token: token,
            owner_id,
            database_url,
            http_port,
            dispatch,
            broadcast_concurrency,
        })
    }

    /// `DATABASE_URL` or the default SQLite file. Needs no bot token.
    pub fn database_url_from_env() -> String {
        non_empty_var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string())
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match non_empty_var(key) {
        Some(raw) => raw.trim().parse().map_err(|_| anyhow!("Invalid {key}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let settings = DispatchSettings {
            retry_backoff_ms: 100,
            ..DispatchSettings::default()
        };
        assert_eq!(settings.backoff(1), Duration::from_millis(100));
        assert_eq!(settings.backoff(2), Duration::from_millis(200));
        assert_eq!(settings.backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn test_default_window_is_ten_seconds() {
        assert_eq!(DispatchSettings::default().poll_window(), Duration::from_secs(10));
    }
}
