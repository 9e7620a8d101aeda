use crate::database::connection::DatabaseManager;
use crate::database::models::{StatsEvent, StatsSummary, UserRecord};
use crate::error::StoreError;
use crate::quiz::dispatcher::UserIdentity;
use crate::utils::logging::{log_database_error, log_database_operation, log_timeout};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound for any single store call made on behalf of a user-facing flow.
pub const STORE_TIMEOUT: Duration = Duration::from_secs(3);
const LEADERBOARD_SIZE: i64 = 10;

/// User-keyed document store behind the stats recorder.
#[async_trait]
pub trait StatsStore: Send + Sync {
    async fn record(&self, user: &UserIdentity, event: StatsEvent) -> Result<(), StoreError>;
    async fn touch(&self, user: &UserIdentity) -> Result<(), StoreError>;
    async fn summary(&self, user_filter: Option<i64>) -> Result<StatsSummary, StoreError>;
    async fn user_ids(&self) -> Result<Vec<i64>, StoreError>;
    async fn ping(&self) -> Result<(), StoreError>;
}

#[async_trait]
impl StatsStore for DatabaseManager {
    async fn record(&self, user: &UserIdentity, event: StatsEvent) -> Result<(), StoreError> {
        UserRecord::record_event(&self.pool, user.id, user.username.as_deref(), event).await?;
        Ok(())
    }

    async fn touch(&self, user: &UserIdentity) -> Result<(), StoreError> {
        UserRecord::touch(&self.pool, user.id, user.username.as_deref()).await?;
        Ok(())
    }

    async fn summary(&self, user_filter: Option<i64>) -> Result<StatsSummary, StoreError> {
        let mut summary = UserRecord::summary(&self.pool, LEADERBOARD_SIZE).await?;
        if let Some(user_id) = user_filter {
            summary.user = UserRecord::find_by_id(&self.pool, user_id).await?;
        }
        Ok(summary)
    }

    async fn user_ids(&self) -> Result<Vec<i64>, StoreError> {
        Ok(UserRecord::all_ids(&self.pool).await?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(DatabaseManager::ping(self).await?)
    }
}

/// Records interaction events without ever failing the caller.
///
/// Store outages degrade statistics only: failures and timeouts are logged and
/// swallowed so poll delivery keeps going.
#[derive(Clone)]
pub struct StatsRecorder {
    store: Arc<dyn StatsStore>,
}

impl StatsRecorder {
    pub fn new(store: Arc<dyn StatsStore>) -> Self {
        Self { store }
    }

    pub async fn record(&self, user: &UserIdentity, event: StatsEvent) {
        let details = format!("user {} event {}", user.id, event.as_str());
        log_database_operation("UPSERT", "users", &details);
        if let Err(e) = bounded(self.store.record(user, event)).await {
            log_database_error("UPSERT", "users", &e.to_string(), &details);
        }
    }

    /// Records `events` in order on a separate task; the caller never waits on the store.
    pub fn record_detached(&self, user: &UserIdentity, events: &[StatsEvent]) {
        let recorder = self.clone();
        let user = user.clone();
        let events = events.to_vec();
        tokio::spawn(async move {
            for event in events {
                recorder.record(&user, event).await;
            }
        });
    }

    /// Records that the user talked to the bot.
    pub async fn touch(&self, user: &UserIdentity) {
        if let Err(e) = bounded(self.store.touch(user)).await {
            let details = format!("user {}", user.id);
            log_database_error("TOUCH", "users", &e.to_string(), &details);
        }
    }

    pub async fn summary(&self, user_filter: Option<i64>) -> Result<StatsSummary, StoreError> {
        bounded(self.store.summary(user_filter)).await
    }

    pub async fn user_ids(&self) -> Result<Vec<i64>, StoreError> {
        bounded(self.store.user_ids()).await
    }
}

/// Applies [`STORE_TIMEOUT`] to a store call.
pub async fn bounded<T, F>(call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(STORE_TIMEOUT, call).await {
        Ok(result) => result,
        Err(_) => {
            log_timeout("stats store call", STORE_TIMEOUT.as_secs());
            Err(StoreError::Timeout(STORE_TIMEOUT))
        }
    }
}
