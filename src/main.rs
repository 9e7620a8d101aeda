//! # Quiz Poll Bot Main Entry Point
//!
//! Initializes logging, loads configuration, sets up the database,
//! and runs the Telegram bot next to the health check server.

use anyhow::Result;
use quiz_poll_bot::bot::handlers::{AdminState, BotContext, BotHandler};
use quiz_poll_bot::bot::telegram::TelegramGateway;
use quiz_poll_bot::config::Config;
use quiz_poll_bot::database::connection::DatabaseManager;
use quiz_poll_bot::services::admin::AdminGate;
use quiz_poll_bot::services::health::{HealthProbe, HealthService};
use quiz_poll_bot::services::quiz_session::QuizSessions;
use quiz_poll_bot::services::stats::{StatsRecorder, StatsStore};
use quiz_poll_bot::utils::logging::log_system_event;
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quiz_poll_bot=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    info!("Starting Quiz Poll Bot v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "database={} port={} poll_window={}s",
        config.database_url, config.http_port, config.dispatch.poll_duration_seconds
    );
    if config.owner_id.is_none() {
        tracing::warn!("OWNER_ID is not set; admin commands are disabled");
    }

    let db = DatabaseManager::new(&config.database_url).await?;
    db.run_migrations().await?;
    let store: Arc<dyn StatsStore> = Arc::new(db);
    info!("Stats store ready");

    let bot = Bot::new(&config.telegram_bot_token);
    let gateway = Arc::new(TelegramGateway::new(bot.clone()));
    let recorder = StatsRecorder::new(store.clone());
    let probe = HealthProbe::new(store);

    let ctx = BotContext {
        sessions: Arc::new(QuizSessions::new(gateway.clone(), config.dispatch, recorder.clone())),
        recorder,
        gate: AdminGate::new(config.owner_id),
        health: probe.clone(),
        messenger: gateway,
        broadcast_concurrency: config.broadcast_concurrency,
    };
    let handler = BotHandler::new(ctx);

    let health_service = HealthService::new(probe);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port))
        .await
        .map_err(|e| anyhow::anyhow!("Cannot bind health endpoint on port {}: {}", config.http_port, e))?;
    info!("Health endpoint listening on :{}/health", config.http_port);

    let bot_task = tokio::spawn(async move {
        let storage: Arc<InMemStorage<AdminState>> = InMemStorage::new();
        Dispatcher::builder(bot, handler.schema())
            .dependencies(dptree::deps![storage])
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    });

    let health_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, health_service.router).await {
            tracing::error!("Health endpoint stopped: {}", e);
        }
    });

    log_system_event("STARTED", Some("bot and health server running"));

    tokio::select! {
        result = bot_task => {
            if let Err(e) = result {
                tracing::error!("Update dispatcher panicked: {}", e);
            }
        }
        result = health_task => {
            if let Err(e) = result {
                tracing::error!("Health endpoint panicked: {}", e);
            }
        }
    }

    log_system_event("STOPPED", None);
    Ok(())
}
