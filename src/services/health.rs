use crate::services::stats::{bounded, StatsStore};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub store: StoreHealth,
    pub uptime_seconds: u64,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreHealth {
    pub status: String,
    pub response_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Shared between the HTTP endpoint and the `/health` bot command.
#[derive(Clone)]
pub struct HealthProbe {
    store: Arc<dyn StatsStore>,
    started_at: DateTime<Utc>,
}

impl HealthProbe {
    pub fn new(store: Arc<dyn StatsStore>) -> Self {
        Self {
            store,
            started_at: Utc::now(),
        }
    }

    pub async fn check(&self) -> HealthReport {
        let start = std::time::Instant::now();
        let ping = bounded(self.store.ping()).await;
        let response_time_ms = start.elapsed().as_millis() as u64;

        let (status, error) = match ping {
            Ok(()) => ("healthy", None),
            Err(e) => ("unhealthy", Some(e.to_string())),
        };

        let now = Utc::now();
        HealthReport {
            status: status.to_string(),
            timestamp: now,
            version: env!("CARGO_PKG_VERSION").to_string(),
            store: StoreHealth {
                status: status.to_string(),
                response_time_ms,
                error,
            },
            uptime_seconds: now.signed_duration_since(self.started_at).num_seconds().max(0) as u64,
        }
    }
}

pub struct HealthService {
    pub router: Router,
}

impl HealthService {
    pub fn new(probe: HealthProbe) -> Self {
        let router = Router::new()
            .route("/health", get(health_check))
            .route("/health/ready", get(readiness_check))
            .route("/health/live", get(liveness_check))
            .layer(TraceLayer::new_for_http())
            .with_state(probe);

        Self { router }
    }
}

async fn health_check(State(probe): State<HealthProbe>) -> (StatusCode, Json<HealthReport>) {
    let report = probe.check().await;
    let code = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(report))
}

async fn readiness_check(State(probe): State<HealthProbe>) -> Result<Json<&'static str>, StatusCode> {
    match bounded(probe.store.ping()).await {
        Ok(()) => Ok(Json("ready")),
        Err(_) => Err(StatusCode::SERVICE_UNAVAILABLE),
    }
}

async fn liveness_check() -> Json<&'static str> {
    Json("alive")
}
