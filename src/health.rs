//! Health check module
//! Provides health status for the application and its dependencies

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::error;

use crate::database;

/// Health status response
#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Overall health state
#[derive(Debug, Serialize, Clone)]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self.status, HealthState::Healthy)
    }
}

/// Individual component health status
#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub status: ComponentState,
    pub response_time_ms: Option<u128>,
    pub details: Option<String>,
}

/// Component state
#[derive(Debug, Serialize, Clone)]
pub enum ComponentState {
    Up,
    Down,
}

impl ComponentHealth {
    pub fn up(response_time_ms: Option<u128>) -> Self {
        Self {
            status: ComponentState::Up,
            response_time_ms,
            details: None,
        }
    }

    pub fn down(details: Option<String>) -> Self {
        Self {
            status: ComponentState::Down,
            response_time_ms: None,
            details,
        }
    }
}

/// Health checker for the application
#[derive(Clone)]
pub struct HealthChecker {
    db_pool: sqlx::PgPool,
}

impl HealthChecker {
    pub fn new(db_pool: sqlx::PgPool) -> Self {
        Self { db_pool }
    }

    pub async fn check_all(&self) -> HealthStatus {
        let mut checks = HashMap::new();

        let started = Instant::now();
        let database = match timeout(
            Duration::from_secs(5),
            database::health_check(&self.db_pool),
        )
        .await
        {
            Ok(Ok(())) => ComponentHealth::up(Some(started.elapsed().as_millis())),
            Ok(Err(e)) => {
                error!(error = %e, "Database health check failed");
                ComponentHealth::down(Some(e.to_string()))
            }
            Err(_) => {
                error!("Database health check timed out");
                ComponentHealth::down(Some("timeout".to_string()))
            }
        };

        let status = match database.status {
            ComponentState::Up => HealthState::Healthy,
            ComponentState::Down => HealthState::Unhealthy,
        };
        checks.insert("database".to_string(), database);

        HealthStatus {
            status,
            checks,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// GET /health
pub async fn health(State(checker): State<Arc<HealthChecker>>) -> impl IntoResponse {
    let status = checker.check_all().await;
    let code = if status.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}

/// GET /health/ready
pub async fn readiness(State(checker): State<Arc<HealthChecker>>) -> impl IntoResponse {
    let status = checker.check_all().await;
    if status.is_healthy() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

/// GET /health/live
pub async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "alive")
}
