//! Health check endpoints and monitoring
//!
//! Readiness and liveness probes plus a detailed component report.

use crate::coordinator::machine::GameStats;
use crate::service::app::AppState;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

/// How long a health probe waits for the game coordinator lock
const COORDINATOR_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

const GAME_COORDINATOR: &str = "game_coordinator";

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

impl HealthStatus {
    /// Value exported on the health status gauge
    pub fn gauge_value(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    pub active_connections: usize,
    pub total_connections: u64,
    pub uptime_seconds: u64,
    pub game: GameStats,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(app_state: Arc<AppState>) -> Result<Self> {
        let mut checks = Vec::new();
        let mut overall_status = HealthStatus::Healthy;

        let service_check = Self::check_service_running(&app_state).await;
        if service_check.status != HealthStatus::Healthy {
            overall_status = HealthStatus::Unhealthy;
        }
        checks.push(service_check);

        let (coordinator_check, game_stats) = Self::check_game_coordinator(&app_state).await;
        if coordinator_check.status == HealthStatus::Unhealthy {
            overall_status = HealthStatus::Unhealthy;
        } else if coordinator_check.status == HealthStatus::Degraded
            && overall_status == HealthStatus::Healthy
        {
            overall_status = HealthStatus::Degraded;
        }
        checks.push(coordinator_check);

        let connections = app_state.connections();
        let stats = ServiceStats {
            active_connections: connections.count(),
            total_connections: connections.total_accepted(),
            uptime_seconds: app_state.uptime().as_secs(),
            game: game_stats.unwrap_or_default(),
        };

        Ok(HealthCheck {
            status: overall_status,
            service: app_state.config().service.name.clone(),
            version: crate::VERSION.to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if app_state.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - verify service can handle requests
    pub async fn readiness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if !app_state.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        Ok(Self::check_game_coordinator(&app_state).await.0.status)
    }

    async fn check_service_running(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if app_state.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn component(&self, name: &str) -> Option<&ComponentCheck> {
        self.checks.iter().find(|check| check.name == name)
    }

    /// Game stats are only meaningful when the coordinator answered
    pub fn has_game_stats(&self) -> bool {
        self.component(GAME_COORDINATOR)
            .is_some_and(|check| check.status == HealthStatus::Healthy)
    }

    /// The coordinator is healthy when its lock can be taken promptly
    async fn check_game_coordinator(app_state: &AppState) -> (ComponentCheck, Option<GameStats>) {
        let start = std::time::Instant::now();
        let game = app_state.game();

        let (status, message, stats) =
            match tokio::time::timeout(COORDINATOR_PROBE_TIMEOUT, game.stats()).await {
                Ok(stats) => (HealthStatus::Healthy, None, Some(stats)),
                Err(_) => {
                    error!(
                        "Game coordinator did not respond within {}ms",
                        COORDINATOR_PROBE_TIMEOUT.as_millis()
                    );
                    (
                        HealthStatus::Degraded,
                        Some("Game coordinator is busy".to_string()),
                        None,
                    )
                }
            };

        (
            ComponentCheck {
                name: GAME_COORDINATOR.to_string(),
                status,
                message,
                duration_ms: start.elapsed().as_millis() as u64,
            },
            stats,
        )
    }
}

/// Ask a running instance for its `/ready` status over HTTP
pub async fn probe_readiness(addr: SocketAddr, timeout: Duration) -> Result<HealthStatus> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let response = client
        .get(format!("http://{}/ready", addr))
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", addr))?;

    if !response.status().is_success() {
        return Ok(HealthStatus::Unhealthy);
    }

    let body = response
        .text()
        .await
        .context("Failed to read readiness response")?;
    if body == "Ready" {
        Ok(HealthStatus::Healthy)
    } else {
        Ok(HealthStatus::Degraded)
    }
}

impl HealthCheck {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[tokio::test]
    async fn test_stopped_service_is_unhealthy() {
        let state = Arc::new(AppState::new(AppConfig::default()).unwrap());

        assert_eq!(
            HealthCheck::liveness_check(state.clone()).await.unwrap(),
            HealthStatus::Unhealthy
        );
        assert_eq!(
            HealthCheck::readiness_check(state.clone()).await.unwrap(),
            HealthStatus::Unhealthy
        );

        let report = HealthCheck::check(state).await.unwrap();
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert_eq!(report.service, "tictac-room");
        assert_eq!(report.checks.len(), 2);
        assert!(report.to_json().unwrap().contains("game_coordinator"));
        assert!(report.has_game_stats());
    }

    #[tokio::test]
    async fn test_probe_readiness_matches_ready_endpoint() {
        let mut config = AppConfig::default();
        config.service.host = "127.0.0.1".to_string();
        config.service.http_port = 0;
        let state = Arc::new(AppState::new(config).unwrap());
        state.start().await.unwrap();
        let addr = state.local_addr().unwrap();

        let status = probe_readiness(addr, Duration::from_secs(5)).await.unwrap();
        assert_eq!(status, HealthStatus::Healthy);

        state.shutdown().await.unwrap();
    }
}
