//! Main application state and service coordination
//!
//! `AppState` owns every long-lived component: the game service, the
//! connection registry, metrics, the HTTP listener task and the background
//! maintenance tasks.

use crate::config::AppConfig;
use crate::coordinator::service::GameService;
use crate::metrics::MetricsCollector;
use crate::service::health::{HealthCheck, HealthStatus};
use crate::service::http::create_router;
use crate::transport::connection::ConnectionRegistry;
use crate::transport::socket::ConnectionContext;
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Failed to bind listener: {message}")]
    Bind { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    config: AppConfig,

    /// Matchmaking and game sessions behind one critical section
    game: Arc<GameService>,

    /// Live WebSocket connections; also the event sink of `game`
    connections: Arc<ConnectionRegistry>,

    metrics: Arc<MetricsCollector>,

    /// Signals the HTTP server and every open socket to close
    shutdown_tx: broadcast::Sender<()>,

    /// HTTP server task, awaited on shutdown
    server_task: Mutex<Option<JoinHandle<()>>>,

    /// Background task handles
    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    local_addr: Mutex<Option<SocketAddr>>,

    is_running: RwLock<bool>,

    started_at: Instant,
}

impl AppState {
    /// Build all components. Nothing is bound or spawned until [`AppState::start`].
    pub fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing tictac-room game service");
        info!(
            "Configuration: service={}, listen={}:{}, notify_rejected_moves={}",
            config.service.name,
            config.service.host,
            config.service.http_port,
            config.game.notify_rejected_moves
        );

        let metrics =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );
        let connections = Arc::new(ConnectionRegistry::new());
        let game = Arc::new(GameService::new(
            connections.clone(),
            metrics.clone(),
            config.game.notify_rejected_moves,
        ));
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            game,
            connections,
            metrics,
            shutdown_tx,
            server_task: Mutex::new(None),
            background_tasks: Mutex::new(Vec::new()),
            local_addr: Mutex::new(None),
            is_running: RwLock::new(false),
            started_at: Instant::now(),
        })
    }

    /// Bind the listener and start serving HTTP and WebSocket traffic
    pub async fn start(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting tictac-room game service");

        let addr = self
            .config
            .bind_address()
            .map_err(|e| ServiceError::Configuration {
                message: e.to_string(),
            })?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServiceError::Bind {
                message: format!("{}: {}", addr, e),
            })?;
        let local_addr = listener.local_addr().map_err(|e| ServiceError::Bind {
            message: format!("Failed to read local address: {}", e),
        })?;
        self.set_local_addr(local_addr);

        *self.is_running.write().await = true;

        self.start_http_server(listener)?;
        self.start_background_tasks()?;

        info!("✅ Tictac-room service listening on http://{}", local_addr);
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of tictac-room service");

        *self.is_running.write().await = false;

        // Stops the HTTP listener and closes every open socket
        if self.shutdown_tx.send(()).is_err() {
            debug!("No shutdown subscribers left");
        }

        let server_task = self
            .server_task
            .lock()
            .map_err(|_| ServiceError::BackgroundTask {
                message: "Failed to acquire server task lock".to_string(),
            })?
            .take();
        if let Some(task) = server_task {
            match tokio::time::timeout(self.config.shutdown_timeout(), task).await {
                Ok(Ok(())) => info!("✅ HTTP server stopped"),
                Ok(Err(e)) => warn!("HTTP server task failed: {}", e),
                Err(_) => warn!(
                    "HTTP server did not stop within {}s",
                    self.config.service.shutdown_timeout_seconds
                ),
            }
        }

        self.stop_background_tasks()?;

        let final_stats = self.game.stats().await;
        info!("Final service statistics: {:?}", final_stats);
        info!("✅ Tictac-room service shutdown completed");

        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn game(&self) -> Arc<GameService> {
        self.game.clone()
    }

    pub fn connections(&self) -> Arc<ConnectionRegistry> {
        self.connections.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Address the listener is bound to, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.lock().ok().and_then(|addr| *addr)
    }

    /// Per-connection view handed to every accepted WebSocket
    pub fn connection_context(&self) -> ConnectionContext {
        ConnectionContext {
            game: self.game.clone(),
            connections: self.connections.clone(),
            metrics: self.metrics.clone(),
            max_name_length: self.config.game.max_name_length,
            keepalive_interval: self.config.keepalive_interval(),
            shutdown: self.shutdown_tx.clone(),
        }
    }

    fn set_local_addr(&self, addr: SocketAddr) {
        if let Ok(mut local_addr) = self.local_addr.lock() {
            *local_addr = Some(addr);
        }
    }

    fn start_http_server(self: &Arc<Self>, listener: TcpListener) -> Result<(), ServiceError> {
        let app = create_router(self.clone());
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                    info!("HTTP server shutdown signal received");
                })
                .await;

            if let Err(e) = result {
                error!("HTTP server failed: {}", e);
            }
        });

        let mut server_task = self
            .server_task
            .lock()
            .map_err(|_| ServiceError::BackgroundTask {
                message: "Failed to acquire server task lock".to_string(),
            })?;
        *server_task = Some(handle);
        Ok(())
    }

    /// Run a health check and export its result on the health gauges
    pub async fn refresh_health_metrics(self: &Arc<Self>) {
        let metrics = self.metrics();
        metrics.update_uptime(self.uptime());

        match HealthCheck::check(self.clone()).await {
            Ok(health) => {
                if health.has_game_stats() {
                    metrics.update_from_game_stats(&health.stats.game);
                }
                metrics.update_health_status(health.status.gauge_value());
                for check in &health.checks {
                    metrics.update_component_health(
                        &check.name,
                        check.status == HealthStatus::Healthy,
                    );
                }
            }
            Err(e) => {
                warn!("Health check failed while updating metrics: {}", e);
                metrics.update_health_status(HealthStatus::Unhealthy.gauge_value());
            }
        }
    }

    /// Start background maintenance tasks
    fn start_background_tasks(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting health metrics task (15s interval)...");
        let state = Arc::downgrade(self);
        let health_metrics_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(15));
            info!("Health metrics task started");

            loop {
                interval.tick().await;
                let Some(state) = state.upgrade() else { break };
                if !state.is_running().await {
                    break;
                }

                state.refresh_health_metrics().await;

                debug!(
                    "Updated service health metrics - uptime: {}s, connections: {}",
                    state.uptime().as_secs(),
                    state.connections.count()
                );
            }

            info!("Health metrics task stopped");
        });

        self.background_tasks
            .lock()
            .map_err(|_| ServiceError::BackgroundTask {
                message: "Failed to acquire background task lock".to_string(),
            })?
            .push(health_metrics_task);
        Ok(())
    }

    /// Stop all background tasks
    fn stop_background_tasks(&self) -> Result<(), ServiceError> {
        let tasks: Vec<JoinHandle<()>> = self
            .background_tasks
            .lock()
            .map_err(|_| ServiceError::BackgroundTask {
                message: "Failed to acquire background task lock".to_string(),
            })?
            .drain(..)
            .collect();

        if tasks.is_empty() {
            info!("No background tasks to stop");
            return Ok(());
        }

        let task_count = tasks.len();
        for (i, task) in tasks.into_iter().enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        info!("✅ All {} background tasks stopped", task_count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.service.host = "127.0.0.1".to_string();
        config.service.http_port = 0;
        config.service.shutdown_timeout_seconds = 2;
        config
    }

    #[tokio::test]
    async fn test_new_state_is_not_running() {
        let state = AppState::new(test_config()).unwrap();

        assert!(!state.is_running().await);
        assert!(state.local_addr().is_none());
        assert_eq!(state.connections().count(), 0);
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let state = Arc::new(AppState::new(test_config()).unwrap());

        state.start().await.unwrap();
        assert!(state.is_running().await);
        assert!(state.local_addr().unwrap().port() > 0);

        state.shutdown().await.unwrap();
        assert!(!state.is_running().await);
    }

    #[tokio::test]
    async fn test_connection_context_uses_game_settings() {
        let mut config = test_config();
        config.game.max_name_length = 7;
        let state = AppState::new(config).unwrap();

        let ctx = state.connection_context();
        assert_eq!(ctx.max_name_length, 7);
        assert_eq!(ctx.keepalive_interval, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_health_gauges_follow_health_check() {
        let state = Arc::new(AppState::new(test_config()).unwrap());
        let service_metrics = state.metrics().service().clone();

        // Stopped: the running check fails and the gauge drops
        state.refresh_health_metrics().await;
        assert_eq!(service_metrics.health_status.get(), 0);
        assert_eq!(
            service_metrics
                .component_health
                .with_label_values(&["service_running"])
                .get(),
            0
        );
        assert_eq!(
            service_metrics
                .component_health
                .with_label_values(&["game_coordinator"])
                .get(),
            1
        );

        state.start().await.unwrap();
        state.refresh_health_metrics().await;
        assert_eq!(service_metrics.health_status.get(), 2);
        assert_eq!(
            service_metrics
                .component_health
                .with_label_values(&["service_running"])
                .get(),
            1
        );

        state.shutdown().await.unwrap();
    }
}
