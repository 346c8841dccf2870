//! Metrics collection using Prometheus
//!
//! Metric groups mirror the layers of the service: the process itself, live
//! connections, game activity and event processing latency.

use crate::coordinator::machine::GameStats;
use crate::types::Winner;
use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the game service
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Arc<Registry>,
    service_metrics: ServiceMetrics,
    connection_metrics: ConnectionMetrics,
    game_metrics: GameMetrics,
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Connection-related metrics
#[derive(Clone)]
pub struct ConnectionMetrics {
    /// Currently open WebSocket connections
    pub active_connections: IntGauge,

    /// Connections accepted since startup
    pub connections_total: IntCounter,

    /// Inbound frames by event name and status
    pub messages_total: IntCounterVec,
}

/// Game-related metrics
#[derive(Clone)]
pub struct GameMetrics {
    pub players_queued_total: IntCounter,

    /// Players currently waiting for an opponent
    pub players_waiting: IntGauge,

    pub games_started_total: IntCounter,

    /// Finished games by outcome (x, o, draw, abandoned)
    pub games_finished_total: IntCounterVec,

    /// Moves by status (`applied` or a rejection code)
    pub moves_total: IntCounterVec,

    pub active_sessions: IntGauge,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Time spent handling one inbound event, including delivery
    pub event_processing_duration: HistogramVec,

    /// Length of finished games in seconds
    pub game_duration_seconds: Histogram,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let connection_metrics = ConnectionMetrics::new(&registry)?;
        let game_metrics = GameMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            connection_metrics,
            game_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn connections(&self) -> &ConnectionMetrics {
        &self.connection_metrics
    }

    pub fn game(&self) -> &GameMetrics {
        &self.game_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Refresh the gauges that mirror coordinator state
    pub fn update_from_game_stats(&self, stats: &GameStats) {
        self.game_metrics
            .active_sessions
            .set(stats.active_sessions as i64);
        self.game_metrics
            .players_waiting
            .set(stats.players_waiting as i64);
    }

    pub fn record_connection_opened(&self) {
        self.connection_metrics.connections_total.inc();
        self.connection_metrics.active_connections.inc();
    }

    pub fn record_connection_closed(&self) {
        self.connection_metrics.active_connections.dec();
    }

    /// Record an inbound frame
    pub fn record_message(&self, event: &str, status: &str) {
        self.connection_metrics
            .messages_total
            .with_label_values(&[event, status])
            .inc();
    }

    pub fn record_player_queued(&self) {
        self.game_metrics.players_queued_total.inc();
    }

    pub fn record_game_started(&self) {
        self.game_metrics.games_started_total.inc();
    }

    /// Record a game that ended on the board
    pub fn record_game_finished(&self, winner: Winner) {
        let outcome = match winner {
            Winner::X => "x",
            Winner::O => "o",
            Winner::Draw => "draw",
        };
        self.game_metrics
            .games_finished_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Record a game aborted by a disconnect
    pub fn record_game_abandoned(&self) {
        self.game_metrics
            .games_finished_total
            .with_label_values(&["abandoned"])
            .inc();
    }

    /// Record a move as `applied` or by its rejection code
    pub fn record_move(&self, status: &str) {
        self.game_metrics
            .moves_total
            .with_label_values(&[status])
            .inc();
    }

    pub fn record_event_processing(&self, event: &str, duration: Duration) {
        self.performance_metrics
            .event_processing_duration
            .with_label_values(&[event])
            .observe(duration.as_secs_f64());
    }

    pub fn record_game_duration(&self, duration: Duration) {
        self.performance_metrics
            .game_duration_seconds
            .observe(duration.as_secs_f64());
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    pub fn update_uptime(&self, uptime: Duration) {
        self.service_metrics
            .uptime_seconds
            .set(uptime.as_secs() as i64);
    }

    /// Render all registered metrics in the Prometheus text format
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("tictac_room_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "tictac_room_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("tictac_room_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl ConnectionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let active_connections = IntGauge::new(
            "tictac_room_active_connections",
            "Currently open WebSocket connections",
        )?;
        registry.register(Box::new(active_connections.clone()))?;

        let connections_total = IntCounter::new(
            "tictac_room_connections_total",
            "Total WebSocket connections accepted",
        )?;
        registry.register(Box::new(connections_total.clone()))?;

        let messages_total = IntCounterVec::new(
            Opts::new(
                "tictac_room_messages_total",
                "Total inbound messages processed",
            ),
            &["event", "status"],
        )?;
        registry.register(Box::new(messages_total.clone()))?;

        Ok(Self {
            active_connections,
            connections_total,
            messages_total,
        })
    }
}

impl GameMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let players_queued_total = IntCounter::new(
            "tictac_room_players_queued_total",
            "Total players queued",
        )?;
        registry.register(Box::new(players_queued_total.clone()))?;

        let players_waiting = IntGauge::new(
            "tictac_room_players_waiting",
            "Players currently waiting for an opponent",
        )?;
        registry.register(Box::new(players_waiting.clone()))?;

        let games_started_total =
            IntCounter::new("tictac_room_games_started_total", "Total games started")?;
        registry.register(Box::new(games_started_total.clone()))?;

        let games_finished_total = IntCounterVec::new(
            Opts::new("tictac_room_games_finished_total", "Total games finished"),
            &["outcome"],
        )?;
        registry.register(Box::new(games_finished_total.clone()))?;

        let moves_total = IntCounterVec::new(
            Opts::new("tictac_room_moves_total", "Total moves received"),
            &["status"],
        )?;
        registry.register(Box::new(moves_total.clone()))?;

        let active_sessions =
            IntGauge::new("tictac_room_active_sessions", "Number of active sessions")?;
        registry.register(Box::new(active_sessions.clone()))?;

        Ok(Self {
            players_queued_total,
            players_waiting,
            games_started_total,
            games_finished_total,
            moves_total,
            active_sessions,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let event_processing_duration = HistogramVec::new(
            HistogramOpts::new(
                "tictac_room_event_processing_duration_seconds",
                "Inbound event processing time",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1]),
            &["event"],
        )?;
        registry.register(Box::new(event_processing_duration.clone()))?;

        let game_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("tictac_room_game_duration_seconds", "Game length")
                .buckets(vec![5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        )?;
        registry.register(Box::new(game_duration_seconds.clone()))?;

        Ok(Self {
            event_processing_duration,
            game_duration_seconds,
        })
    }
}
