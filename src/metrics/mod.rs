//! Metrics for the tictac-room game service
//!
//! Health reporting lives in [`crate::service::health`]; this module only
//! owns the Prometheus registry and its metric groups.

pub mod collector;

pub use collector::{
    ConnectionMetrics, GameMetrics, MetricsCollector, MetricsTimer, PerformanceMetrics,
    ServiceMetrics,
};
