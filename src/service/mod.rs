//! Service layer for the tictac-room game service
//!
//! Application state, the HTTP router and health reporting.

pub mod app;
pub mod health;
pub mod http;

pub use app::{AppState, ServiceError};
pub use health::{probe_readiness, HealthCheck, HealthStatus};
pub use http::create_router;
