//! Game coordination
//!
//! [`machine`] holds the pure state transitions; [`service`] wraps them in
//! the lock and delivers the resulting events.

pub mod machine;
pub mod service;

pub use machine::{GameCoordinator, GameStats, Outbound, PlayerState};
pub use service::GameService;
