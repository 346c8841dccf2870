//! Configuration management for the tictac-room service
//!
//! Loading from TOML files and environment variables, validation, and
//! default values.

pub mod app;

pub use app::{validate_config, AppConfig, GameSettings, ServiceSettings};
