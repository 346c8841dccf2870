//! Main entry point for the tictac-room game service
//!
//! Loads configuration, initializes logging, serves HTTP and WebSocket
//! traffic and shuts down gracefully on SIGINT or SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tictac_room::config::{validate_config, AppConfig};
use tictac_room::service::{probe_readiness, AppState, HealthCheck, HealthStatus};
use tokio::signal;
use tokio::time::Duration;
use tracing::{error, info, warn};

/// Tictac Room - realtime two-player tic-tac-toe matchmaking and game server
#[derive(Parser)]
#[command(
    name = "tictac-room",
    version,
    about = "Realtime two-player tic-tac-toe matchmaking and game coordination over WebSockets",
    long_about = "Tictac Room pairs players first-come first-served, runs each game as a \
                 server-authoritative session, and relays moves and results to both \
                 participants over a JSON WebSocket protocol."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Perform health check and exit
    #[arg(long, help = "Query the readiness endpoint of a running service and exit")]
    health_check: bool,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Listen host override
    #[arg(long, value_name = "HOST", help = "Override HTTP listen host")]
    host: Option<String>,

    /// HTTP port override
    #[arg(long, value_name = "PORT", help = "Override HTTP server port")]
    http_port: Option<u16>,

    /// Report rejected moves to the mover
    #[arg(long, help = "Send a moverejected event when a move is refused")]
    notify_rejected_moves: bool,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Query the readiness endpoint of a running instance
async fn perform_health_check(config: &AppConfig) -> Result<()> {
    let mut addr = config.bind_address()?;
    if addr.ip().is_unspecified() {
        addr = SocketAddr::from(([127, 0, 0, 1], addr.port()));
    }
    info!("Performing health check against http://{}/ready...", addr);

    match probe_readiness(addr, Duration::from_secs(5)).await {
        Ok(status) => {
            println!("Health Check: {}", status);
            println!("  Endpoint: http://{}/ready", addr);
            match status {
                HealthStatus::Healthy | HealthStatus::Degraded => std::process::exit(0),
                HealthStatus::Unhealthy => std::process::exit(1),
            }
        }
        Err(e) => {
            println!("Health Check: {}", HealthStatus::Unhealthy);
            error!("Readiness probe failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Log a health summary periodically
async fn health_check_task(app_state: Arc<AppState>) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));

    while app_state.is_running().await {
        interval.tick().await;

        match HealthCheck::check(app_state.clone()).await {
            Ok(health) => {
                info!(
                    "Health check: {} - {} connections, {} active games, {} waiting",
                    health.status,
                    health.stats.active_connections,
                    health.stats.game.active_sessions,
                    health.stats.game.players_waiting
                );
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
            }
        }
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("🚀 Tictac Room Game Service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!(
        "   Listen: {}:{}",
        config.service.host, config.service.http_port
    );
    info!(
        "   Notify rejected moves: {}",
        config.game.notify_rejected_moves
    );
    info!("   Max name length: {}", config.game.max_name_length);
    info!(
        "   Keepalive interval: {}s",
        config.game.keepalive_interval_seconds
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load and merge configuration from file or environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(host) = &args.host {
        config.service.host = host.clone();
    }

    if let Some(http_port) = args.http_port {
        config.service.http_port = http_port;
    }

    if args.notify_rejected_moves {
        config.game.notify_rejected_moves = true;
    }

    validate_config(&config).context("Invalid configuration after CLI overrides")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration (CLI args can override environment/config file)
    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {:#}", e);
        std::process::exit(1);
    });

    // Initialize logging early (before any other operations)
    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if let Some(config_path) = &args.config {
        info!("Loaded configuration from: {}", config_path.display());
    }

    // Handle special modes
    if args.health_check {
        return perform_health_check(&config).await;
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    info!("Initializing service components...");
    let app_state = match AppState::new(config) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting service...");
    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    let health_task = {
        let app_state = app_state.clone();
        tokio::spawn(async move {
            health_check_task(app_state).await;
        })
    };

    info!("✅ Tictac Room Game Service is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await;

    info!("🛑 Shutdown signal received, beginning graceful shutdown...");
    health_task.abort();

    if let Err(e) = app_state.shutdown().await {
        warn!("⚠️  Shutdown did not complete cleanly: {}", e);
    }

    info!("🛑 Tictac Room Game Service stopped");
    Ok(())
}
