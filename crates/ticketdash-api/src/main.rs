//! ticketdash server binary.
//!
//! Serves the form management HTTP API.
//!
//! # Usage
//!
//! ```bash
//! # With config file
//! ticketdash --config config.yaml
//!
//! # With environment variables only
//! TICKETDASH_STORAGE__BACKEND=memory ticketdash
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use ticketdash_api::errors::ErrorConfig;
use ticketdash_api::http::{
    apply_middleware, create_router_with_body_limit, create_router_with_observability, AppState,
};
use ticketdash_api::observability::{init_logging, init_metrics, LoggingConfig};
use ticketdash_domain::RandomCustomIds;
use ticketdash_server::{AuditSink, NoopAuditSink, ServerConfig, StoreAuditSink};
use ticketdash_storage::{FormStore, MemoryFormStore, PostgresConfig, PostgresFormStore};

/// ticketdash - form management API for ticket panels
#[derive(Parser, Debug)]
#[command(name = "ticketdash")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = if let Some(config_path) = args.config {
        ServerConfig::load(&config_path)?
    } else {
        ServerConfig::from_env()?
    };
    config.validate()?;

    init_logging(LoggingConfig::from(&config.logging));

    info!(version = env!("CARGO_PKG_VERSION"), "Starting ticketdash server");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    match config.storage.backend.as_str() {
        "memory" => {
            info!("Using in-memory storage backend");
            run_server(MemoryFormStore::new_shared(), addr, &config).await
        }
        "postgres" => {
            let database_url = config.storage.database_url.as_ref().ok_or_else(|| {
                anyhow::anyhow!("storage.database_url is required for postgres backend")
            })?;

            info!("Connecting to PostgreSQL database");
            let pg_config = PostgresConfig {
                database_url: database_url.clone(),
                max_connections: config.storage.pool_size,
                min_connections: 1,
                connect_timeout_secs: config.storage.connection_timeout_secs,
                ..Default::default()
            };

            let storage = PostgresFormStore::from_config(&pg_config).await?;
            info!("PostgreSQL connection established");

            info!("Running database migrations");
            storage.run_migrations().await?;
            info!("Database migrations complete");

            run_server(Arc::new(storage), addr, &config).await
        }
        _ => {
            error!("Unknown storage backend: {}", config.storage.backend);
            anyhow::bail!("Unknown storage backend: {}", config.storage.backend);
        }
    }
}

/// Builds the application over `storage` and serves it until a shutdown signal.
async fn run_server<S: FormStore>(
    storage: Arc<S>,
    addr: SocketAddr,
    config: &ServerConfig,
) -> anyhow::Result<()> {
    let audit: Arc<dyn AuditSink> = if config.audit.enabled {
        Arc::new(StoreAuditSink::with_timeout(
            Arc::clone(&storage),
            Duration::from_secs(config.audit.timeout_secs),
        ))
    } else {
        info!("Audit logging disabled");
        Arc::new(NoopAuditSink)
    };

    let errors = if config.errors.detailed {
        ErrorConfig::development()
    } else {
        ErrorConfig::production()
    };

    let state = AppState::with_components(storage, Arc::new(RandomCustomIds::new()), audit, errors);

    let router = if config.metrics.enabled {
        let metrics_state = init_metrics()?;
        info!(path = %config.metrics.path, "Metrics enabled");
        create_router_with_observability(
            state,
            metrics_state,
            &config.metrics.path,
            config.server.body_limit_bytes,
        )
    } else {
        create_router_with_body_limit(state, config.server.body_limit_bytes)
    };
    let router = apply_middleware(
        router,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    info!(%addr, "HTTP server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_args_parsing() {
        let args = Args::try_parse_from(["ticketdash"]).unwrap();
        assert!(args.config.is_none());

        let args = Args::try_parse_from(["ticketdash", "--config", "config.yaml"]).unwrap();
        assert_eq!(args.config, Some("config.yaml".to_string()));

        let args = Args::try_parse_from(["ticketdash", "-c", "test.yaml"]).unwrap();
        assert_eq!(args.config, Some("test.yaml".to_string()));
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        assert!(Args::try_parse_from(["ticketdash", "--grpc"]).is_err());
    }
}
