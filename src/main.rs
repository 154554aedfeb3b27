use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use bank_report_api::auth::TokenService;
use bank_report_api::config::AppConfig;
use bank_report_api::database::{DatabaseManager, TdsBackend};
use bank_report_api::{build_app, cors_layer, AppState};

#[derive(Debug, Parser)]
#[command(name = "bank-report-api", version, about = "Branch reporting JSON API")]
struct Cli {
    /// Listen port (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Validate configuration and database connectivity, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present so local runs pick up DB_* and JWT_SECRET.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    info!(
        environment = ?config.environment,
        host = %config.database.host,
        database = %config.database.database,
        "Starting bank-report-api"
    );

    let manager = Arc::new(DatabaseManager::new(TdsBackend::new(&config.database)));

    // Refuse to serve without a working database.
    drop(
        manager
            .acquire()
            .await
            .context("initial database connection failed")?,
    );
    info!("Database connection established");

    if cli.check {
        manager.close().await;
        info!("Configuration and database connectivity OK");
        return Ok(());
    }

    let state = AppState {
        db: manager.clone(),
        tokens: Arc::new(TokenService::new(
            &config.security.jwt_secret,
            Duration::from_secs(config.security.access_ttl_secs),
            Duration::from_secs(config.security.refresh_ttl_secs),
        )),
        expose_error_details: config.server.expose_error_details,
        secure_cookies: config.security.secure_cookies,
    };

    let app = build_app(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(&config.server.cors_origins)),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "Listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    manager.close().await;
    info!("Database pool closed");
    served.context("server error")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
