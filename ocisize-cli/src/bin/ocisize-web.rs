use anyhow::Result;
use clap::Parser;
use ocisize::{config::Config, distribution::UreqTransport, QueryOptions};
use ocisize_cli::web::{router, AppState};
use std::net::SocketAddr;
use tokio::{net::TcpListener, signal};

/// Web UI for querying container image sizes across platforms
#[derive(Debug, Parser)]
#[command(version)]
struct Opt {
    /// Port to listen on
    #[arg(short = 'p', long = "port", env = "HTTP_PORT", default_value_t = 8080)]
    port: u16,

    /// Number of platform manifests fetched in parallel per query
    #[arg(short = 'j', long = "jobs")]
    jobs: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
    let opt = Opt::parse();

    let config = Config::from_env();
    let mut options = QueryOptions::from_config(&config);
    if let Some(jobs) = opt.jobs {
        options.concurrency = jobs.max(1);
    }
    let state = AppState::new(UreqTransport::new(&config), options);

    let addr = SocketAddr::from(([0, 0, 0, 0], opt.port));
    let listener = TcpListener::bind(addr).await?;
    log::info!("Server running on {}", addr);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
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
                log::error!("Failed to listen for SIGTERM: {}", e);
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

    log::info!("Shutdown signal received");
}
