use std::net::SocketAddr;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

mod app;
mod http;

/// Conversational service-marketplace broker gateway.
#[derive(Parser, Debug)]
#[command(name = "oficio-gateway", version)]
struct Cli {
    /// Path to the config file (default: ./oficio.toml, env overrides apply).
    #[arg(long)]
    config: Option<String>,
    /// Override the listen port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = oficio_core::config::OficioConfig::load(cli.config.as_deref())
        .unwrap_or_else(|e| {
            eprintln!("Config load failed ({}), using defaults", e);
            oficio_core::config::OficioConfig::default()
        });

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "oficio={level},tower_http=warn",
                    level = config.ops.log_level
                ))
            }),
        )
        .init();

    let bind = config.gateway.bind.clone();
    let port = cli.port.unwrap_or(config.gateway.port);

    // One token for the whole process: cancelling it stops the availability
    // listener/publisher and unblocks any in-flight gather loop.
    let cancel = CancellationToken::new();
    let state = app::AppState::init(config, cancel.clone()).await;
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("oficio gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;

    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
    cancel.cancel();
}
