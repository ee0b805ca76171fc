// GridMint backend server
// Serves a status page and read-only token views on top of the deployed
// contracts.

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::{Context, Result};
use clap::Parser;
use grid_backend::{configure, AppState};
use grid_core::Settings;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "grid-backend")]
#[command(about = "GridMint backend status server", long_about = None)]
struct Args {
    /// Configuration file (defaults to grid.toml in the working directory)
    #[arg(short, long, env = "GRID_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,
}

#[actix_web::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        settings.server_port = port;
    }
    settings.validate().context("Invalid backend configuration")?;

    let chain = grid_core::connect(&settings)
        .await
        .context("Backend startup failed")?;
    let state = web::Data::new(AppState::new(chain.connector, chain.registry));

    info!(
        "Starting backend server on {}:{}",
        settings.server_host, settings.server_port
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header(),
            )
            .configure(configure)
    })
    .bind((settings.server_host.as_str(), settings.server_port))
    .with_context(|| {
        format!(
            "Failed to bind {}:{}",
            settings.server_host, settings.server_port
        )
    })?
    .run()
    .await?;

    Ok(())
}
