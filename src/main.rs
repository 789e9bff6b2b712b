use crate::config::Config;
use crate::startup::{AppState, router};
use tracing_subscriber::EnvFilter;

#[macro_use]
extern crate tracing;

mod commands;
mod config;
mod db;
mod error;
mod polls;
mod startup;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let app_state = AppState::new(&config).await.inspect_err(|e| {
        error!("Could not set up storage: {}", e);
    })?;

    let app = router(app_state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
