mod app;
mod cli;
mod error;
mod handlers;
mod state;

use crate::app::App;
use crate::cli::CLI;
use crate::state::AppState;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CLI::try_parse()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    let state = AppState::new(config.shorturl_endpoint.clone(), &config.access_token)?;
    let app = App::router(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(
        listen_addr = %listener.local_addr()?,
        shorturl_endpoint = %config.shorturl_endpoint,
        "starting redirection edge"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
