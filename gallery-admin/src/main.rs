use anyhow::Result;
use clap::Parser;
use gallery_admin::{api, config};
use gallery_admin_core::Services;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = config::Cli::parse();
    let backend = config::build_backend(&cli).await?;
    let services = Services::new(backend, cli.compensation());
    let app = api::router(api::AppState::new(services));

    let listener = TcpListener::bind(cli.addr).await?;
    info!(addr = %cli.addr, backend = ?cli.backend, "listening");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
