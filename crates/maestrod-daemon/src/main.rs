//! maestrod admission-controlled build orchestration daemon.

use std::net::SocketAddr;

use clap::Parser;
use maestrod_config::Config;
use maestrod_daemon::{AppState, routes, scheduler};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "maestrod")]
#[command(about = "Admission-controlled build orchestration daemon", long_about = None)]
struct Cli {
    /// Path to the daemon configuration file
    #[arg(long, env = "MAESTROD_CONFIG", default_value = "/etc/maestrod/config.kdl")]
    config: String,

    /// Override the configured listen address
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    let listen_addr = cli
        .listen
        .unwrap_or_else(|| config.server.listen_addr.clone());

    let driver = maestrod_driver::from_config(&config)?;
    info!(
        runtime = driver.name(),
        target = %config.server.target_host,
        max_builds = config.server.max_builds,
        "backend driver ready"
    );

    let state = AppState::new(config, driver);
    tokio::spawn(scheduler::run(state.clone()));

    let app = routes::router(state).layer(TraceLayer::new_for_http());
    let addr: SocketAddr = listen_addr.parse()?;
    info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
