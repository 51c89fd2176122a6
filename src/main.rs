mod app;
mod autosave;
mod db;
mod prelude;
mod sync;
mod utils;

use clap::{Parser, Subcommand};
use tracing::Level;
use utils::config::Config;

/// Nexora agency website, dashboard, and draft sync client.
#[derive(Parser)]
#[command(name = "nexora", version, about, long_about = None)]
struct Cli {
    /// Log debug output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the web server.
    Serve {
        /// Path to the server config file.
        config: String,
    },
    /// Edit a post as a local markdown file, autosaving it to a server.
    Sync(sync::SyncArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    utils::tracing::init(if cli.verbose { Level::DEBUG } else { Level::INFO })?;

    match cli.command {
        Command::Serve { config } => serve(&config).await,
        Command::Sync(args) => sync::run(args).await,
    }
}

async fn serve(file: &str) -> anyhow::Result<()> {
    let config = Config::load(file).await?;
    let addr = config.net.addr;
    let url = config.app.url.clone();

    let app = app::build(config).await?.into_make_service();
    tracing::info!("Live at {url}");

    let handle = axum_server::Handle::new();
    tokio::spawn(shutdown_on_signal(handle.clone()));
    axum_server::bind(addr).handle(handle).serve(app).await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Stop accepting connections on Ctrl-C, giving in-flight requests a moment to finish.
async fn shutdown_on_signal(handle: axum_server::Handle) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
        return;
    }
    tracing::info!("Shutting down");
    handle.graceful_shutdown(Some(std::time::Duration::from_secs(10)));
}
