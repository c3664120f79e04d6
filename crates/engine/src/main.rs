use anyhow::{bail, Context};
use clap::Parser;
use phantom_core::config::PORT_ENV;
use phantom_core::{Config, Paths};
use phantom_engine::{serve, EngineContext, FetchPageFactory};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Headless page engine. Takes the dispatcher script as its only argument,
/// like the browser it stands in for, and listens on `$PORT`.
#[derive(Parser)]
#[command(name = "phantom-engine")]
#[command(version)]
struct Cli {
    /// Dispatcher script written by the host
    script: PathBuf,

    /// Config file (defaults to ~/.phantom/config.json)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();
    if !cli.script.is_file() {
        bail!("script not found: {}", cli.script.display());
    }

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Paths::new())?,
    };

    let port: u16 = std::env::var(PORT_ENV)
        .with_context(|| format!("{} is not set", PORT_ENV))?
        .parse()
        .with_context(|| format!("{} is not a valid port", PORT_ENV))?;

    let factory = FetchPageFactory::new(&config.engine)?;
    let ctx = Arc::new(EngineContext::new(Arc::new(factory)));

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("failed to bind port {}", port))?;
    info!(port, script = %cli.script.display(), "Engine listening");

    serve(listener, ctx, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown signal received");
    })
    .await?;
    Ok(())
}
