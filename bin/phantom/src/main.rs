mod commands;

use clap::{Parser, Subcommand};
use phantom_core::{Config, Paths, Rect};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "phantom")]
#[command(about = "Drive a headless browser engine over its local HTTP bridge", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.phantom/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the engine, load a URL and print what the page reports
    Fetch {
        /// Page URL
        url: String,

        /// Engine executable (overrides config process.binPath)
        #[arg(long)]
        bin: Option<String>,

        /// Dispatcher port (overrides config process.port)
        #[arg(short, long)]
        port: Option<u16>,

        /// HTTP method for the page load
        #[arg(long, default_value = "GET")]
        method: String,

        /// Request body for the page load
        #[arg(long)]
        data: Option<String>,

        /// Clip rectangle as top,left,width,height
        #[arg(long, value_parser = commands::fetch::parse_rect)]
        clip: Option<Rect>,

        /// Print the visible text of the page
        #[arg(long, conflicts_with = "content")]
        text: bool,

        /// Print the raw page content
        #[arg(long)]
        content: bool,
    },

    /// Probe a running dispatcher once
    Ping {
        /// Dispatcher port (overrides config process.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the embedded dispatcher script
    Shim,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config_path = cli.config.unwrap_or_else(|| Paths::new().config_file());

    match cli.command {
        Commands::Fetch {
            url,
            bin,
            port,
            method,
            data,
            clip,
            text,
            content,
        } => {
            let mut config = Config::load_or_default_at(&config_path)?;
            if let Some(bin) = bin {
                config.process.bin_path = bin;
            }
            if let Some(port) = port {
                config.process.port = port;
            }
            let args = commands::fetch::FetchArgs {
                url,
                method,
                data,
                clip,
                output: if text {
                    commands::fetch::Output::Text
                } else if content {
                    commands::fetch::Output::Content
                } else {
                    commands::fetch::Output::Summary
                },
                show_engine_output: cli.verbose,
            };
            commands::fetch::run(config.process, args).await?;
        }
        Commands::Ping { port } => {
            let config = Config::load_or_default_at(&config_path)?;
            commands::ping::run(port.unwrap_or(config.process.port)).await?;
        }
        Commands::Shim => {
            commands::shim::run();
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                commands::config_cmd::show(&config_path)?;
            }
            ConfigCommands::Init { force } => {
                commands::config_cmd::init(&config_path, force)?;
            }
        },
    }

    Ok(())
}
