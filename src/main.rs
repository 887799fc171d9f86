//! Repo Uploadr - relay multipart uploads into a GitHub repository

use clap::Parser;
use repo_uploadr::metrics::server::MetricsServer;
use repo_uploadr::{config::Config, server::Server};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Repo Uploadr - commit uploaded files and messages to a GitHub repository
#[derive(Parser, Debug)]
#[command(name = "repo-uploadr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to an optional YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn load_config(args: &Args) -> Result<Config, repo_uploadr::config::ConfigError> {
    match &args.config {
        Some(path) => Config::load(path),
        None => Config::from_env(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Repo Uploadr v{}", repo_uploadr::VERSION);

    let _ = dotenvy::dotenv();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            return Ok(ExitCode::FAILURE);
        }
    };
    info!(config = ?config, "Configuration loaded");

    let mut metrics_server = if config.metrics.enabled {
        let mut server = MetricsServer::from_config(&config.metrics);
        server.start().await?;
        Some(server)
    } else {
        None
    };

    let server = Server::from_config(&config).await?;
    server.run().await?;

    if let Some(metrics_server) = metrics_server.as_mut() {
        metrics_server.shutdown().await;
    }

    Ok(ExitCode::SUCCESS)
}
