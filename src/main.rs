use anyhow::{Context, Result};
use clap::Parser;
use mandrill_dev::{config::Config, server, telemetry};
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "mandrill-dev", version, about = "Local Mandrill API emulator")]
struct Cli {
    /// Probe the running server's /healthz and exit 0 when healthy
    #[arg(long)]
    healthcheck: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Load configuration
    dotenvy::dotenv().ok();

    if cli.healthcheck {
        return Ok(healthcheck().await);
    }

    let config = Config::from_env()?;
    telemetry::init(&config.telemetry, config.debug);

    info!("Starting Mandrill Dev");
    info!("HTTP server listening on {}", config.http_addr());

    server::run(config).await?;
    Ok(ExitCode::SUCCESS)
}

async fn healthcheck() -> ExitCode {
    match probe().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("healthcheck failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn probe() -> Result<()> {
    let port = std::env::var("PORT")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| "8080".to_string());

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .context("Failed to build HTTP client")?;

    let response = client
        .get(format!("http://127.0.0.1:{}/healthz", port.trim()))
        .send()
        .await
        .context("Health endpoint unreachable")?;

    anyhow::ensure!(
        response.status().is_success(),
        "unexpected status {}",
        response.status()
    );
    Ok(())
}
