// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Kontrast — grayscale contrast enhancement over HTTP.
//
// Entry point. Initialises logging, loads the configuration, creates the
// artifact directories and runs the server until Ctrl-C.
//
//   kontrast [CONFIG]    (default: ./kontrast.json)

use std::path::PathBuf;
use std::process::ExitCode;

use kontrast_core::AppConfig;
use kontrast_core::error::Result;
use kontrast_server::{AppState, EnhanceServer};

const DEFAULT_CONFIG: &str = "kontrast.json";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Kontrast exited with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));

    let config = AppConfig::load(&config_path)?;
    tracing::info!(
        config = %config_path.display(),
        uploads = %config.upload_dir.display(),
        processed = %config.processed_dir.display(),
        histograms = %config.histogram_dir.display(),
        "Kontrast starting"
    );
    config.ensure_dirs()?;

    let mut server = EnhanceServer::new(&config, AppState::from_config(&config));
    let addr = server.start().await?;
    tracing::info!("open http://{addr}/ to upload an image");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    server.stop().await
}
