use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};

use rust_denoise::api::{ApiServer, AppState};
use rust_denoise::config::ServiceConfig;
use rust_denoise::coordinator::JobCoordinator;
use rust_denoise::logging::{LoggingSettings, init_logging};
use rust_denoise::pipeline::ProcessRunner;
use rust_denoise::storage::S3Gateway;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before anything reads them
    dotenvy::dotenv().ok();

    let _log_guard = init_logging(&LoggingSettings::from_env())?;

    let config = ServiceConfig::from_env()?;
    info!(
        max_concurrency = config.max_concurrency,
        ffmpeg = %config.ffmpeg_bin.display(),
        denoiser = %config.denoiser_bin.display(),
        stage_timeout_secs = config.stage_timeout.map(|t| t.as_secs()),
        "Starting rust-denoise {}",
        env!("CARGO_PKG_VERSION")
    );

    let gateway = S3Gateway::connect(&config.aws_region, config.s3_endpoint.as_deref()).await;
    let runner = ProcessRunner::new().with_timeout(config.stage_timeout);
    let coordinator = JobCoordinator::from_config(&config, Arc::new(runner), Arc::new(gateway));

    let server = ApiServer::new(config.api.clone(), AppState::new(coordinator));
    let cancel_token = server.cancel_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        cancel_token.cancel();
    });

    server.run().await?;
    info!("rust-denoise stopped");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
