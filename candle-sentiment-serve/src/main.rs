#[cfg(feature = "accelerate")]
extern crate accelerate_src;

#[cfg(feature = "mkl")]
extern crate intel_mkl_src;

mod cli;
mod inference_endpoint;
mod responses;
mod routes;
mod workers;

use anyhow::Result;
use candle_sentiment_pipelines::{build_model_loader, PretrainedModelLoader};
use clap::Parser;
use tokio::signal;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing();

    let device = args.device()?;
    let dtype = args.dtype();
    let dtype_str = dtype.map_or("default".to_string(), |dt| format!("{:?}", dt));
    tracing::info!(
        "Serving sentiment analysis for model '{}' on device {:?} with dtype {} ({:?} loading, {} workers)",
        args.model(),
        device,
        dtype_str,
        args.load_policy(),
        args.num_workers()
    );

    let loader = PretrainedModelLoader::new(
        args.model(),
        device,
        dtype,
        Some(args.from_pretrained_params()),
    );
    let app = routes::router(
        build_model_loader(loader, args.load_policy()),
        args.num_workers(),
    )?;

    let listener = tokio::net::TcpListener::bind(args.host()).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolves once SIGINT or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::warn!("Shutdown signal received, stopping server...");
}

fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("candle_sentiment=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
