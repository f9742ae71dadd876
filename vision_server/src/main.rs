//! Vision pages binary.
//!
use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use cam_capture::V4l2Provider;
use clap::Parser;
use env_logger::TimestampPrecision;
use vision_server::{app::AppState, config::Args, endpoints::router, nn::TractProvider};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logger
    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let media = Arc::new(V4l2Provider::new(args.device_map()));
    let state = Arc::new(AppState::new(media, args.facing_mode, args.trust_remote));

    // Load models in the background, the pages show progress through the status
    {
        let state = state.clone();
        let provider = TractProvider::new(args.model_dir(), args.model_sources());
        let (classifier, detector) = (args.classifier_options(), args.detector_options());
        tokio::spawn(async move {
            if let Err(err) = state.load_models(&provider, classifier, detector).await {
                log::error!("Failed to load models: {}", err);
            }
        });
    }

    // Serve HTTP server
    let addr: SocketAddr = args.server_address.parse()?;
    log::info!("Serving on http://{}", addr);
    axum::Server::bind(&addr)
        .serve(router(state.clone()).into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for ctrl-c: {}", err);
            }
        })
        .await?;

    state.shutdown().await;
    log::info!("Camera released, bye");

    Ok(())
}
