// Module: grpc

pub mod video_service;

pub use video_service::VideoServiceImpl;

use clipstream_core::storage::MediaStore;
use clipstream_core::Config;
use clipstream_proto::video::video_service_server::VideoServiceServer;
use tokio::sync::watch;
use tonic::transport::Server;

/// Build and start the gRPC server
///
/// Runs until the shutdown channel flips, then stops accepting new calls and
/// drains in-flight streams.
pub async fn serve(
    config: &Config,
    store: MediaStore,
    mut shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let addr: std::net::SocketAddr = config.grpc_address().parse()?;

    let video_service = VideoServiceImpl::new(store);

    tracing::info!("gRPC server listening on {}", addr);

    Server::builder()
        .add_service(VideoServiceServer::new(video_service))
        .serve_with_shutdown(addr, async move {
            let _ = shutdown_rx.changed().await;
        })
        .await
        .map_err(|e| anyhow::anyhow!("gRPC server error: {e}"))?;

    Ok(())
}
