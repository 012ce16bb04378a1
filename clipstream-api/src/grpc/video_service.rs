//! gRPC `VideoService` implementation
//!
//! Thin wrapper over the core transfer pipelines, converting between proto
//! chunks and domain frames. Upload acks and egress statuses carry the
//! wire-visible message strings; everything else is delegated.

use bytes::Bytes;
use std::pin::Pin;
use tokio_stream::StreamExt;
use tonic::{Request, Response, Status, Streaming};
use tracing::info;

use clipstream_core::storage::MediaStore;
use clipstream_core::transfer::{ChunkFrame, EgressPipeline, IngestOutcome, IngestPipeline};
use clipstream_core::Error;
use clipstream_proto::video::video_service_server::VideoService;
use clipstream_proto::video::{UploadResponse, VideoChunk, VideoRequest};

/// Ack message for a committed upload
const UPLOAD_OK: &str = "Video uploaded successfully";
/// Ack message for an upload whose stream carried no chunks
const UPLOAD_EMPTY: &str = "Failed to upload video";

/// gRPC `VideoService` implementation
#[derive(Clone)]
pub struct VideoServiceImpl {
    ingest: IngestPipeline,
    egress: EgressPipeline,
}

impl VideoServiceImpl {
    #[must_use]
    pub fn new(store: MediaStore) -> Self {
        Self {
            ingest: IngestPipeline::new(store.clone()),
            egress: EgressPipeline::new(store),
        }
    }
}

#[tonic::async_trait]
#[allow(clippy::result_large_err)]
impl VideoService for VideoServiceImpl {
    async fn upload_video(
        &self,
        request: Request<Streaming<VideoChunk>>,
    ) -> Result<Response<UploadResponse>, Status> {
        let frames = request.into_inner().map(|chunk| {
            chunk
                .map(|c| ChunkFrame {
                    object_id: c.video_id,
                    payload: Bytes::from(c.content),
                })
                .map_err(|status| Error::Transport(status.to_string()))
        });

        match self.ingest.run(frames).await {
            Ok(IngestOutcome::Committed(object)) => {
                info!(
                    video_id = %object.id,
                    byte_length = object.byte_length,
                    "Upload acknowledged"
                );
                Ok(Response::new(UploadResponse {
                    video_id: object.id.into_string(),
                    success: true,
                    message: UPLOAD_OK.to_string(),
                }))
            }
            // An empty stream is acked, not failed at the transport level
            Ok(IngestOutcome::Empty) => Ok(Response::new(UploadResponse {
                video_id: String::new(),
                success: false,
                message: UPLOAD_EMPTY.to_string(),
            })),
            Err(err) => Err(Status::from(err)),
        }
    }

    type GetVideoStream =
        Pin<Box<dyn tokio_stream::Stream<Item = Result<VideoChunk, Status>> + Send + 'static>>;

    async fn get_video(
        &self,
        request: Request<VideoRequest>,
    ) -> Result<Response<Self::GetVideoStream>, Status> {
        let req = request.into_inner();

        // NotFound surfaces here, before any frame is produced
        let stream = self.egress.open(&req.video_id).await?;

        info!(video_id = %req.video_id, "Egress stream opened");

        let chunks = stream.map(|frame| {
            frame
                .map(|f| VideoChunk {
                    video_id: f.object_id,
                    content: f.payload.to_vec(),
                })
                .map_err(Status::from)
        });

        Ok(Response::new(Box::pin(chunks)))
    }
}
