//! Ingest side of the transfer pipeline

use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info};

use crate::error::Result;
use crate::models::VideoId;
use crate::storage::{MediaStore, StagingObject, StoredObject};

use super::ChunkFrame;

/// Result of one ingest run
#[derive(Debug)]
pub enum IngestOutcome {
    /// At least one frame arrived and the object was committed
    Committed(StoredObject),
    /// The stream ended with zero frames observed; nothing was written.
    /// Surfaces as an unsuccessful ack, not as a transport fault.
    Empty,
}

/// Reassembles one ordered chunk stream into one stored object
#[derive(Debug, Clone)]
pub struct IngestPipeline {
    store: MediaStore,
}

impl IngestPipeline {
    pub fn new(store: MediaStore) -> Self {
        Self { store }
    }

    /// Drive one ingest stream to completion.
    ///
    /// The object id is taken from the first frame; later frames' ids are
    /// carried on the wire but not validated against it. Payloads are
    /// appended to a staging file in arrival order and committed with an
    /// atomic rename at end-of-stream. Any error (invalid id, storage
    /// fault, transport fault mid-stream) discards the staging file.
    pub async fn run<S>(&self, mut frames: S) -> Result<IngestOutcome>
    where
        S: Stream<Item = Result<ChunkFrame>> + Unpin,
    {
        let mut staging: Option<StagingObject> = None;

        while let Some(frame) = frames.next().await {
            let frame = frame?;
            match staging.as_mut() {
                Some(staging) => staging.append(&frame.payload).await?,
                None => {
                    let id = VideoId::parse(frame.object_id.as_str())?;
                    debug!(video_id = %id, "Ingest started");
                    let mut started = self.store.begin(id).await?;
                    started.append(&frame.payload).await?;
                    staging = Some(started);
                }
            }
        }

        match staging {
            Some(staging) => {
                let stored = staging.commit().await?;
                info!(
                    video_id = %stored.id,
                    bytes = stored.byte_length,
                    "Ingest committed"
                );
                Ok(IngestOutcome::Committed(stored))
            }
            None => {
                debug!("Ingest stream ended without frames");
                Ok(IngestOutcome::Empty)
            }
        }
    }
}
