//! Egress side of the transfer pipeline

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::fs::File;
use tokio_stream::Stream;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::VideoId;
use crate::storage::MediaStore;

use super::{ChunkFrame, MAX_CHUNK_BYTES};

/// Streams stored objects back out in bounded chunks
#[derive(Debug, Clone)]
pub struct EgressPipeline {
    store: MediaStore,
    chunk_bytes: usize,
}

impl EgressPipeline {
    pub fn new(store: MediaStore) -> Self {
        Self {
            store,
            chunk_bytes: MAX_CHUNK_BYTES,
        }
    }

    /// Lower the chunk payload cap (mainly for tests)
    #[must_use]
    pub fn with_chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes;
        self
    }

    /// Open one egress stream for `id`.
    ///
    /// Fails with `NotFound` before any frame is produced if no object
    /// exists. The stream is not restartable; a new one must be opened per
    /// egress call.
    pub async fn open(&self, id: &str) -> Result<EgressStream> {
        let id = VideoId::parse(id)?;
        let (file, byte_length) = self.store.open(&id).await?;
        debug!(video_id = %id, bytes = byte_length, "Egress stream opened");

        Ok(EgressStream {
            object_id: id.into_string(),
            inner: ReaderStream::with_capacity(file, self.chunk_bytes),
        })
    }
}

/// Lazy ordered chunk stream over one stored object
///
/// Reads ahead at most one chunk; every frame repeats the object id.
/// Dropping the stream mid-way closes the file handle, so cancellation
/// never leaves a background read running.
#[derive(Debug)]
pub struct EgressStream {
    object_id: String,
    inner: ReaderStream<File>,
}

impl Stream for EgressStream {
    type Item = Result<ChunkFrame>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(payload))) => Poll::Ready(Some(Ok(ChunkFrame {
                object_id: this.object_id.clone(),
                payload,
            }))),
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(Error::Storage(e)))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}
