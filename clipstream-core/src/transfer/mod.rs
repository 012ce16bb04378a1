//! Chunked media transfer
//!
//! Ingest consumes an ordered stream of chunk frames and commits exactly one
//! stored object; egress reads a stored object back as an ordered stream of
//! bounded chunks. One pipeline run per call, no state shared across calls.

pub mod egress;
pub mod ingest;

pub use egress::{EgressPipeline, EgressStream};
pub use ingest::{IngestOutcome, IngestPipeline};

use bytes::Bytes;

/// Upper bound on a single chunk payload
pub const MAX_CHUNK_BYTES: usize = 1024 * 1024;

/// One unit of a chunked transfer
///
/// Ordering within a stream is significant. Every frame carries the object
/// id; ingest reads it from the first frame only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFrame {
    pub object_id: String,
    pub payload: Bytes,
}
