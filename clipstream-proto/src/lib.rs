//! Clipstream Protocol Definitions
//!
//! This crate contains the protobuf definitions and generated code for the
//! chunked media transfer service.

// Video transfer API
pub mod video {
    #[allow(clippy::all)]
    #[allow(warnings)]
    include!("clipstream.video.rs");
}
