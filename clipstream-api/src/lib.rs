// Clipstream API Library
//
// Provides gRPC and HTTP API services for Clipstream

pub mod grpc;
pub mod http;

// Re-export commonly used types
pub use http::AppState;
