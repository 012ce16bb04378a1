// Module: messaging

pub mod frames;
pub mod registry;
pub mod router;

pub use frames::{ClientFrame, ServerFrame};
pub use registry::{ConnectionHandle, ConnectionRegistry, FrameSender};
pub use router::{BroadcastReport, DeliveryError, DeliveryFailure, MessageRouter};
