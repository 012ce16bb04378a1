pub mod id;

pub use id::{generate_id, UserId, VideoId};
