pub mod config;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod storage;
pub mod transfer;

pub use config::Config;
pub use error::{Error, Result};
