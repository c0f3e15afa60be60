//! Ragway Core — chat message types, infrastructure errors, process configuration.

pub mod config;
pub mod error;
pub mod message;

pub use config::{DataPaths, GatewayConfig};
pub use error::{Error, Result};
pub use message::{ChatMessage, Role};

/// Milliseconds since the Unix epoch, UTC.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
