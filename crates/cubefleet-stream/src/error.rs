use std::time::Duration;
use thiserror::Error;

pub type StreamResult<T> = Result<T, StreamError>;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("capture failed: {0}")]
    Capture(String),

    #[error("transport failed: {0}")]
    Transport(#[from] std::io::Error),

    #[error("frame queue is closed")]
    QueueClosed,

    #[error("pipeline did not stop within {}", humantime::format_duration(*.0))]
    ShutdownTimeout(Duration),
}
