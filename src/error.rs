use thiserror::Error;

/// Terminal failures of a lag-measurement run.
///
/// Per-frame recognition failures are reported through
/// [`crate::recognition::RecognitionError`] and absorbed by the fan-out; they
/// only surface here when a caller wants to report one.
#[derive(Debug, Error)]
pub enum LagError {
    #[error("connection to host failed: {0}")]
    Connection(String),

    #[error("timestamp stream read failed after {read} entries: {reason}")]
    StreamRead { read: usize, reason: String },

    #[error("insufficient data: {what} has {len} entries, need at least {min}")]
    InsufficientData {
        what: &'static str,
        len: usize,
        min: usize,
    },

    #[error("sync data missing: {0}")]
    MissingSyncData(&'static str),

    #[error("recognition failed for frame {frame_index}: {reason}")]
    Recognition { frame_index: usize, reason: String },

    #[error("video source error: {0}")]
    Video(String),
}

pub type Result<T> = std::result::Result<T, LagError>;
