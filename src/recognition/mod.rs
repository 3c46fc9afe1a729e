//! Text recognition on video frames.
//!
//! Recognition itself is an external capability behind [`TextRecognizer`].
//! This module owns the fan-out that runs it over every frame of a recording
//! and the join that waits for all of them.

pub mod command;
pub mod fan_out;
pub mod transcript;

use image::DynamicImage;
use thiserror::Error;

pub use command::CommandRecognizer;
pub use fan_out::{recognize_frames, RecognitionBatch};
pub use transcript::TranscriptRecognizer;

/// A decoded frame handed to a recognizer.
pub struct Frame {
    pub index: usize,
    pub image: DynamicImage,
}

#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("frame unavailable: {0}")]
    Frame(String),

    #[error("failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),

    #[error("recognizer process error: {0}")]
    Io(#[from] std::io::Error),

    #[error("recognizer failed: {0}")]
    Engine(String),

    #[error("no transcript entry for frame {0}")]
    MissingTranscript(usize),
}

/// One image in, recognized text out.
///
/// Called on the blocking pool, concurrently for different frames.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, frame: &Frame) -> Result<String, RecognitionError>;
}
