use crate::error::{LagError, Result};

/// Maps frame indices of a constant-rate recording to epoch milliseconds.
///
/// The frame interval is `floor(1000 / fps)`; fractional loss accumulates
/// over the recording and is not corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTimeMapper {
    recording_start_millis: i64,
    frame_interval_ms: i64,
}

impl FrameTimeMapper {
    pub fn new(recording_start_millis: i64, fps: u32) -> Result<Self> {
        if fps == 0 {
            return Err(LagError::Video("fps must be greater than zero".into()));
        }

        Ok(Self {
            recording_start_millis,
            frame_interval_ms: i64::from(1000 / fps),
        })
    }

    pub fn frame_interval_ms(&self) -> i64 {
        self.frame_interval_ms
    }

    pub fn timestamp(&self, frame_index: usize) -> i64 {
        self.recording_start_millis + frame_index as i64 * self.frame_interval_ms
    }
}
