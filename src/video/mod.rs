pub mod frame_time;
pub mod source;

pub use frame_time::FrameTimeMapper;
pub use source::{ImageSequenceSource, MemoryVideoSource, VideoSource};
