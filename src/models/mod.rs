pub mod lag;
pub mod observation;
pub mod report;
pub mod server_events;

pub use lag::{LagMatch, LagResults, SyncOffset};
pub use observation::{in_frame_order, FrameObservation};
pub use report::{CaptureRecord, LagReport, LagSummary};
pub use server_events::ServerEvents;
