use serde::{Deserialize, Serialize};

/// Text recognized on one video frame, stamped with the frame's wall-clock time.
///
/// Observations are produced in recognition completion order, so the frame
/// index travels with the text instead of being implied by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameObservation {
    pub frame_index: usize,
    pub text: String,
    pub timestamp_ms: i64,
}

impl FrameObservation {
    pub fn new(frame_index: usize, text: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            frame_index,
            text: text.into(),
            timestamp_ms,
        }
    }
}

/// Copy of `observations` in ascending frame order.
///
/// The sort is stable, so duplicate frame indices keep their arrival order.
pub fn in_frame_order(observations: &[FrameObservation]) -> Vec<&FrameObservation> {
    let mut ordered: Vec<&FrameObservation> = observations.iter().collect();
    ordered.sort_by_key(|obs| obs.frame_index);
    ordered
}
