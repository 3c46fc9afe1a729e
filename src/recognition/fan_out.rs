use std::sync::Arc;

use tokio::{sync::Semaphore, task::JoinSet, time::Instant};

use crate::{
    error::{LagError, Result},
    models::FrameObservation,
    video::{FrameTimeMapper, VideoSource},
};

use super::{Frame, RecognitionError, TextRecognizer};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Observations gathered from one recognition batch, in completion order.
#[derive(Debug, Default)]
pub struct RecognitionBatch {
    pub observations: Vec<FrameObservation>,
    pub failed_frames: Vec<usize>,
}

/// Recognizes every frame of `video`, one task per frame, and returns once all
/// of them have finished.
///
/// At most `max_in_flight` recognitions run at the same time. A frame that
/// fails to decode or recognize is logged and left out; the rest of the batch
/// carries on.
pub async fn recognize_frames(
    video: Arc<dyn VideoSource>,
    recognizer: Arc<dyn TextRecognizer>,
    max_in_flight: usize,
) -> Result<RecognitionBatch> {
    let mapper = FrameTimeMapper::new(video.recording_start_millis(), video.fps())?;
    let frame_count = video.frame_count();
    let permits = Arc::new(Semaphore::new(max_in_flight.max(1)));
    let batch_start = Instant::now();

    log_info!(
        "Recognizing {} frames ({} fps, up to {} in flight)",
        frame_count,
        video.fps(),
        max_in_flight.max(1)
    );

    let mut tasks = JoinSet::new();
    for index in 0..frame_count {
        let video = Arc::clone(&video);
        let recognizer = Arc::clone(&recognizer);
        let permits = Arc::clone(&permits);

        tasks.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return (index, Err(RecognitionError::Engine("recognition pool closed".into())));
            };

            let result = tokio::task::spawn_blocking(move || {
                let image = video
                    .frame(index)
                    .map_err(|err| RecognitionError::Frame(err.to_string()))?;
                recognizer.recognize(&Frame { index, image })
            })
            .await
            .unwrap_or_else(|err| {
                Err(RecognitionError::Engine(format!("recognition worker join failed: {err}")))
            });

            (index, result)
        });
    }

    let mut batch = RecognitionBatch::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Ok(text))) => {
                log_debug!("Text detected at frame {}: {:?}", index, text);
                batch
                    .observations
                    .push(FrameObservation::new(index, text, mapper.timestamp(index)));
            }
            Ok((index, Err(err))) => {
                log_warn!("{}", LagError::Recognition {
                    frame_index: index,
                    reason: err.to_string(),
                });
                batch.failed_frames.push(index);
            }
            Err(err) => {
                log_error!("recognition task aborted: {err}");
            }
        }
    }

    log_info!(
        "Recognition finished in {}ms: {} frames with text, {} failed",
        batch_start.elapsed().as_millis(),
        batch.observations.len(),
        batch.failed_frames.len()
    );

    Ok(batch)
}
