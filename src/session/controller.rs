use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{
    channel::RemoteChannel,
    clock::ClockSynchronizer,
    correlation::{check_inputs, correlate, MarkerConfig},
    error::Result,
    models::{CaptureRecord, LagMatch, LagReport},
    recognition::{recognize_frames, TextRecognizer},
    settings::{AnalyzerSettings, DEFAULT_MAX_IN_FLIGHT},
    video::VideoSource,
};

use super::sink::ResultSink;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub marker: MarkerConfig,
    pub max_in_flight: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            marker: MarkerConfig::default(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

impl From<&AnalyzerSettings> for SessionConfig {
    fn from(settings: &AnalyzerSettings) -> Self {
        Self {
            marker: settings.marker.clone(),
            max_in_flight: settings.max_in_flight,
        }
    }
}

/// What a finished session hands back: the report for display and the raw
/// inputs for a later replay.
#[derive(Debug)]
pub struct SessionOutcome {
    pub report: LagReport,
    pub capture: CaptureRecord,
}

/// One lag measurement, from capture-start signal to published results.
///
/// The session owns its connection to the host; nothing about it is global.
pub struct AnalysisSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    channel: RemoteChannel,
    capture_start: Option<JoinHandle<Result<i64>>>,
    clock: ClockSynchronizer,
    config: SessionConfig,
}

impl AnalysisSession {
    /// Starts connecting to the host in the background.
    pub fn open(host_addr: impl Into<String>, config: SessionConfig) -> Self {
        let id = Uuid::new_v4();
        let channel = RemoteChannel::connect(host_addr);
        info!("Session {} connecting to {}", id, channel.addr());

        Self {
            id,
            started_at: Utc::now(),
            channel,
            capture_start: None,
            clock: ClockSynchronizer::new(),
            config,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Sends the capture-start signal in the background. The local send time
    /// becomes the session's synchronization reference.
    pub fn signal_capture_start(&mut self) {
        if self.capture_start.is_some() {
            warn!("Session {}: capture start already signalled", self.id);
            return;
        }

        let channel = self.channel.clone();
        self.capture_start = Some(tokio::spawn(async move { channel.signal_capture_start().await }));
    }

    /// Downloads the host timestamps and recognizes every frame concurrently,
    /// waits for both, then correlates them and publishes one line per match.
    pub async fn analyze(
        &mut self,
        video: Arc<dyn VideoSource>,
        recognizer: Arc<dyn TextRecognizer>,
        sink: &mut dyn ResultSink,
    ) -> Result<SessionOutcome> {
        // The timestamp request must follow the capture-start message on the
        // wire, so the reference is settled before the download is issued.
        let local_reference = self.await_capture_start().await;

        let (download, batch) = tokio::join!(
            self.channel.download_timestamps(),
            recognize_frames(video, recognizer, self.config.max_in_flight),
        );
        let download = download?;
        let batch = batch?;

        let server_events = download.events;
        if !server_events.is_non_decreasing() {
            warn!("Session {}: server timestamps are out of order", self.id);
        }
        check_inputs(&server_events, &batch.observations)?;

        let sync_offset = self
            .clock
            .synchronize(async { local_reference }, async { server_events.reference() })
            .await?;

        let matches = correlate(
            &server_events,
            &batch.observations,
            sync_offset,
            &self.config.marker,
        )?;
        publish(&matches, sink);

        info!(
            "Session {}: {} of {} keystrokes matched",
            self.id,
            matches.len(),
            server_events.keystroke_count()
        );

        let report = LagReport::new(
            self.id,
            self.started_at,
            sync_offset,
            server_events.len(),
            batch.observations.len(),
            matches,
        );
        let capture = CaptureRecord {
            server_events,
            observations: batch.observations,
            sync_offset,
        };

        Ok(SessionOutcome { report, capture })
    }

    async fn await_capture_start(&mut self) -> Option<i64> {
        let Some(handle) = self.capture_start.take() else {
            warn!("Session {}: capture start was never signalled", self.id);
            return None;
        };

        match handle.await {
            Ok(Ok(sent_at)) => Some(sent_at),
            Ok(Err(err)) => {
                error!("Session {}: capture start failed: {}", self.id, err);
                None
            }
            Err(err) => {
                error!("Session {}: capture start task failed: {}", self.id, err);
                None
            }
        }
    }
}

/// Re-runs the correlation on a saved capture.
pub fn replay(
    capture: &CaptureRecord,
    marker: &MarkerConfig,
    sink: &mut dyn ResultSink,
) -> Result<LagReport> {
    let matches = correlate(
        &capture.server_events,
        &capture.observations,
        capture.sync_offset,
        marker,
    )?;
    publish(&matches, sink);

    Ok(LagReport::new(
        Uuid::new_v4(),
        Utc::now(),
        capture.sync_offset,
        capture.server_events.len(),
        capture.observations.len(),
        matches,
    ))
}

fn publish(matches: &[LagMatch], sink: &mut dyn ResultSink) {
    for m in matches {
        sink.publish(&m.display_line());
    }
}
