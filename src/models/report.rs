use std::{fs, path::Path};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{FrameObservation, LagMatch, LagResults, ServerEvents, SyncOffset};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LagSummary {
    pub min_ms: i64,
    pub max_ms: i64,
    pub mean_ms: f64,
}

impl LagSummary {
    pub fn from_lags(lags: &[i64]) -> Option<Self> {
        let min_ms = *lags.iter().min()?;
        let max_ms = *lags.iter().max()?;
        let total: i128 = lags.iter().map(|&lag| i128::from(lag)).sum();
        let mean_ms = total as f64 / lags.len() as f64;
        Some(Self {
            min_ms,
            max_ms,
            mean_ms,
        })
    }
}

/// Outcome of one analysis session, serialized for `--report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LagReport {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub sync_offset: SyncOffset,
    pub server_event_count: usize,
    pub observation_count: usize,
    pub matches: Vec<LagMatch>,
    pub lags: LagResults,
    pub summary: Option<LagSummary>,
}

impl LagReport {
    pub fn new(
        session_id: Uuid,
        started_at: DateTime<Utc>,
        sync_offset: SyncOffset,
        server_event_count: usize,
        observation_count: usize,
        matches: Vec<LagMatch>,
    ) -> Self {
        let lags = LagResults::from(matches.as_slice());
        let summary = LagSummary::from_lags(lags.as_slice());
        Self {
            session_id,
            started_at,
            sync_offset,
            server_event_count,
            observation_count,
            matches,
            lags,
            summary,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }
}

/// Everything the correlator consumed in one session, kept so the run can be
/// re-analyzed offline with `keylag replay`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRecord {
    pub server_events: ServerEvents,
    pub observations: Vec<FrameObservation>,
    pub sync_offset: SyncOffset,
}

impl CaptureRecord {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read capture record from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse capture record {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let serialized = serde_json::to_string_pretty(value)?;
    fs::write(path, serialized).with_context(|| format!("Failed to write {}", path.display()))
}
