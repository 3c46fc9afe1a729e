use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
};

use crate::correlation::MarkerConfig;

pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyzerSettings {
    /// `host:port` of the host timestamp server. Usually passed per run.
    pub host_addr: Option<String>,
    pub marker: MarkerConfig,
    /// OCR program fed one PNG frame on stdin per invocation.
    pub recognizer_program: String,
    pub recognizer_args: Vec<String>,
    pub max_in_flight: usize,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            host_addr: None,
            marker: MarkerConfig::default(),
            recognizer_program: "tesseract".into(),
            recognizer_args: vec!["stdin".into(), "stdout".into()],
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdbSettings {
    pub enabled: bool,
    pub program: String,
    /// Activity launched on the device, `package/class`.
    pub component: String,
    /// Intent string extra carrying the host port.
    pub port_extra: String,
}

impl Default for AdbSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            program: "adb".into(),
            component: "com.android.example.camera2.slowmo/com.example.android.camera2.slowmo.CameraActivity".into(),
            port_extra: "port".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HostSettings {
    /// Port 0 binds an ephemeral port.
    pub bind_addr: String,
    pub key: char,
    pub key_press_count: usize,
    /// Pause between the reference timestamp and the first keypress.
    pub settle_ms: u64,
    pub press_interval_ms: u64,
    /// Program that types one key, e.g. `xdotool` with args `["type"]`. The
    /// key is appended as the last argument. `None` only logs the presses.
    pub injector_program: Option<String>,
    pub injector_args: Vec<String>,
    pub adb: AdbSettings,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:0".into(),
            key: 'm',
            key_press_count: 10,
            settle_ms: 1000,
            press_interval_ms: 100,
            injector_program: None,
            injector_args: Vec::new(),
            adb: AdbSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct UserSettings {
    analyzer: AnalyzerSettings,
    host: HostSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("Ignoring unreadable settings in {}: {err}", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn analyzer(&self) -> AnalyzerSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .analyzer
            .clone()
    }

    pub fn host(&self) -> HostSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .host
            .clone()
    }

    pub fn update_analyzer(&self, settings: AnalyzerSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        guard.analyzer = settings;
        self.persist(&guard)
    }

    pub fn update_host(&self, settings: HostSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        guard.host = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
