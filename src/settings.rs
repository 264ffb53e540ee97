use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::RwLock,
    time::Duration,
};

use crate::capture::CaptureMode;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_SETTINGS_FILE: &str = "posture-capture.json";

const DEFAULT_CAPTURE_INTERVAL_MS: u64 = 2000;
// tokio::time::interval panics on a zero period
const MIN_CAPTURE_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub device: String,
    pub input_format: String,
    pub width: u32,
    pub height: u32,
    pub jpeg_quality: u8,
    /// When set, frames come from this image file instead of the camera.
    pub still_image: Option<PathBuf>,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            device: "/dev/video0".into(),
            input_format: "mjpeg".into(),
            width: 500,
            height: 300,
            jpeg_quality: 80,
            still_image: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub capture_interval_ms: u64,
    /// `None` leaves requests bounded only by the transport.
    pub request_timeout_ms: Option<u64>,
    /// Drop results of requests started before the latest mode toggle.
    pub discard_stale_results: bool,
    pub initial_mode: CaptureMode,
    pub camera: CameraSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            capture_interval_ms: DEFAULT_CAPTURE_INTERVAL_MS,
            request_timeout_ms: None,
            discard_stale_results: true,
            initial_mode: CaptureMode::Auto,
            camera: CameraSettings::default(),
        }
    }
}

impl Settings {
    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.capture_interval_ms.max(MIN_CAPTURE_INTERVAL_MS))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Applies `POSTURE_BASE_URL` on top of the file contents.
    pub fn apply_env_overrides(&mut self) {
        if let Some(base_url) = env::var("POSTURE_BASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
        {
            self.base_url = base_url.trim().to_string();
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Ignoring unparseable settings in {}: {err}; using defaults",
                    path.display()
                );
                Settings::default()
            })
        } else {
            Settings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> Settings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, settings: Settings) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
