use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CaptureMode {
    /// A recurring timer samples the feed.
    #[default]
    Auto,
    /// Frames are sampled only when the user asks.
    Manual,
}

impl CaptureMode {
    pub fn toggled(self) -> Self {
        match self {
            CaptureMode::Auto => CaptureMode::Manual,
            CaptureMode::Manual => CaptureMode::Auto,
        }
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureMode::Auto => f.write_str("Auto"),
            CaptureMode::Manual => f.write_str("Manual"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureState {
    pub mode: CaptureMode,
    /// Bumped on every toggle. Work started under an older generation is stale.
    pub generation: u64,
    pub toggled_at: Option<DateTime<Utc>>,
    pub dispatched: u64,
    pub dropped: u64,
}

impl CaptureState {
    pub fn new(mode: CaptureMode) -> Self {
        Self {
            mode,
            generation: 0,
            toggled_at: None,
            dispatched: 0,
            dropped: 0,
        }
    }

    pub fn toggle(&mut self, now: DateTime<Utc>) -> CaptureMode {
        self.mode = self.mode.toggled();
        self.generation = self.generation.wrapping_add(1);
        self.toggled_at = Some(now);
        self.mode
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }
}

impl Default for CaptureState {
    fn default() -> Self {
        Self::new(CaptureMode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_flips_mode_and_advances_generation() {
        let mut state = CaptureState::new(CaptureMode::Auto);
        assert!(state.is_current(0));

        assert_eq!(state.toggle(Utc::now()), CaptureMode::Manual);
        assert_eq!(state.generation, 1);
        assert!(!state.is_current(0));
        assert!(state.toggled_at.is_some());

        assert_eq!(state.toggle(Utc::now()), CaptureMode::Auto);
        assert_eq!(state.generation, 2);
    }

    #[test]
    fn mode_serializes_in_camel_case() {
        assert_eq!(
            serde_json::to_string(&CaptureMode::Manual).expect("serialize"),
            "\"manual\""
        );
        let mode: CaptureMode = serde_json::from_str("\"auto\"").expect("deserialize");
        assert_eq!(mode, CaptureMode::Auto);
    }
}
