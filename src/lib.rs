pub mod analysis;
pub mod capture;
pub mod frame;
pub mod render;
pub mod results;
pub mod settings;
pub mod shell;
pub mod upload;
mod utils;

use std::{path::PathBuf, sync::Arc};

use analysis::HttpAnalysisClient;
use anyhow::{Context, Result};
use capture::{CaptureController, CaptureMode, ControllerOptions};
use clap::Parser;
use frame::{FrameSource, LiveFeed, StillImage};
use log::{info, warn};
use settings::{Settings, SettingsStore, DEFAULT_SETTINGS_FILE};

#[derive(Debug, Parser)]
#[command(name = "posture-capture", about = "Samples a camera feed and shows posture feedback")]
pub struct Cli {
    /// Settings file (JSON). Missing file means defaults.
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    settings: PathBuf,
    /// Use this image instead of the camera.
    #[arg(long)]
    still: Option<PathBuf>,
    /// Analysis service base url, e.g. http://127.0.0.1:8000
    #[arg(long)]
    base_url: Option<String>,
    /// Start in manual capture mode.
    #[arg(long)]
    manual: bool,
    /// Write the effective settings to the settings file and exit.
    #[arg(long)]
    init_settings: bool,
    #[arg(long)]
    no_color: bool,
}

pub(crate) struct AppState {
    pub(crate) controller: CaptureController,
    live_feed: Option<Arc<LiveFeed>>,
}

impl AppState {
    fn build(settings: &Settings) -> Result<Self> {
        let (frames, live_feed): (Arc<dyn FrameSource>, Option<Arc<LiveFeed>>) =
            match &settings.camera.still_image {
                Some(path) => {
                    info!("Using still image {} as frame source", path.display());
                    (Arc::new(StillImage::load(path, &settings.camera)?), None)
                }
                None => {
                    let feed = Arc::new(LiveFeed::spawn(&settings.camera)?);
                    (feed.clone(), Some(feed))
                }
            };

        let backend = HttpAnalysisClient::new(&settings.base_url, settings.request_timeout())?;
        info!("Analysis service at {}", settings.base_url);

        let controller =
            CaptureController::new(frames, Arc::new(backend), ControllerOptions::from(settings));

        Ok(Self {
            controller,
            live_feed,
        })
    }

    async fn shutdown(&self) {
        self.controller.shutdown().await;
        if let Some(feed) = &self.live_feed {
            if let Err(err) = feed.stop().await {
                warn!("Camera feed did not stop cleanly: {err:#}");
            }
        }
    }
}

fn debug_mode() -> bool {
    std::env::var("POSTURE_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    let level = if debug_mode() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let cli = Cli::parse();

    let store = SettingsStore::new(cli.settings.clone())?;
    let mut settings = store.settings();
    settings.apply_env_overrides();
    if let Some(base_url) = cli.base_url {
        settings.base_url = base_url;
    }
    if let Some(still) = cli.still {
        settings.camera.still_image = Some(still);
    }
    if cli.manual {
        settings.initial_mode = CaptureMode::Manual;
    }

    if cli.init_settings {
        store.update(settings)?;
        println!("Wrote settings to {}", store.path().display());
        return Ok(());
    }

    info!("posture-capture starting up...");

    let color = !cli.no_color;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async move {
        let app = AppState::build(&settings)?;
        app.controller.start().await;

        let outcome = shell::run_shell(app.controller.clone(), color).await;

        app.shutdown().await;
        outcome
    })
}
