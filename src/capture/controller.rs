use std::{path::PathBuf, sync::Arc, time::Duration};

use chrono::Utc;
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    analysis::{AnalysisBackend, AnalysisResult, ClientError},
    frame::FrameSource,
    results::ResultStore,
    settings::Settings,
    upload::UploadSlot,
};

use super::{gate::DispatchGate, CaptureMode, CaptureState};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub tick_interval: Duration,
    pub discard_stale_results: bool,
    pub initial_mode: CaptureMode,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for ControllerOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            tick_interval: settings.capture_interval(),
            discard_stale_results: settings.discard_stale_results,
            initial_mode: settings.initial_mode,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureTrigger {
    Timer { generation: u64 },
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Another request is still outstanding.
    Busy,
    FeedNotReady,
    /// Manual capture asked for while the timer owns capturing.
    WrongMode,
    /// Tick from a timer that a toggle already replaced.
    StaleTimer,
}

/// A request running in the background.
#[derive(Debug)]
pub struct InFlight {
    pub request_id: Uuid,
    handle: JoinHandle<()>,
}

impl InFlight {
    /// Waits until the response has been applied (or discarded).
    pub async fn finished(self) {
        if let Err(err) = self.handle.await {
            log_error!("request {} task failed to join: {err}", self.request_id);
        }
    }
}

#[derive(Debug)]
pub enum CaptureOutcome {
    Dispatched(InFlight),
    Dropped(DropReason),
}

#[derive(Debug)]
pub enum UploadOutcome {
    NoFileSelected,
    Submitted(InFlight),
}

#[derive(Debug, Clone)]
pub struct CaptureSnapshot {
    pub state: CaptureState,
    pub in_flight: bool,
    pub result: AnalysisResult,
    pub pending_upload: Option<PathBuf>,
}

struct Ticker {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

impl Ticker {
    fn cancel(self) {
        self.cancel_token.cancel();
        self.handle.abort();
    }
}

/// Owns the capture mode, the auto-capture timer and the dispatch path.
///
/// All mutations of mode and results go through this type. Mode and
/// generation live behind one lock, so a toggle (flip, clear results,
/// re-arm timer) is never observed half done.
#[derive(Clone)]
pub struct CaptureController {
    state: Arc<Mutex<CaptureState>>,
    ticker: Arc<Mutex<Option<Ticker>>>,
    uploads: Arc<Mutex<UploadSlot>>,
    gate: DispatchGate,
    results: ResultStore,
    frames: Arc<dyn FrameSource>,
    backend: Arc<dyn AnalysisBackend>,
    tick_interval: Duration,
    discard_stale_results: bool,
}

impl CaptureController {
    pub fn new(
        frames: Arc<dyn FrameSource>,
        backend: Arc<dyn AnalysisBackend>,
        options: ControllerOptions,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(CaptureState::new(options.initial_mode))),
            ticker: Arc::new(Mutex::new(None)),
            uploads: Arc::new(Mutex::new(UploadSlot::default())),
            gate: DispatchGate::new(),
            results: ResultStore::new(),
            frames,
            backend,
            tick_interval: options.tick_interval,
            discard_stale_results: options.discard_stale_results,
        }
    }

    /// Arms the timer if the controller starts in auto mode.
    pub async fn start(&self) {
        let state = self.state.lock().await;
        self.rearm_ticker(&state).await;
        log_info!("capture controller started in {} mode", state.mode);
    }

    /// Stops the timer. Requests already sent are left to complete.
    pub async fn shutdown(&self) {
        if let Some(ticker) = self.ticker.lock().await.take() {
            ticker.cancel();
        }
        log_info!("capture controller stopped");
    }

    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    pub fn gate(&self) -> &DispatchGate {
        &self.gate
    }

    pub async fn mode(&self) -> CaptureMode {
        self.state.lock().await.mode
    }

    pub async fn snapshot(&self) -> CaptureSnapshot {
        let state = self.state.lock().await.clone();
        let pending_upload = self.uploads.lock().await.selected().map(PathBuf::from);
        CaptureSnapshot {
            state,
            in_flight: self.gate.is_busy(),
            result: self.results.get(),
            pending_upload,
        }
    }

    /// Flips the mode, clears the results and re-arms the timer for the new
    /// mode. Outstanding requests are not cancelled.
    pub async fn toggle_mode(&self) -> CaptureMode {
        let mut state = self.state.lock().await;
        let mode = state.toggle(Utc::now());
        self.results.clear();
        self.rearm_ticker(&state).await;

        log_info!(
            "capture mode switched to {} (generation {})",
            mode,
            state.generation
        );
        mode
    }

    /// The manual capture button.
    pub async fn capture_now(&self) -> CaptureOutcome {
        self.capture(CaptureTrigger::Manual).await
    }

    pub async fn capture(&self, trigger: CaptureTrigger) -> CaptureOutcome {
        let mut state = self.state.lock().await;

        let admissible = match trigger {
            CaptureTrigger::Timer { generation } => {
                state.mode == CaptureMode::Auto && state.is_current(generation)
            }
            CaptureTrigger::Manual => state.mode == CaptureMode::Manual,
        };
        if !admissible {
            let reason = match trigger {
                CaptureTrigger::Timer { .. } => DropReason::StaleTimer,
                CaptureTrigger::Manual => DropReason::WrongMode,
            };
            log_debug!("capture refused: {reason:?}");
            return CaptureOutcome::Dropped(reason);
        }

        let outcome = self.try_dispatch_frame(state.generation);
        match &outcome {
            CaptureOutcome::Dispatched(_) => state.dispatched += 1,
            CaptureOutcome::Dropped(reason) => {
                state.dropped += 1;
                log_debug!("capture dropped: {reason:?}");
            }
        }
        outcome
    }

    fn try_dispatch_frame(&self, generation: u64) -> CaptureOutcome {
        if self.gate.is_busy() {
            return CaptureOutcome::Dropped(DropReason::Busy);
        }

        let Some(image) = self.frames.current_frame() else {
            return CaptureOutcome::Dropped(DropReason::FeedNotReady);
        };

        let Some(permit) = self.gate.try_dispatch() else {
            return CaptureOutcome::Dropped(DropReason::Busy);
        };

        let request_id = Uuid::new_v4();
        log_info!(
            "dispatching frame {} ({} bytes, generation {})",
            request_id,
            image.len(),
            generation
        );

        let controller = self.clone();
        let handle = tokio::spawn(async move {
            let outcome = controller.backend.analyze_frame(&image).await;
            controller.apply(request_id, Some(generation), outcome).await;
            permit.release();
        });

        CaptureOutcome::Dispatched(InFlight { request_id, handle })
    }

    /// The file picker.
    pub async fn select_file(&self, path: PathBuf) {
        log_info!("upload selected: {}", path.display());
        self.uploads.lock().await.select(path);
    }

    /// Sends the selected file. Uploads skip the gate and may overlap a
    /// frame request; whichever finishes last owns the results.
    pub async fn submit_upload(&self) -> UploadOutcome {
        let Some(job) = self.uploads.lock().await.take() else {
            log_debug!("upload submitted with no file selected");
            return UploadOutcome::NoFileSelected;
        };

        let request_id = Uuid::new_v4();

        let controller = self.clone();
        let handle = tokio::spawn(async move {
            let path = job.path().display().to_string();
            let payload = match job.read().await {
                Ok(payload) => payload,
                Err(err) => {
                    log_error!("upload {request_id} not sent: {err:#}");
                    return;
                }
            };

            log_info!(
                "uploading {} as {} ({} bytes)",
                path,
                request_id,
                payload.bytes.len()
            );
            let outcome = controller.backend.analyze_file(&payload).await;
            controller.apply(request_id, None, outcome).await;
        });

        UploadOutcome::Submitted(InFlight { request_id, handle })
    }

    /// Writes a successful result. `generation` is set for frame captures
    /// only; uploads are not tied to a mode and always apply.
    async fn apply(
        &self,
        request_id: Uuid,
        generation: Option<u64>,
        outcome: Result<AnalysisResult, ClientError>,
    ) {
        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                log_error!("analysis {request_id} failed: {err}");
                return;
            }
        };

        let state = self.state.lock().await;
        let stale = generation.filter(|generation| !state.is_current(*generation));
        if let (true, Some(generation)) = (self.discard_stale_results, stale) {
            log_info!(
                "discarding result of {} from generation {} (now {})",
                request_id,
                generation,
                state.generation
            );
            return;
        }

        log_info!("analysis {} -> score {:?}", request_id, result.score);
        self.results.set(result);
    }

    /// Cancels the current timer and, in auto mode, starts one for the
    /// current generation. Callers hold the state lock.
    async fn rearm_ticker(&self, state: &CaptureState) {
        let mut ticker = self.ticker.lock().await;
        if let Some(previous) = ticker.take() {
            previous.cancel();
        }

        if state.mode == CaptureMode::Auto {
            *ticker = Some(self.spawn_ticker(state.generation));
        }
    }

    fn spawn_ticker(&self, generation: u64) -> Ticker {
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();
        let controller = self.clone();
        let period = self.tick_interval;

        let handle = tokio::spawn(async move {
            // first sample one full period after arming
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                controller
                    .capture(CaptureTrigger::Timer { generation })
                    .await;
            }
        });

        Ticker {
            handle,
            cancel_token,
        }
    }
}
