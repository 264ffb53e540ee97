use std::{path::PathBuf, str::FromStr};

use crate::render::render_panel;

use super::{CaptureController, CaptureMode, CaptureOutcome, DropReason, UploadOutcome};

/// What the user can ask for from the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ToggleMode,
    Capture,
    SelectFile(PathBuf),
    /// Submits the selected file, selecting `path` first when given.
    Upload(Option<PathBuf>),
    Status,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, arg) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, Some(rest.trim()).filter(|rest| !rest.is_empty())),
            None => (line, None),
        };

        match (verb.to_ascii_lowercase().as_str(), arg) {
            ("toggle" | "t" | "mode", None) => Ok(Command::ToggleMode),
            ("capture" | "c", None) => Ok(Command::Capture),
            ("select" | "file", Some(path)) => Ok(Command::SelectFile(PathBuf::from(path))),
            ("select" | "file", None) => Err("usage: select <path>".into()),
            ("upload" | "u", path) => Ok(Command::Upload(path.map(PathBuf::from))),
            ("status" | "s", None) => Ok(Command::Status),
            ("help" | "h" | "?", None) => Ok(Command::Help),
            ("quit" | "q" | "exit", None) => Ok(Command::Quit),
            ("", None) => Err(String::new()),
            (other, _) => Err(format!("unknown command `{other}`, try `help`")),
        }
    }
}

pub const HELP: &str = "\
commands:
  toggle           switch between auto and manual capture
  capture          capture and analyze one frame (manual mode)
  select <path>    pick a video file for upload
  upload [path]    send the picked file (or pick and send <path>)
  status           show mode and latest feedback
  quit             leave";

pub async fn toggle_mode(controller: &CaptureController) -> Result<Option<String>, String> {
    let mode = controller.toggle_mode().await;
    let hint = match mode {
        CaptureMode::Auto => "capturing every few seconds",
        CaptureMode::Manual => "use `capture` to analyze a frame",
    };
    Ok(Some(format!("{mode} mode, {hint}")))
}

/// Busy and not-ready drops stay silent.
pub async fn capture_now(controller: &CaptureController) -> Result<Option<String>, String> {
    match controller.capture_now().await {
        CaptureOutcome::Dispatched(in_flight) => {
            Ok(Some(format!("analyzing frame {}", in_flight.request_id)))
        }
        CaptureOutcome::Dropped(DropReason::WrongMode) => {
            Err("capture is only available in manual mode, use `toggle` first".into())
        }
        CaptureOutcome::Dropped(_) => Ok(None),
    }
}

pub async fn select_file(
    controller: &CaptureController,
    path: PathBuf,
) -> Result<Option<String>, String> {
    let is_file = tokio::fs::metadata(&path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(format!("{} is not a file", path.display()));
    }
    let message = format!("selected {}", path.display());
    controller.select_file(path).await;
    Ok(Some(message))
}

pub async fn upload(
    controller: &CaptureController,
    path: Option<PathBuf>,
) -> Result<Option<String>, String> {
    if let Some(path) = path {
        select_file(controller, path).await?;
    }

    match controller.submit_upload().await {
        UploadOutcome::Submitted(in_flight) => {
            Ok(Some(format!("uploading as {}", in_flight.request_id)))
        }
        UploadOutcome::NoFileSelected => Ok(None),
    }
}

pub async fn status(controller: &CaptureController, color: bool) -> Result<Option<String>, String> {
    let snapshot = controller.snapshot().await;
    let mut out = render_panel(&snapshot.result, snapshot.state.mode, color);
    out.push_str(&format!(
        "sent {} / dropped {}{}",
        snapshot.state.dispatched,
        snapshot.state.dropped,
        if snapshot.in_flight { " / waiting for reply" } else { "" }
    ));
    if let Some(path) = snapshot.pending_upload {
        out.push_str(&format!("\nselected for upload: {}", path.display()));
    }
    Ok(Some(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::HttpAnalysisClient,
        capture::ControllerOptions,
        frame::{EncodedImage, FrameSource},
    };
    use std::sync::Arc;

    #[test]
    fn parses_verbs_and_aliases() {
        assert_eq!("toggle".parse(), Ok(Command::ToggleMode));
        assert_eq!(" C ".parse(), Ok(Command::Capture));
        assert_eq!("status".parse(), Ok(Command::Status));
        assert_eq!("q".parse(), Ok(Command::Quit));
        assert_eq!("?".parse(), Ok(Command::Help));
    }

    #[test]
    fn parses_paths_with_spaces() {
        assert_eq!(
            "select /tmp/my clip.mp4".parse(),
            Ok(Command::SelectFile(PathBuf::from("/tmp/my clip.mp4")))
        );
        assert_eq!("upload".parse(), Ok(Command::Upload(None)));
        assert_eq!(
            "upload squat.webm".parse(),
            Ok(Command::Upload(Some(PathBuf::from("squat.webm"))))
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!("select".parse::<Command>().is_err());
        assert!("capture now".parse::<Command>().is_err());
        assert!("dance".parse::<Command>().unwrap_err().contains("dance"));
        assert_eq!("   ".parse::<Command>(), Err(String::new()));
    }

    fn idle_controller() -> CaptureController {
        struct NoFrames;

        impl FrameSource for NoFrames {
            fn current_frame(&self) -> Option<EncodedImage> {
                None
            }
        }

        let backend = HttpAnalysisClient::new("http://127.0.0.1:9", None).expect("client");
        CaptureController::new(
            Arc::new(NoFrames),
            Arc::new(backend),
            ControllerOptions {
                initial_mode: CaptureMode::Manual,
                ..ControllerOptions::default()
            },
        )
    }

    #[tokio::test]
    async fn selecting_missing_or_directory_path_is_refused() {
        let controller = idle_controller();

        let missing = select_file(&controller, PathBuf::from("/definitely/not/here.mp4")).await;
        assert!(missing.unwrap_err().contains("is not a file"));
        assert!(select_file(&controller, std::env::temp_dir()).await.is_err());
        assert!(controller.snapshot().await.pending_upload.is_none());
    }

    #[tokio::test]
    async fn selecting_existing_file_fills_the_slot() {
        let controller = idle_controller();
        let path = std::env::temp_dir().join(format!("posture-select-{}.mp4", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, b"video").await.expect("write clip");

        let message = select_file(&controller, path.clone()).await.expect("selected");
        assert_eq!(message, Some(format!("selected {}", path.display())));
        assert_eq!(controller.snapshot().await.pending_upload, Some(path.clone()));

        let _ = tokio::fs::remove_file(path).await;
    }
}
