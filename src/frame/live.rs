use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::{Child, Command},
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::settings::CameraSettings;

use super::{mjpeg::MjpegSplitter, EncodedImage, FrameSource};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

const READ_CHUNK_BYTES: usize = 64 * 1024;

/// Camera feed decoded by an `ffmpeg` child process.
///
/// ffmpeg reads the V4L2 device and writes an MJPEG stream to stdout; a
/// reader task keeps only the newest complete JPEG. The feed is ready from
/// the first decoded frame until the process goes away.
pub struct LiveFeed {
    latest: watch::Receiver<Option<EncodedImage>>,
    cancel_token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl LiveFeed {
    pub fn spawn(camera: &CameraSettings) -> Result<Self> {
        let mut child = ffmpeg_command(camera)
            .spawn()
            .context("failed to spawn ffmpeg camera process")?;
        let stdout = child
            .stdout
            .take()
            .context("ffmpeg camera process has no stdout")?;

        log_info!(
            "camera feed starting on {} ({}x{}, {})",
            camera.device,
            camera.width,
            camera.height,
            camera.input_format
        );

        Ok(Self::from_reader(stdout, Some(child)))
    }

    fn from_reader<R>(reader: R, child: Option<Child>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = watch::channel(None);
        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        let handle = tokio::spawn(async move {
            pump_frames(reader, tx, token_clone).await;
            if let Some(mut child) = child {
                let _ = child.kill().await;
            }
        });

        Self {
            latest: rx,
            cancel_token,
            handle: Mutex::new(Some(handle)),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_ready(&self) -> bool {
        self.latest.borrow().is_some()
    }

    pub async fn stop(&self) -> Result<()> {
        self.cancel_token.cancel();

        if let Some(handle) = self.handle.lock().await.take() {
            handle.await.context("camera feed task failed to join")
        } else {
            Ok(())
        }
    }
}

impl FrameSource for LiveFeed {
    fn current_frame(&self) -> Option<EncodedImage> {
        self.latest.borrow().clone()
    }
}

fn ffmpeg_command(camera: &CameraSettings) -> Command {
    let scale = format!("scale={}:{}", camera.width, camera.height);
    let qscale = qscale_for(camera.jpeg_quality).to_string();

    let mut command = Command::new("ffmpeg");
    command
        .args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "v4l2",
            "-input_format",
            &camera.input_format,
            "-i",
            &camera.device,
            "-vf",
            &scale,
            "-f",
            "mjpeg",
            "-q:v",
            &qscale,
            "pipe:1",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    command
}

/// Maps a 1..=100 JPEG quality onto ffmpeg's 2..=31 mjpeg qscale (lower is better).
fn qscale_for(quality: u8) -> u32 {
    let quality = u32::from(quality.clamp(1, 100));
    2 + (100 - quality) * 29 / 99
}

async fn pump_frames<R>(
    mut reader: R,
    latest: watch::Sender<Option<EncodedImage>>,
    cancel_token: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    let mut splitter = MjpegSplitter::new();
    let mut buf = vec![0u8; READ_CHUNK_BYTES];

    loop {
        let read = tokio::select! {
            _ = cancel_token.cancelled() => {
                log_info!("camera feed shutting down");
                break;
            }
            read = reader.read(&mut buf) => read,
        };

        match read {
            Ok(0) => {
                log_warn!("camera feed ended");
                break;
            }
            Ok(n) => {
                if let Some(frame) = splitter.feed(&buf[..n]) {
                    let was_ready = latest.send_replace(Some(EncodedImage::jpeg(frame))).is_some();
                    if !was_ready {
                        log_info!("camera feed ready");
                    }
                }
            }
            Err(err) => {
                log_error!("camera feed read failed: {err}");
                break;
            }
        }
    }

    latest.send_replace(None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    fn jpeg(payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0xFF, 0xD8];
        out.extend_from_slice(payload);
        out.extend_from_slice(&[0xFF, 0xD9]);
        out
    }

    #[test]
    fn qscale_spans_ffmpeg_range() {
        assert_eq!(qscale_for(100), 2);
        assert_eq!(qscale_for(1), 31);
        assert_eq!(qscale_for(0), 31);
        assert!(qscale_for(80) < qscale_for(50));
    }

    #[tokio::test]
    async fn not_ready_until_first_frame() {
        let (mut writer, reader) = tokio::io::duplex(1024);
        let feed = LiveFeed::from_reader(reader, None);
        let mut watcher = feed.latest.clone();

        assert!(feed.current_frame().is_none());

        writer.write_all(&jpeg(b"one")).await.expect("write frame");
        watcher.changed().await.expect("feed alive");

        let frame = feed.current_frame().expect("frame after first image");
        assert_eq!(frame.bytes(), jpeg(b"one").as_slice());
        assert!(feed.is_ready());

        feed.stop().await.expect("stop");
    }

    #[tokio::test]
    async fn feed_goes_dark_when_stream_ends() {
        let (mut writer, reader) = tokio::io::duplex(1024);
        let feed = LiveFeed::from_reader(reader, None);
        let mut watcher = feed.latest.clone();

        writer.write_all(&jpeg(b"frame")).await.expect("write frame");
        watcher.changed().await.expect("feed alive");
        assert!(feed.is_ready());

        drop(writer);
        // the sender is dropped after clearing the slot, so this may report closed
        let _ = watcher.changed().await;
        assert!(feed.current_frame().is_none());

        feed.stop().await.expect("stop after end");
    }

    #[tokio::test]
    async fn stop_clears_the_frame() {
        let (mut writer, reader) = tokio::io::duplex(1024);
        let feed = LiveFeed::from_reader(reader, None);
        let mut watcher = feed.latest.clone();

        writer.write_all(&jpeg(b"frame")).await.expect("write frame");
        watcher.changed().await.expect("feed alive");

        feed.stop().await.expect("stop");
        assert!(feed.current_frame().is_none());
    }
}
