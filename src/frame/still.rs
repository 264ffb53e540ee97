use std::path::Path;

use anyhow::{Context, Result};
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage};

use crate::settings::CameraSettings;

use super::{EncodedImage, FrameSource};

/// A fixed picture standing in for the camera. Always ready.
pub struct StillImage {
    frame: EncodedImage,
}

impl StillImage {
    pub fn load(path: &Path, camera: &CameraSettings) -> Result<Self> {
        let image = image::open(path)
            .with_context(|| format!("failed to open still image {}", path.display()))?;
        Self::from_image(image, camera)
    }

    /// Fits the picture into the configured frame size and encodes it once.
    pub fn from_image(image: DynamicImage, camera: &CameraSettings) -> Result<Self> {
        let image = if image.width() > camera.width || image.height() > camera.height {
            image.resize(camera.width, camera.height, FilterType::Triangle)
        } else {
            image
        };

        let rgb = image.to_rgb8();
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, camera.jpeg_quality.clamp(1, 100))
            .encode_image(&rgb)
            .context("failed to encode still image as jpeg")?;

        Ok(Self {
            frame: EncodedImage::jpeg(bytes),
        })
    }
}

impl FrameSource for StillImage {
    fn current_frame(&self) -> Option<EncodedImage> {
        Some(self.frame.clone())
    }
}
