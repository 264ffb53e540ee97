use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};

pub const JPEG_MIME: &str = "image/jpeg";

/// An encoded still frame, cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    mime: &'static str,
    bytes: Arc<[u8]>,
}

impl EncodedImage {
    pub fn jpeg(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            mime: JPEG_MIME,
            bytes: bytes.into(),
        }
    }

    #[cfg(test)]
    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    /// `data:<mime>;base64,<payload>`, the form the frame endpoint expects.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

/// Something that can hand out the frame currently on screen.
///
/// Implementations must answer immediately. `None` means the feed is not
/// decoding yet (or anymore) and the caller should skip this sample.
pub trait FrameSource: Send + Sync {
    fn current_frame(&self) -> Option<EncodedImage>;
}
