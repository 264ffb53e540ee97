pub mod client;
pub mod types;

use async_trait::async_trait;

use crate::frame::EncodedImage;

pub use client::HttpAnalysisClient;
pub use types::{AnalysisResult, ClientError, UploadPayload};

/// The remote posture analysis service.
///
/// One call is exactly one request: no retries, no queueing.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn analyze_frame(&self, image: &EncodedImage) -> Result<AnalysisResult, ClientError>;

    async fn analyze_file(&self, upload: &UploadPayload) -> Result<AnalysisResult, ClientError>;
}
