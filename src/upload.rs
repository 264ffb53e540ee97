use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::analysis::UploadPayload;

/// A file the user picked, not yet read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadJob {
    path: PathBuf,
}

impl UploadJob {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(self) -> Result<UploadPayload> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("failed to read upload {}", self.path.display()))?;
        Ok(UploadPayload::new(&self.path, bytes))
    }
}

/// The file picker: holds at most one selection and empties on submit, so
/// a file has to be picked again before it can be sent again.
#[derive(Debug, Default)]
pub struct UploadSlot {
    job: Option<UploadJob>,
}

impl UploadSlot {
    pub fn select(&mut self, path: PathBuf) {
        self.job = Some(UploadJob { path });
    }

    pub fn take(&mut self) -> Option<UploadJob> {
        self.job.take()
    }

    pub fn selected(&self) -> Option<&Path> {
        self.job.as_ref().map(UploadJob::path)
    }
}
