use std::sync::Arc;

use tokio::sync::watch;

use crate::analysis::AnalysisResult;

/// Latest feedback shown to the user.
///
/// Backed by a watch channel so the rendering side can wait for changes
/// instead of polling. Writers never block.
#[derive(Clone)]
pub struct ResultStore {
    tx: Arc<watch::Sender<AnalysisResult>>,
}

impl ResultStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AnalysisResult::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn set(&self, result: AnalysisResult) {
        self.tx.send_replace(result);
    }

    pub fn clear(&self) {
        self.tx.send_replace(AnalysisResult::default());
    }

    pub fn get(&self) -> AnalysisResult {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AnalysisResult> {
        self.tx.subscribe()
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}
