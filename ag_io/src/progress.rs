use std::sync::Arc;

use ag_core::ProgressState;

/// Receives every progress update of a transfer, synchronously, on the task
/// that drives the copy loop.
pub type ProgressCallback = Arc<dyn Fn(&ProgressState) + Send + Sync>;

pub(crate) fn report(progress: Option<&ProgressCallback>, state: &ProgressState) {
    if let Some(cb) = progress {
        cb(state);
    }
}
